//! Mutable markup tree for the quill filter engine.
//!
//! A [`Fragment`] is a forest of [`Node`]s parsed leniently from an HTML
//! string. Filters walk it, test ancestry and splice new content in place:
//!
//! - [`Fragment::parse`]: lenient parse (unknown end tags ignored, void
//!   elements never take children, entities decoded)
//! - [`Fragment::descendants`] / [`Fragment::text_nodes`]: depth-first,
//!   restartable traversal yielding [`NodePath`]s
//! - [`Fragment::has_ancestor`]: ancestor-membership predicate
//! - [`Fragment::replace`] / [`Fragment::replace_html`]: splice by path
//! - [`Fragment::to_html`]: HTML serialization
//!
//! # Example
//!
//! ```
//! use quill_dom::Fragment;
//!
//! let mut fragment = Fragment::parse("<p>Hello <b>world</b></p>").unwrap();
//! let path = fragment.text_nodes().next().unwrap().path;
//! fragment.replace_html(&path, "Goodbye ").unwrap();
//! assert_eq!(fragment.to_html(), "<p>Goodbye <b>world</b></p>");
//! ```

mod entities;
mod node;
mod parser;
mod serializer;
mod traverse;

pub use entities::decode_entities;
pub use node::{Attributes, Element, Fragment, Node, is_void_element};
pub use parser::{ParseError, parse};
pub use serializer::{escape_attr, escape_text};
pub use traverse::{Descendants, NodePath, TextNode, TextNodes};
