//! Sanitizing and reference-linking pipeline for user-authored markup.
//!
//! Untrusted content (comments, issue bodies) flows through an ordered list
//! of [`Filter`]s: a markup [`Converter`], the whitelist [`sanitize`]r, and
//! reference filters that turn `@user`, `@org/team`, `#123` and commit SHAs
//! into links. Text inside `pre`, `code`, `a` and `style` is never rewritten.
//!
//! # Architecture
//!
//! - [`Pipeline`] merges per-call [`Context`] over its defaults, validates
//!   every filter, folds the input through them and returns a
//!   [`PipelineResult`] with the output and the references found.
//! - [`Whitelist`] describes what survives sanitization; `main`, `limited`
//!   and `strip-all` are built-in profiles.
//! - [`Resolver`] is the injected lookup capability for users, issues,
//!   commits and teams. [`MemoryResolver`] (behind the `mock` feature) serves
//!   tests.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use quill::{Context, MemoryResolver, MentionFilter, Pipeline, SanitizationFilter};
//!
//! let pipeline = Pipeline::new(vec![Box::new(SanitizationFilter), Box::new(MentionFilter)]);
//! let context = Context::new().with_resolver(Arc::new(MemoryResolver::new().with_user("kneath")));
//!
//! let result = pipeline.run("<p>@kneath: check it out.</p>", &context)?;
//! assert_eq!(result.mentioned_usernames, ["kneath"]);
//! ```

mod context;
mod error;
mod filter;
mod filters;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod pipeline;
mod references;
mod resolver;
mod result;
mod sanitize;
mod whitelist;

pub use context::Context;
pub use error::{ContextKey, MissingContextError, PipelineError};
pub use filter::Filter;
pub use filters::{
    AutolinkFilter, CommonMarkConverter, ConvertError, ConvertFilter, Converter, Highlighter,
    PlainTextInputFilter, SyntaxHighlightFilter, TableOfContentsFilter, TocEntry, slugify,
};
#[cfg(any(test, feature = "mock"))]
pub use mock::MemoryResolver;
pub use pipeline::Pipeline;
pub use references::{COMMIT_REFERENCE_LIMIT, CommitFilter, IssueFilter, MentionFilter, TeamFilter};
pub use resolver::{Commit, Issue, ParseRepoRefError, RepoRef, Resolver, ResolverError, Team, User};
pub use result::{Markup, PipelineResult, Reference};
pub use sanitize::{SanitizationFilter, sanitize};
pub use whitelist::{Protocol, StructuralRule, Whitelist};

pub use quill_dom::{Fragment, Node, ParseError};
