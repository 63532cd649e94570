//! Supplementary filters around the sanitize and reference stages.

mod autolink;
mod convert;
mod highlight;
mod plain_text;
mod toc;

pub use autolink::AutolinkFilter;
pub use convert::{CommonMarkConverter, ConvertError, ConvertFilter, Converter};
pub use highlight::{Highlighter, SyntaxHighlightFilter};
pub use plain_text::PlainTextInputFilter;
pub use toc::{TableOfContentsFilter, TocEntry, slugify};
