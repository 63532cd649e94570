//! Lightweight markup conversion.
//!
//! A [`Converter`] turns source text (Markdown, Textile, ...) into raw HTML.
//! [`CommonMarkConverter`] is the bundled implementation; any other backend
//! plugs in through the trait.

use pulldown_cmark::{CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd, html};
use quill_dom::escape_attr;

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult};

/// Error raised by a [`Converter`] backend.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ConvertError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConvertError {
    /// Create a conversion error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error source.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Source text to HTML conversion backend.
pub trait Converter: Send + Sync {
    /// Convert `source` to raw (unsanitized) HTML.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot convert the input.
    fn convert(&self, source: &str) -> Result<String, ConvertError>;
}

/// `CommonMark` converter backed by `pulldown-cmark`.
///
/// Fenced code blocks with a language are emitted as
/// `<pre lang="x"><code>`, which the default whitelist keeps intact.
#[derive(Clone, Copy, Debug)]
pub struct CommonMarkConverter {
    gfm: bool,
}

impl Default for CommonMarkConverter {
    fn default() -> Self {
        Self { gfm: true }
    }
}

impl CommonMarkConverter {
    /// Create a converter with GitHub Flavored Markdown extensions enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable tables, strikethrough and task lists.
    #[must_use]
    pub fn gfm(mut self, enabled: bool) -> Self {
        self.gfm = enabled;
        self
    }

    fn parser_options(self) -> Options {
        let mut options = Options::empty();
        if self.gfm {
            options.insert(Options::ENABLE_TABLES);
            options.insert(Options::ENABLE_STRIKETHROUGH);
            options.insert(Options::ENABLE_TASKLISTS);
        }
        options
    }
}

impl Converter for CommonMarkConverter {
    fn convert(&self, source: &str) -> Result<String, ConvertError> {
        let parser = Parser::new_ext(source, self.parser_options());
        let mut out = String::with_capacity(source.len() * 3 / 2);
        html::push_html(&mut out, CodeFenceLang::new(parser));
        Ok(out)
    }
}

/// Iterator adapter rewriting fenced code block starts as `<pre lang="x"><code>`.
struct CodeFenceLang<I> {
    iter: I,
    in_fence: bool,
}

impl<I> CodeFenceLang<I> {
    fn new(iter: I) -> Self {
        Self {
            iter,
            in_fence: false,
        }
    }
}

impl<'a, I: Iterator<Item = Event<'a>>> Iterator for CodeFenceLang<I> {
    type Item = Event<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.iter.next()?;
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) => {
                let lang = info.split_whitespace().next().unwrap_or_default();
                if lang.is_empty() {
                    return Some(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))));
                }
                self.in_fence = true;
                let open = format!(r#"<pre lang="{}"><code>"#, escape_attr(lang));
                Some(Event::Html(CowStr::Boxed(open.into_boxed_str())))
            }
            Event::End(TagEnd::CodeBlock) if self.in_fence => {
                self.in_fence = false;
                Some(Event::Html(CowStr::Borrowed("</code></pre>\n")))
            }
            other => Some(other),
        }
    }
}

/// Filter converting source text with a [`Converter`].
///
/// Tree input is passed through unchanged.
pub struct ConvertFilter<C> {
    converter: C,
}

impl<C: Converter> ConvertFilter<C> {
    /// Wrap a converter.
    #[must_use]
    pub fn new(converter: C) -> Self {
        Self { converter }
    }
}

impl Default for ConvertFilter<CommonMarkConverter> {
    fn default() -> Self {
        Self::new(CommonMarkConverter::default())
    }
}

impl<C: Converter> Filter for ConvertFilter<C> {
    fn name(&self) -> &'static str {
        "ConvertFilter"
    }

    fn apply(
        &self,
        input: Markup,
        _context: &Context,
        _result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        match input {
            Markup::Text(source) => Ok(Markup::Text(self.converter.convert(&source)?)),
            tree @ Markup::Tree(_) => Ok(tree),
        }
    }
}
