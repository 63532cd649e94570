//! Syntax highlighting of code blocks through a pluggable [`Highlighter`].

use quill_dom::{Element, Fragment, Node, NodePath, escape_attr};

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::references::splice;
use crate::result::{Markup, PipelineResult};

/// Syntax highlighting backend.
pub trait Highlighter: Send + Sync {
    /// Highlight `code` written in `lang`.
    ///
    /// Returns highlighted markup, or `None` if the language is unsupported.
    fn highlight(&self, code: &str, lang: &str) -> Option<String>;
}

/// Replaces `<pre>` blocks that declare a language with highlighted markup.
///
/// The language comes from the `lang` attribute of the `<pre>` or a
/// `language-x` class on its `<code>` child.
pub struct SyntaxHighlightFilter<H> {
    highlighter: H,
}

impl<H: Highlighter> SyntaxHighlightFilter<H> {
    /// Wrap a highlighter.
    #[must_use]
    pub fn new(highlighter: H) -> Self {
        Self { highlighter }
    }
}

/// Language declared by a `<pre>` block.
fn block_language(pre: &Element) -> Option<&str> {
    if let Some(lang) = pre.attrs.get("lang").filter(|l| !l.is_empty()) {
        return Some(lang);
    }
    pre.children
        .iter()
        .filter_map(Node::as_element)
        .find(|el| el.name == "code")?
        .attrs
        .get("class")?
        .split_whitespace()
        .find_map(|class| class.strip_prefix("language-"))
        .filter(|l| !l.is_empty())
}

impl<H: Highlighter> Filter for SyntaxHighlightFilter<H> {
    fn name(&self) -> &'static str {
        "SyntaxHighlightFilter"
    }

    fn apply(
        &self,
        input: Markup,
        _context: &Context,
        _result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        let mut fragment = input.into_fragment()?;

        let blocks: Vec<(NodePath, String)> = fragment
            .descendants()
            .filter_map(|(path, node)| {
                let pre = node.as_element().filter(|el| el.name == "pre")?;
                let lang = block_language(pre)?;
                let highlighted = self.highlighter.highlight(&pre.text_content(), lang)?;
                Some((path, highlighted_block(lang, &highlighted)))
            })
            .collect();

        tracing::debug!(filter = self.name(), blocks = blocks.len(), "Highlighted code blocks");
        replace_all(&mut fragment, blocks)?;
        Ok(Markup::Tree(fragment))
    }
}

fn highlighted_block(lang: &str, highlighted: &str) -> String {
    let lang = escape_attr(&lang.to_ascii_lowercase());
    format!(r#"<div class="highlight highlight-{lang}"><pre>{highlighted}</pre></div>"#)
}

/// Splice replacements in reverse document order.
fn replace_all(
    fragment: &mut Fragment,
    blocks: Vec<(NodePath, String)>,
) -> Result<(), PipelineError> {
    for (path, html) in blocks.into_iter().rev() {
        splice(fragment, path, &html)?;
    }
    Ok(())
}
