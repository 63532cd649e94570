//! Bare URL linking.

use std::fmt::Write as _;
use std::sync::LazyLock;

use quill_dom::{decode_entities, escape_attr};
use regex::Regex;

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::references::rewrite_text_nodes;
use crate::result::{Markup, PipelineResult};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"]+"#).expect("invalid autolink regex")
});

/// Escaped markup that ends a URL inside serialized text.
const ESCAPED_TERMINATORS: &[&str] = &["&lt;", "&gt;", "&quot;"];

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ':', ';', '!', '?', '\'', '*'];

/// Turns bare `http(s)://` and `www.` URLs into links.
///
/// Disabled when the context sets `autolink` to `false`. Text inside `pre`,
/// `code`, `a` and `style` is left alone.
#[derive(Clone, Copy, Debug, Default)]
pub struct AutolinkFilter;

impl Filter for AutolinkFilter {
    fn name(&self) -> &'static str {
        "AutolinkFilter"
    }

    fn apply(
        &self,
        input: Markup,
        context: &Context,
        _result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        if !context.autolink() {
            return Ok(input);
        }

        let mut fragment = input.into_fragment()?;
        let rewritten = rewrite_text_nodes(
            &mut fragment,
            |text| text.contains("://") || text.contains("www."),
            |html| Ok(link_urls(html)),
        )?;

        tracing::debug!(filter = self.name(), rewritten, "Linked bare URLs");
        Ok(Markup::Tree(fragment))
    }
}

/// Link every URL in serialized text, or `None` if there is none.
fn link_urls(html: &str) -> Option<String> {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for m in URL_RE.find_iter(html) {
        let url = trim_url(m.as_str());
        if url.ends_with("://") || url.len() <= "www.".len() {
            continue;
        }
        let end = m.start() + url.len();

        let decoded = decode_entities(url);
        let href = if decoded
            .get(..4)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case("www."))
        {
            format!("http://{decoded}")
        } else {
            decoded
        };

        out.push_str(&html[last..m.start()]);
        let _ = write!(out, r#"<a href="{}">{url}</a>"#, escape_attr(&href));
        last = end;
    }

    if last == 0 {
        return None;
    }
    out.push_str(&html[last..]);
    Some(out)
}

/// Cut a matched URL at escaped markup and drop trailing punctuation.
fn trim_url(url: &str) -> &str {
    let cut = ESCAPED_TERMINATORS
        .iter()
        .filter_map(|t| url.find(t))
        .min()
        .unwrap_or(url.len());
    let mut url = &url[..cut];

    loop {
        let trimmed = url.trim_end_matches(TRAILING_PUNCTUATION);
        let trimmed = if trimmed.ends_with(')')
            && trimmed.matches(')').count() > trimmed.matches('(').count()
        {
            &trimmed[..trimmed.len() - 1]
        } else {
            trimmed
        };
        if trimmed.len() == url.len() {
            return url;
        }
        url = trimmed;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn run(markup: &str, context: &Context) -> String {
        let mut result = PipelineResult::new();
        AutolinkFilter
            .call(markup.into(), context, &mut result)
            .unwrap()
            .into_html()
    }

    #[test]
    fn test_bare_url_linked() {
        assert_eq!(
            run("<p>see https://example.com/a?b=1&amp;c=2.</p>", &Context::new()),
            r#"<p>see <a href="https://example.com/a?b=1&amp;c=2">https://example.com/a?b=1&amp;c=2</a>.</p>"#
        );
    }

    #[test]
    fn test_www_gets_scheme() {
        assert_eq!(
            run("<p>(www.example.com)</p>", &Context::new()),
            r#"<p>(<a href="http://www.example.com">www.example.com</a>)</p>"#
        );
    }

    #[test]
    fn test_balanced_parentheses_kept() {
        assert_eq!(
            run("https://en.wikipedia.org/wiki/Rust_(language)", &Context::new()),
            r#"<a href="https://en.wikipedia.org/wiki/Rust_(language)">https://en.wikipedia.org/wiki/Rust_(language)</a>"#
        );
    }

    #[test]
    fn test_url_stops_at_escaped_markup() {
        assert_eq!(
            run("<p>&lt;http://x.test&gt;</p>", &Context::new()),
            r#"<p>&lt;<a href="http://x.test">http://x.test</a>&gt;</p>"#
        );
    }

    #[test]
    fn test_existing_links_and_code_untouched() {
        let markup = r#"<a href="http://x.test">http://x.test</a><code>http://y.test</code>"#;
        assert_eq!(run(markup, &Context::new()), markup);
    }

    #[test]
    fn test_disabled_by_context() {
        let context = Context::new().with_autolink(false);
        assert_eq!(
            run("<p>http://x.test</p>", &context),
            "<p>http://x.test</p>"
        );
    }
}
