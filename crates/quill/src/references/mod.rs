//! Reference filters: `@user`, `@org/team`, `#issue` and commit SHAs.
//!
//! All four share one scan, resolve and rewrite engine:
//!
//! 1. Snapshot text nodes that contain the sigil and have no ignored ancestor
//!    (`pre`, `code`, `a`, `style`).
//! 2. Run the pattern over each node's serialized text in document order,
//!    asking the resolver about every candidate and recording what resolves.
//! 3. Splice the rewritten markup back in reverse document order.
//!
//! Patterns capture the character before the sigil as group `lead` so the leading
//! separator is preserved. The `regex` crate has no lookaround, so the
//! trailing boundary is checked by [`has_reference_boundary`].

mod commit;
mod issue;
mod mention;
pub(crate) mod pattern;
mod team;

use quill_dom::{Fragment, NodePath, escape_attr, escape_text};
use regex::{Captures, Regex};

use crate::error::PipelineError;

pub use commit::{COMMIT_REFERENCE_LIMIT, CommitFilter};
pub use issue::IssueFilter;
pub use mention::MentionFilter;
pub use team::TeamFilter;

/// Elements whose text is never rewritten.
pub(crate) const IGNORED_ANCESTORS: &[&str] = &["pre", "code", "a", "style"];

/// Rewrite eligible text nodes of `fragment`.
///
/// `rewrite` receives each node's serialized text and returns replacement
/// markup, or `None` to leave the node alone. Returns the number of nodes
/// replaced.
pub(crate) fn rewrite_text_nodes<P, F>(
    fragment: &mut Fragment,
    precheck: P,
    mut rewrite: F,
) -> Result<usize, PipelineError>
where
    P: Fn(&str) -> bool,
    F: FnMut(&str) -> Result<Option<String>, PipelineError>,
{
    let candidates: Vec<(NodePath, String)> = fragment
        .text_nodes()
        .filter(|node| precheck(node.text))
        .filter(|node| !fragment.has_ancestor(&node.path, IGNORED_ANCESTORS))
        .map(|node| (node.path, escape_text(node.text)))
        .collect();

    let mut replacements = Vec::new();
    for (path, html) in candidates {
        if let Some(replacement) = rewrite(&html)? {
            replacements.push((path, replacement));
        }
    }

    let count = replacements.len();
    for (path, html) in replacements.into_iter().rev() {
        splice(fragment, path, &html)?;
    }
    Ok(count)
}

/// Replace the node at `path` with parsed `html`.
///
/// Fails with [`PipelineError::StalePath`] when `path` addresses nothing.
pub(crate) fn splice(
    fragment: &mut Fragment,
    path: NodePath,
    html: &str,
) -> Result<(), PipelineError> {
    if fragment.replace_html(&path, html)? {
        Ok(())
    } else {
        Err(PipelineError::StalePath { path })
    }
}

/// Replace every accepted match of `pattern` in `html`.
///
/// `replace` gets the captures of a match whose trailing boundary holds and
/// returns the markup for the span after the `lead` group, or `None` to keep it.
/// Returns `None` when nothing was replaced.
pub(crate) fn replace_references<F>(
    html: &str,
    pattern: &Regex,
    mut replace: F,
) -> Result<Option<String>, PipelineError>
where
    F: FnMut(&Captures<'_>) -> Result<Option<String>, PipelineError>,
{
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in pattern.captures_iter(html) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if !has_reference_boundary(&html[whole.end()..]) {
            continue;
        }
        let Some(replacement) = replace(&caps)? else {
            continue;
        };
        let start = caps.name("lead").map_or(whole.start(), |m| m.end());
        out.push_str(&html[last..start]);
        out.push_str(&replacement);
        last = whole.end();
    }

    if last == 0 {
        return Ok(None);
    }
    out.push_str(&html[last..]);
    Ok(Some(out))
}

/// Whether the text after a reference ends it cleanly.
///
/// Accepts end of text, a character outside `[0-9A-Za-z_]` other than `/`,
/// or trailing dots followed by such a character or end of text.
pub(crate) fn has_reference_boundary(rest: &str) -> bool {
    let after_dots = rest.trim_start_matches('.');
    match after_dots.chars().next() {
        None => true,
        Some('/') if after_dots.len() == rest.len() => false,
        Some(c) => !(c.is_ascii_alphanumeric() || c == '_'),
    }
}

/// Join `path` onto `base`, adding `/` unless `base` ends in `/` or `~`.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    if base.ends_with('/') || base.ends_with('~') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Anchor markup; `text_html` must already be escaped.
pub(crate) fn anchor(href: &str, class: &str, text_html: &str) -> String {
    format!(
        r#"<a href="{}" class="{class}">{text_html}</a>"#,
        escape_attr(href)
    )
}

/// Markup of the reference span (after the leading separator).
pub(crate) fn reference_span<'h>(caps: &Captures<'h>) -> &'h str {
    let whole = caps.get(0).map_or("", |m| m.as_str());
    let leading = caps.name("lead").map_or(0, |m| m.len());
    &whole[leading..]
}
