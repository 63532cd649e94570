//! Whitelist-driven tree sanitizer.
//!
//! Elements outside the whitelist are unwrapped (children promoted and checked
//! again) or, when marked for content removal, dropped with their subtree.
//! Retained elements keep only allowed attributes, and URI attributes keep
//! only allowed protocols. Structural rules unwrap list items and table parts
//! that have no retained list or table ancestor.

use std::sync::LazyLock;

use quill_dom::{Element, Fragment, Node};
use regex::Regex;

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult};
use crate::whitelist::{Protocol, Whitelist};

/// Scheme prefix: everything up to the first `:` not preceded by `/`, `?` or `#`.
static SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^/?#]*?):").expect("invalid scheme regex"));

/// Sanitize `fragment` in place against `whitelist`.
pub fn sanitize(fragment: &mut Fragment, whitelist: &Whitelist) {
    let nodes = std::mem::take(&mut fragment.nodes);
    let mut ancestors = Vec::new();
    fragment.nodes = clean_nodes(nodes, whitelist, &mut ancestors);
}

fn clean_nodes(nodes: Vec<Node>, whitelist: &Whitelist, ancestors: &mut Vec<String>) -> Vec<Node> {
    let mut out = Vec::with_capacity(nodes.len());
    for node in nodes {
        clean_node(node, whitelist, ancestors, &mut out);
    }
    out
}

fn clean_node(node: Node, whitelist: &Whitelist, ancestors: &mut Vec<String>, out: &mut Vec<Node>) {
    let mut el = match node {
        Node::Text(text) => {
            push_text(out, text);
            return;
        }
        Node::Element(el) => el,
    };

    if !whitelist.allows_element(&el.name) {
        if !whitelist.removes_contents(&el.name) {
            for child in el.children {
                clean_node(child, whitelist, ancestors, out);
            }
        }
        return;
    }

    if !satisfies_rules(&el.name, whitelist, ancestors) {
        for child in el.children {
            clean_node(child, whitelist, ancestors, out);
        }
        return;
    }

    clean_attributes(&mut el, whitelist);

    let children = std::mem::take(&mut el.children);
    ancestors.push(el.name.clone());
    el.children = clean_nodes(children, whitelist, ancestors);
    ancestors.pop();
    out.push(Node::Element(el));
}

/// Append text, merging with a preceding text node left by unwrapping.
fn push_text(out: &mut Vec<Node>, text: String) {
    if let Some(Node::Text(last)) = out.last_mut() {
        last.push_str(&text);
    } else {
        out.push(Node::Text(text));
    }
}

fn satisfies_rules(name: &str, whitelist: &Whitelist, ancestors: &[String]) -> bool {
    whitelist
        .rules()
        .iter()
        .filter(|rule| rule.elements.iter().any(|e| e == name))
        .all(|rule| {
            ancestors
                .iter()
                .any(|a| rule.required_ancestors.contains(a))
        })
}

fn clean_attributes(el: &mut Element, whitelist: &Whitelist) {
    let name = el.name.as_str();
    el.attrs.retain(|attr, value| {
        whitelist.allows_attribute(name, attr)
            && whitelist
                .protocols(name, attr)
                .is_none_or(|allowed| allowed.contains(&uri_protocol(value)))
    });
}

/// Protocol of a URI attribute value.
///
/// Whitespace and control characters are ignored and the scheme is compared
/// case-insensitively, so `JaVa\tScRiPt:` yields `javascript`.
fn uri_protocol(value: &str) -> Protocol {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    match SCHEME_RE.captures(&cleaned) {
        Some(caps) => Protocol::Scheme(caps[1].to_ascii_lowercase()),
        None => Protocol::Relative,
    }
}

/// Filter applying the context whitelist.
#[derive(Clone, Copy, Debug, Default)]
pub struct SanitizationFilter;

impl Filter for SanitizationFilter {
    fn name(&self) -> &'static str {
        "SanitizationFilter"
    }

    fn apply(
        &self,
        input: Markup,
        context: &Context,
        _result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        let mut fragment = input.into_fragment()?;
        sanitize(&mut fragment, context.whitelist());
        Ok(Markup::Tree(fragment))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::whitelist::StructuralRule;

    fn clean(markup: &str, whitelist: &Whitelist) -> String {
        let mut fragment = Fragment::parse(markup).unwrap();
        sanitize(&mut fragment, whitelist);
        fragment.to_html()
    }

    fn clean_main(markup: &str) -> String {
        clean(markup, &Whitelist::main())
    }

    #[test]
    fn test_script_removed_with_contents() {
        assert_eq!(
            clean_main(r#"<p><img src="http://x/img.png"/><script>evil()</script></p>"#),
            r#"<p><img src="http://x/img.png"></p>"#
        );
    }

    #[test]
    fn test_orphan_list_items_unwrapped() {
        assert_eq!(clean_main("a\n<li>b</li>\nc"), "a\nb\nc");
    }

    #[test]
    fn test_list_items_kept_inside_list() {
        assert_eq!(
            clean_main("<ul><li>a</li></ul><ol><li>b</li></ol>"),
            "<ul><li>a</li></ul><ol><li>b</li></ol>"
        );
    }

    #[test]
    fn test_orphan_table_parts_unwrapped() {
        assert_eq!(clean_main("<tr><td>x</td><th>y</th></tr>"), "xy");
        assert_eq!(
            clean_main("<table><tbody><tr><td>x</td></tr></tbody></table>"),
            "<table><tbody><tr><td>x</td></tr></tbody></table>"
        );
    }

    #[test]
    fn test_list_inside_removed_wrapper() {
        assert_eq!(
            clean_main("<ul><span><li>a</li></span></ul>"),
            "<ul><li>a</li></ul>"
        );
    }

    #[test]
    fn test_list_ancestor_must_be_retained() {
        let whitelist = Whitelist::new()
            .with_elements(&["li"])
            .with_rule(StructuralRule::new(&["li"], &["ul"]));

        assert_eq!(clean("<ul><li>a</li></ul>", &whitelist), "a");
    }

    #[test]
    fn test_disallowed_element_children_promoted() {
        assert_eq!(
            clean_main("<p><span><b>x</b><font>y</font></span></p>"),
            "<p><b>x</b>y</p>"
        );
    }

    #[test]
    fn test_disallowed_attributes_dropped() {
        assert_eq!(
            clean_main(r#"<p class="x" onclick="evil()" lang="en">t</p>"#),
            r#"<p lang="en">t</p>"#
        );
        assert_eq!(clean_main(r#"<b href="/x">t</b>"#), "<b>t</b>");
    }

    #[test]
    fn test_javascript_href_dropped() {
        assert_eq!(clean_main(r#"<a href="javascript:alert(1)">x</a>"#), "<a>x</a>");
        assert_eq!(
            clean_main(r#"<a href=" JaVa&#x09;ScRiPt:alert(1)">x</a>"#),
            "<a>x</a>"
        );
    }

    #[test]
    fn test_allowed_protocols_kept() {
        assert_eq!(
            clean_main(r#"<a href="https://github.com">x</a>"#),
            r#"<a href="https://github.com">x</a>"#
        );
        assert_eq!(
            clean_main(r#"<a href="MAILTO:a@b.c">x</a>"#),
            r#"<a href="MAILTO:a@b.c">x</a>"#
        );
        assert_eq!(
            clean_main(r#"<a href="/docs/a:b">x</a>"#),
            r#"<a href="/docs/a:b">x</a>"#
        );
    }

    #[test]
    fn test_relative_requires_relative_protocol() {
        let whitelist = Whitelist::new()
            .with_elements(&["a"])
            .with_attributes("a", &["href"])
            .with_protocols("a", "href", &["https"]);

        assert_eq!(clean(r#"<a href="/x">x</a>"#, &whitelist), "<a>x</a>");
    }

    #[test]
    fn test_img_data_uri_dropped() {
        assert_eq!(
            clean_main(r#"<img src="data:image/png;base64,AAA" alt="x">"#),
            r#"<img alt="x">"#
        );
    }

    #[test]
    fn test_strip_all_keeps_text_only() {
        assert_eq!(
            clean("<h1>Title</h1><p>a <b>b</b></p><style>p{}</style>", &Whitelist::strip_all()),
            "Titlea b"
        );
    }

    #[test]
    fn test_limited_profile_unwraps_tables() {
        assert_eq!(
            clean("<table><tr><td><b>x</b></td></tr></table>", &Whitelist::limited()),
            "<b>x</b>"
        );
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "<p>a<script>x</script><li>b</li><a href='javascript:x' title=t>c</a></p>",
            "<table><td>x</td></table><div itemscope>y</div>",
            "<ul><span><li>a &amp; b</li></span></ul>",
        ];
        for input in inputs {
            let once = clean_main(input);
            assert_eq!(clean_main(&once), once, "input: {input}");
        }
    }

    #[test]
    fn test_sanitization_filter_uses_context_whitelist() {
        let context = Context::new().with_whitelist(Whitelist::strip_all());
        let mut result = PipelineResult::new();

        let output = SanitizationFilter
            .call("<p>x</p>".into(), &context, &mut result)
            .unwrap();
        assert_eq!(output.into_html(), "x");
    }
}
