//! Heading anchors and table of contents collection.

use std::collections::HashMap;

use quill_dom::{Element, Node, NodePath};

use crate::context::Context;
use crate::error::PipelineError;
use crate::filter::Filter;
use crate::result::{Markup, PipelineResult};

/// Table of contents entry.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TocEntry {
    /// Heading level (1-6).
    pub level: u8,
    /// Heading text.
    pub title: String,
    /// Anchor ID for linking.
    pub id: String,
}

/// Convert heading text to an anchor id.
///
/// Lower-cases ASCII alphanumerics and joins words with single dashes.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut result = String::new();
    let mut last_was_dash = true;

    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            result.push(c.to_ascii_lowercase());
            last_was_dash = false;
        } else if !last_was_dash && (c.is_whitespace() || c == '-' || c == '_') {
            result.push('-');
            last_was_dash = true;
        }
    }

    if result.ends_with('-') {
        result.pop();
    }
    result
}

fn heading_level(name: &str) -> Option<u8> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

/// Existing anchor id if the heading was already processed.
fn existing_anchor(heading: &Element) -> Option<&str> {
    let anchor = heading.children.first()?.as_element()?;
    if anchor.name != "a" || anchor.attrs.get("class") != Some("anchor") {
        return None;
    }
    anchor.attrs.get("id")
}

/// Adds an anchor link to every `h1`-`h6` and records the headings.
///
/// Ids are unique within one run: repeated slugs get `-1`, `-2`, ...
/// Headings that already start with an anchor keep it.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableOfContentsFilter;

impl Filter for TableOfContentsFilter {
    fn name(&self) -> &'static str {
        "TableOfContentsFilter"
    }

    fn apply(
        &self,
        input: Markup,
        _context: &Context,
        result: &mut PipelineResult,
    ) -> Result<Markup, PipelineError> {
        let mut fragment = input.into_fragment()?;
        let mut id_counts: HashMap<String, usize> = HashMap::new();
        let mut pending: Vec<(NodePath, String)> = Vec::new();

        for (path, node) in fragment.descendants() {
            let Some(heading) = node.as_element() else {
                continue;
            };
            let Some(level) = heading_level(&heading.name) else {
                continue;
            };

            let title = heading.text_content().trim().to_owned();
            let id = match existing_anchor(heading) {
                Some(id) => {
                    *id_counts.entry(id.to_owned()).or_default() += 1;
                    id.to_owned()
                }
                None => {
                    let base_id = slugify(&title);
                    let count = id_counts.entry(base_id.clone()).or_default();
                    let id = match *count {
                        0 => base_id,
                        n => format!("{base_id}-{n}"),
                    };
                    *count += 1;
                    pending.push((path, id.clone()));
                    id
                }
            };
            result.table_of_contents.push(TocEntry { level, title, id });
        }

        for (path, id) in pending.into_iter().rev() {
            if let Some(heading) = fragment.element_mut(&path) {
                let anchor = Element::new("a")
                    .with_attr("id", id.as_str())
                    .with_attr("class", "anchor")
                    .with_attr("href", format!("#{id}"))
                    .with_attr("aria-hidden", "true");
                heading.children.insert(0, Node::Element(anchor));
            }
        }

        Ok(Markup::Tree(fragment))
    }
}
