//! HTML serializer.

use crate::node::{Node, is_void_element};

/// Serialize a node list into `out`.
pub(crate) fn write_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        write_node(node, out);
    }
}

/// Serialize a single node recursively.
fn write_node(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => push_escaped(text, false, out),
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);

            for (key, value) in el.attrs.iter() {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                push_escaped(value, true, out);
                out.push('"');
            }
            out.push('>');

            if is_void_element(&el.name) {
                return;
            }

            write_nodes(&el.children, out);

            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

/// Escape text for element content.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(text, false, &mut out);
    out
}

/// Escape text for a double-quoted attribute value.
#[must_use]
pub fn escape_attr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped(text, true, &mut out);
    out
}

fn push_escaped(text: &str, escape_quotes: bool, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if escape_quotes => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
