//! Lenient HTML fragment parser.
//!
//! Built on the `quick-xml` reader with end-name checks disabled. Element
//! nesting is tracked on an explicit stack: end tags close the innermost open
//! element with the same name and are ignored when nothing matches, void
//! elements never open a scope, and anything still open at end of input is
//! closed implicitly.
//!
//! Before tokenizing, a `<` that cannot open markup is escaped so it stays
//! text (`I <3 you`, `1 < 2`), and an unterminated comment ends the input.

use std::borrow::Cow;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::entities::{decode_entities, decode_reference};
use crate::node::{Attributes, Element, Fragment, Node, is_void_element};

/// Synthetic wrapper that turns a fragment into a single-rooted document.
const ROOT_TAG: &str = "quill-fragment";

/// Sections copied through unchanged when terminated.
const VERBATIM_SECTIONS: &[(&str, &str)] = &[("<![CDATA[", "]]>"), ("<?", "?>")];

/// Error during markup parsing.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Markup could not be tokenized.
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Encoding error while decoding a token.
    #[error("Encoding error: {0}")]
    Encoding(#[from] quick_xml::encoding::EncodingError),
}

/// Parse markup into a [`Fragment`].
///
/// # Errors
///
/// Returns an error if the reader cannot tokenize the input.
pub fn parse(markup: &str) -> Result<Fragment, ParseError> {
    let markup = escape_stray_lt(markup);
    let wrapped = format!("<{ROOT_TAG}>{markup}</{ROOT_TAG}>");

    let mut reader = Reader::from_str(&wrapped);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut builder = TreeBuilder::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let el = start_element(&e);
                if el.name == ROOT_TAG && !builder.started {
                    builder.started = true;
                } else if is_void_element(&el.name) {
                    builder.append(Node::Element(el));
                } else {
                    builder.open(el);
                }
            }
            Event::Empty(e) => {
                builder.append(Node::Element(start_element(&e)));
            }
            Event::Text(e) => {
                let text = reader.decoder().decode(&e)?;
                builder.append_text(&text);
            }
            Event::GeneralRef(e) => {
                let name = reader.decoder().decode(&e)?;
                match decode_reference(&name) {
                    Some(text) => builder.append_text(&text),
                    None => builder.append_text(&format!("&{name};")),
                }
            }
            Event::CData(e) => {
                builder.append_text(&String::from_utf8_lossy(&e));
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();
                builder.close(&name);
            }
            Event::Eof => break,
            Event::Comment(_) | Event::Decl(_) | Event::PI(_) | Event::DocType(_) => {}
        }
    }

    Ok(builder.finish())
}

/// Escape every `<` that does not start a tag, comment, CDATA section,
/// doctype or processing instruction, and cut an unterminated comment.
fn escape_stray_lt(markup: &str) -> Cow<'_, str> {
    if !markup.contains('<') {
        return Cow::Borrowed(markup);
    }

    let mut out = String::with_capacity(markup.len() + 16);
    let mut rest = markup;
    while let Some(pos) = rest.find('<') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(body) = tail.strip_prefix("<!--") {
            let Some(end) = body.find("-->") else {
                return Cow::Owned(out);
            };
            let len = "<!--".len() + end + "-->".len();
            out.push_str(&tail[..len]);
            rest = &tail[len..];
            continue;
        }

        let verbatim = VERBATIM_SECTIONS.iter().find_map(|&(open, close)| {
            let body = tail.strip_prefix(open)?;
            body.find(close).map(|end| open.len() + end + close.len())
        });
        if let Some(len) = verbatim {
            out.push_str(&tail[..len]);
            rest = &tail[len..];
            continue;
        }

        if opens_tag(tail) {
            out.push('<');
        } else {
            out.push_str("&lt;");
        }
        rest = &tail[1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Whether `tail` (starting at `<`) is a start tag, end tag or doctype that
/// is closed by a later `>`.
fn opens_tag(tail: &str) -> bool {
    let bytes = tail.as_bytes();
    let name_start = match bytes.get(1) {
        Some(b'/') => bytes.get(2),
        Some(b'!') => {
            return tail
                .get(2..9)
                .is_some_and(|word| word.eq_ignore_ascii_case("doctype"))
                && tail.contains('>');
        }
        other => other,
    };
    name_start.is_some_and(u8::is_ascii_alphabetic) && tail.contains('>')
}

/// Build an element (without children) from a start tag.
fn start_element(e: &BytesStart) -> Element {
    let name = String::from_utf8_lossy(e.name().as_ref()).to_ascii_lowercase();

    let mut attrs = Attributes::new();
    for attr in e.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        // First occurrence wins, as in browsers
        if attrs.contains(&key) {
            continue;
        }
        let value = decode_entities(&String::from_utf8_lossy(&attr.value));
        attrs.set(key, value);
    }

    Element {
        name,
        attrs,
        children: Vec::new(),
    }
}

/// Stack of open elements; index 0 collects top-level nodes.
#[derive(Default)]
struct TreeBuilder {
    open: Vec<Element>,
    top: Vec<Node>,
    started: bool,
}

impl TreeBuilder {
    fn current(&mut self) -> &mut Vec<Node> {
        match self.open.last_mut() {
            Some(el) => &mut el.children,
            None => &mut self.top,
        }
    }

    fn append(&mut self, node: Node) {
        self.current().push(node);
    }

    /// Append text, merging with a preceding text node.
    fn append_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let children = self.current();
        if let Some(Node::Text(last)) = children.last_mut() {
            last.push_str(text);
        } else {
            children.push(Node::Text(text.to_owned()));
        }
    }

    fn open(&mut self, el: Element) {
        self.open.push(el);
    }

    /// Close the innermost open element named `name`, if any.
    fn close(&mut self, name: &str) {
        let Some(index) = self.open.iter().rposition(|el| el.name == name) else {
            return;
        };
        while self.open.len() > index {
            self.pop();
        }
    }

    fn pop(&mut self) {
        if let Some(el) = self.open.pop() {
            self.append(Node::Element(el));
        }
    }

    fn finish(mut self) -> Fragment {
        while !self.open.is_empty() {
            self.pop();
        }
        Fragment::new(self.top)
    }
}
