//! Traversal, ancestry and splicing over a [`Fragment`].
//!
//! Nodes are addressed by [`NodePath`], the child indices from the fragment
//! root. Callers that rewrite several nodes snapshot the paths first and then
//! splice in reverse document order: a splice only shifts later siblings, so
//! every earlier path stays valid and freshly inserted nodes are never
//! revisited.

use std::fmt;

use crate::node::{Element, Fragment, Node};
use crate::parser::{ParseError, parse};

/// Position of a node as child indices from the fragment root.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Create a path from child indices.
    #[must_use]
    pub fn new(indices: Vec<usize>) -> Self {
        Self(indices)
    }

    /// Child indices from the root.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    /// Number of ancestors of the addressed node.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len().saturating_sub(1)
    }

    fn split_last(&self) -> Option<(&usize, &[usize])> {
        self.0.split_last()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(usize::to_string).collect();
        write!(f, "/{}", parts.join("/"))
    }
}

/// Depth-first, pre-order iterator over all nodes of a fragment.
///
/// A clone continues independently from the same position; call
/// [`Fragment::descendants`] again to walk from the beginning.
#[derive(Clone, Debug)]
pub struct Descendants<'a> {
    /// Sibling lists being walked and the next index to visit in each.
    stack: Vec<(&'a [Node], usize)>,
    /// Indices of the elements whose children are on the stack.
    ancestors: Vec<usize>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = (NodePath, &'a Node);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let top = self.stack.last_mut()?;
            let (siblings, index) = *top;
            let Some(node) = siblings.get(index) else {
                self.stack.pop();
                self.ancestors.pop();
                continue;
            };
            top.1 += 1;

            let mut indices = self.ancestors.clone();
            indices.push(index);
            if let Node::Element(el) = node
                && !el.children.is_empty()
            {
                self.stack.push((&el.children, 0));
                self.ancestors.push(index);
            }
            return Some((NodePath(indices), node));
        }
    }
}

/// A text node yielded by [`Fragment::text_nodes`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextNode<'a> {
    /// Location of the node.
    pub path: NodePath,
    /// Decoded text content.
    pub text: &'a str,
}

/// Lazy sequence of text nodes in document order.
#[derive(Clone, Debug)]
pub struct TextNodes<'a> {
    inner: Descendants<'a>,
}

impl<'a> Iterator for TextNodes<'a> {
    type Item = TextNode<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.find_map(|(path, node)| match node {
            Node::Text(text) => Some(TextNode { path, text }),
            Node::Element(_) => None,
        })
    }
}

impl Fragment {
    /// Walk every node depth-first in document order.
    #[must_use]
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![(self.nodes.as_slice(), 0)],
            ancestors: Vec::new(),
        }
    }

    /// Walk every text node in document order.
    #[must_use]
    pub fn text_nodes(&self) -> TextNodes<'_> {
        TextNodes {
            inner: self.descendants(),
        }
    }

    /// Get the node at `path`.
    #[must_use]
    pub fn get(&self, path: &NodePath) -> Option<&Node> {
        let (&last, parents) = path.split_last()?;
        let mut nodes = &self.nodes;
        for &index in parents {
            match nodes.get(index) {
                Some(Node::Element(el)) => nodes = &el.children,
                _ => return None,
            }
        }
        nodes.get(last)
    }

    /// Ancestor elements of the node at `path`, outermost first.
    #[must_use]
    pub fn ancestors(&self, path: &NodePath) -> Vec<&Element> {
        let Some((_, parents)) = path.split_last() else {
            return Vec::new();
        };
        let mut ancestors = Vec::with_capacity(parents.len());
        let mut nodes = &self.nodes;
        for &index in parents {
            match nodes.get(index) {
                Some(Node::Element(el)) => {
                    ancestors.push(el);
                    nodes = &el.children;
                }
                _ => break,
            }
        }
        ancestors
    }

    /// Whether any ancestor of the node at `path` has one of `names`.
    #[must_use]
    pub fn has_ancestor(&self, path: &NodePath, names: &[&str]) -> bool {
        self.ancestors(path)
            .iter()
            .any(|el| names.contains(&el.name.as_str()))
    }

    /// Get the element at `path` mutably.
    pub fn element_mut(&mut self, path: &NodePath) -> Option<&mut Element> {
        let (&last, parents) = path.split_last()?;
        match self.siblings_mut(parents)?.get_mut(last)? {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    /// Replace the node at `path` with `nodes`.
    ///
    /// Returns `false` if `path` does not address a node.
    pub fn replace(&mut self, path: &NodePath, nodes: Vec<Node>) -> bool {
        let Some((&last, parents)) = path.split_last() else {
            return false;
        };
        let Some(siblings) = self.siblings_mut(parents) else {
            return false;
        };
        if last >= siblings.len() {
            return false;
        }
        siblings.splice(last..=last, nodes);
        true
    }

    /// Parse `html` and splice the result in place of the node at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `html` cannot be parsed.
    pub fn replace_html(&mut self, path: &NodePath, html: &str) -> Result<bool, ParseError> {
        let replacement = parse(html)?;
        Ok(self.replace(path, replacement.nodes))
    }

    fn siblings_mut(&mut self, parents: &[usize]) -> Option<&mut Vec<Node>> {
        let mut nodes = &mut self.nodes;
        for &index in parents {
            nodes = match nodes.get_mut(index) {
                Some(Node::Element(el)) => &mut el.children,
                _ => return None,
            };
        }
        Some(nodes)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fragment(markup: &str) -> Fragment {
        Fragment::parse(markup).unwrap()
    }

    #[test]
    fn test_descendants_pre_order() {
        let doc = fragment("<p>a<b>b</b></p>c");
        let visited: Vec<String> = doc
            .descendants()
            .map(|(path, node)| match node {
                Node::Element(el) => format!("{path}:{}", el.name),
                Node::Text(text) => format!("{path}:'{text}'"),
            })
            .collect();

        assert_eq!(visited, ["/0:p", "/0/0:'a'", "/0/1:b", "/0/1/0:'b'", "/1:'c'"]);
    }

    #[test]
    fn test_text_nodes_restartable() {
        let doc = fragment("<p>one<i>two</i></p>three");
        let nodes = doc.text_nodes();
        let first: Vec<&str> = nodes.clone().map(|n| n.text).collect();
        let second: Vec<&str> = nodes.map(|n| n.text).collect();

        assert_eq!(first, ["one", "two", "three"]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_has_ancestor() {
        let doc = fragment("<div><pre><span>code</span></pre></div><p>text</p>");
        let texts: Vec<_> = doc.text_nodes().collect();

        assert!(doc.has_ancestor(&texts[0].path, &["pre"]));
        assert!(!doc.has_ancestor(&texts[1].path, &["pre", "code"]));
        assert_eq!(doc.ancestors(&texts[0].path).len(), 3);
    }

    #[test]
    fn test_nested_paths_address_visited_node() {
        let doc = fragment("<p>x</p><div>y<pre><code>@a</code></pre><a>z</a></div>");

        for (path, node) in doc.descendants() {
            assert_eq!(doc.get(&path), Some(node), "path {path}");
        }
        let code_text = doc.text_nodes().find(|n| n.text == "@a").unwrap();
        assert_eq!(code_text.path, NodePath::new(vec![1, 1, 0, 0]));
        assert!(doc.has_ancestor(&code_text.path, &["pre"]));
    }

    #[test]
    fn test_replace_splices_in_place() {
        let mut doc = fragment("<p>a b c</p>");
        let path = doc.text_nodes().next().unwrap().path;

        assert!(doc.replace_html(&path, "a <b>b</b> c").unwrap());
        assert_eq!(doc.to_html(), "<p>a <b>b</b> c</p>");
    }

    #[test]
    fn test_reverse_order_splice_keeps_paths_valid() {
        let mut doc = fragment("<p>x<br>y</p>");
        let paths: Vec<NodePath> = doc.text_nodes().map(|n| n.path).collect();

        for path in paths.iter().rev() {
            doc.replace_html(path, "<i>1</i>2").unwrap();
        }
        assert_eq!(doc.to_html(), "<p><i>1</i>2<br><i>1</i>2</p>");
    }

    #[test]
    fn test_replace_invalid_path() {
        let mut doc = fragment("<p>a</p>");
        assert!(!doc.replace(&NodePath::new(vec![0, 5]), Vec::new()));
        assert!(!doc.replace(&NodePath::default(), Vec::new()));
    }

    #[test]
    fn test_get_and_element_mut() {
        let mut doc = fragment("<div><p>x</p></div>");
        let path = NodePath::new(vec![0, 0]);

        assert_eq!(doc.get(&path).and_then(Node::name), Some("p"));
        doc.element_mut(&path).unwrap().attrs.set("id", "a");
        assert_eq!(doc.to_html(), r#"<div><p id="a">x</p></div>"#);
    }
}
