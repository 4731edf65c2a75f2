//! HTML nodes and the arena tree that owns them.

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeRef, Tree};
use std::fmt;
use std::ops::Deref;

/// A markup node.
///
/// The set of kinds is closed: the walker matches on every variant, so a new
/// kind cannot slip through filtering unnoticed.
#[derive(Clone, PartialEq, Eq)]
pub enum Node {
    /// The document (or fragment) root.
    Document,

    /// An element.
    Element(Element),

    /// Text.
    Text(Text),

    /// A comment.
    Comment(Comment),
}

impl Node {
    /// Returns true if node is the document root.
    pub fn is_document(&self) -> bool {
        matches!(*self, Node::Document)
    }

    /// Returns true if node is an element.
    pub fn is_element(&self) -> bool {
        matches!(*self, Node::Element(_))
    }

    /// Returns true if node is text.
    pub fn is_text(&self) -> bool {
        matches!(*self, Node::Text(_))
    }

    /// Returns true if node is a comment.
    pub fn is_comment(&self) -> bool {
        matches!(*self, Node::Comment(_))
    }

    /// Returns self as an element.
    pub fn as_element(&self) -> Option<&Element> {
        match *self {
            Node::Element(ref e) => Some(e),
            _ => None,
        }
    }

    /// Returns self as text.
    pub fn as_text(&self) -> Option<&Text> {
        match *self {
            Node::Text(ref t) => Some(t),
            _ => None,
        }
    }

    /// Returns self as a comment.
    pub fn as_comment(&self) -> Option<&Comment> {
        match *self {
            Node::Comment(ref c) => Some(c),
            _ => None,
        }
    }
}

// Always use one line.
impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match *self {
            Node::Document => write!(f, "Document"),
            Node::Element(ref e) => write!(f, "Element({:?})", e),
            Node::Text(ref t) => write!(f, "Text({:?})", t),
            Node::Comment(ref c) => write!(f, "Comment({:?})", c),
        }
    }
}

/// A single `name="value"` pair on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Attribute {
    /// The attribute name.
    pub name: String,
    /// The attribute value, already entity-decoded.
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// An HTML element.
#[derive(Clone, PartialEq, Eq)]
pub struct Element {
    /// The element name, in whatever case the source used.
    pub name: String,

    /// The element attributes in source order.
    pub attrs: Vec<Attribute>,
}

impl Element {
    /// Create a new element.
    pub fn new(name: impl Into<String>, attrs: Vec<Attribute>) -> Self {
        Element {
            name: name.into(),
            attrs,
        }
    }

    /// Returns the element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value of the first attribute matching `name`, ignoring ASCII case.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(|a| a.value.as_str())
    }

    /// Returns an iterator over the element's attributes.
    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs
            .iter()
            .map(|a| (a.name.as_str(), a.value.as_str()))
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "<{}", self.name())?;
        for (key, value) in self.attrs() {
            write!(f, " {}={:?}", key, value)?;
        }
        write!(f, ">")
    }
}

/// HTML text.
#[derive(Clone, PartialEq, Eq)]
pub struct Text {
    /// The text.
    pub text: String,
}

impl Deref for Text {
    type Target = str;

    fn deref(&self) -> &str {
        self.text.deref()
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "{:?}", self.deref())
    }
}

/// An HTML comment.
#[derive(Clone, PartialEq, Eq)]
pub struct Comment {
    /// The comment text, without the `<!--` `-->` delimiters.
    pub comment: String,
}

impl Deref for Comment {
    type Target = str;

    fn deref(&self) -> &str {
        self.comment.deref()
    }
}

impl fmt::Debug for Comment {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        write!(f, "<!-- {:?} -->", self.deref())
    }
}

/// A markup tree.
///
/// Nodes are stored in an arena and addressed by [`NodeId`], so building,
/// walking and dropping a tree never recurses, however deep it nests.
#[derive(Debug, Clone)]
pub struct Document {
    /// The node tree.
    pub tree: Tree<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Document {
            tree: Tree::new(Node::Document),
        }
    }

    /// Wraps an existing tree. The root may be any node kind.
    pub fn from_tree(tree: Tree<Node>) -> Self {
        Document { tree }
    }

    /// Returns the root node.
    pub fn root(&self) -> NodeRef<'_, Node> {
        self.tree.root()
    }

    /// Returns the id of the root node.
    pub fn root_id(&self) -> NodeId {
        self.tree.root().id()
    }

    /// Returns true when the root has no children.
    pub fn is_empty(&self) -> bool {
        !self.tree.root().has_children()
    }

    /// Appends `node` as the last child of `parent`, returning the new id.
    pub fn append(&mut self, parent: NodeId, node: Node) -> Option<NodeId> {
        self.tree
            .get_mut(parent)
            .map(|mut parent| parent.append(node).id())
    }

    /// Appends an element as the last child of `parent`.
    pub fn append_element(
        &mut self,
        parent: NodeId,
        name: &str,
        attrs: Vec<Attribute>,
    ) -> Option<NodeId> {
        self.append(parent, Node::Element(Element::new(name, attrs)))
    }

    /// Appends a text node as the last child of `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: &str) -> Option<NodeId> {
        self.append(
            parent,
            Node::Text(Text {
                text: text.to_string(),
            }),
        )
    }

    /// Appends a comment as the last child of `parent`.
    pub fn append_comment(&mut self, parent: NodeId, comment: &str) -> Option<NodeId> {
        self.append(
            parent,
            Node::Comment(Comment {
                comment: comment.to_string(),
            }),
        )
    }

    /// Returns an iterator over every element in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.tree.root().descendants().filter_map(|n| n.value().as_element())
    }

    /// Concatenated text content of the whole tree.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in self.tree.root().descendants() {
            if let Some(text) = node.value().as_text() {
                out.push_str(text);
            }
        }
        out
    }
}

/// Structural equality: same shape, same node values, same order.
impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        let mut left = self.tree.root().traverse();
        let mut right = other.tree.root().traverse();

        loop {
            match (left.next(), right.next()) {
                (None, None) => return true,
                (Some(Edge::Open(a)), Some(Edge::Open(b))) => {
                    if a.value() != b.value() {
                        return false;
                    }
                }
                (Some(Edge::Close(_)), Some(Edge::Close(_))) => (),
                _ => return false,
            }
        }
    }
}

impl Eq for Document {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_keeps_order() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let p = doc.append_element(root, "p", vec![]).unwrap();
        doc.append_text(p, "a");
        doc.append_text(p, "b");
        doc.append_comment(root, "c");

        assert_eq!(doc.text(), "ab");
        assert_eq!(doc.elements().count(), 1);
        assert!(!doc.is_empty());
    }

    #[test]
    fn attr_lookup_ignores_case() {
        let el = Element::new("A", vec![Attribute::new("HREF", "/x")]);
        assert_eq!(el.attr("href"), Some("/x"));
        assert_eq!(el.attr("title"), None);
    }

    #[test]
    fn structural_equality() {
        let mut a = Document::new();
        let root = a.root_id();
        let b_el = a.append_element(root, "b", vec![]).unwrap();
        a.append_text(b_el, "x");

        let mut b = Document::new();
        let root = b.root_id();
        let b_el = b.append_element(root, "b", vec![]).unwrap();
        b.append_text(b_el, "x");
        assert_eq!(a, b);

        // same values, different shape
        let mut c = Document::new();
        let root = c.root_id();
        c.append_element(root, "b", vec![]);
        c.append_text(root, "x");
        assert_ne!(a, c);
    }

    #[test]
    fn deep_tree_drops_without_recursion() {
        let mut doc = Document::new();
        let mut parent = doc.root_id();
        for _ in 0..200_000 {
            parent = doc.append_element(parent, "div", vec![]).unwrap();
        }
        assert_eq!(doc.elements().count(), 200_000);
        drop(doc);
    }
}
