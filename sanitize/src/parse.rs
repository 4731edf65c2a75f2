//! Markup parsing into a [`Document`].
//!
//! html5ever does the tokenizing and tree construction, so the input is read
//! exactly the way a browser would read it, including the error recovery. The
//! resulting DOM is then copied into the arena tree.

use crate::node::{Attribute, Comment, Document, Element, Node, Text};
use ego_tree::NodeId;
use html5ever::driver::ParseOpts;
use html5ever::tendril::TendrilSink;
use html5ever::{parse_fragment as parse_html_fragment, QualName};
use markup5ever::{local_name, namespace_url, ns};
use markup5ever_rcdom::{Handle, NodeData, RcDom};

/// Parse an HTML fragment as the contents of a `<body>` element.
///
/// Doctypes and processing instructions are dropped. Template contents are
/// attached as ordinary children of the `template` element.
pub fn parse_fragment(markup: &str) -> Document {
    let dom = parse_html_fragment(
        RcDom::default(),
        ParseOpts::default(),
        QualName::new(None, ns!(html), local_name!("body")),
        vec![],
    )
    .one(markup);

    let mut document = Document::new();
    let root = document.root_id();

    // the fragment parser wraps its output in a synthetic <html> element
    for child in dom.document.children.borrow().iter() {
        match child.data {
            NodeData::Element { ref name, .. } if name.local == local_name!("html") => {
                convert_children(child, &mut document, root);
            }
            _ => convert_children_of(std::slice::from_ref(child), &mut document, root),
        }
    }

    document
}

/// Copy the children of `handle` under `parent`.
fn convert_children(handle: &Handle, document: &mut Document, parent: NodeId) {
    let children = children_of(handle);
    convert_children_of(&children, document, parent);
}

/// Copy `handles` and their subtrees under `parent` without recursing.
fn convert_children_of(handles: &[Handle], document: &mut Document, parent: NodeId) {
    let mut stack: Vec<(Handle, NodeId)> = handles
        .iter()
        .rev()
        .map(|handle| (handle.clone(), parent))
        .collect();

    while let Some((handle, parent)) = stack.pop() {
        let Some(node) = convert_node(&handle) else {
            continue;
        };

        let Some(id) = document.append(parent, node) else {
            continue;
        };

        for child in children_of(&handle).into_iter().rev() {
            stack.push((child, id));
        }
    }
}

/// The children of a DOM node. A template's children live in its contents.
fn children_of(handle: &Handle) -> Vec<Handle> {
    if let NodeData::Element {
        ref template_contents,
        ..
    } = handle.data
    {
        if let Some(ref contents) = *template_contents.borrow() {
            return contents.children.borrow().clone();
        }
    }

    handle.children.borrow().clone()
}

fn convert_node(handle: &Handle) -> Option<Node> {
    match handle.data {
        NodeData::Document => Some(Node::Document),
        NodeData::Text { ref contents } => Some(Node::Text(Text {
            text: contents.borrow().to_string(),
        })),
        NodeData::Comment { ref contents } => Some(Node::Comment(Comment {
            comment: contents.to_string(),
        })),
        NodeData::Element {
            ref name,
            ref attrs,
            ..
        } => {
            let attrs = attrs
                .borrow()
                .iter()
                .map(|attr| Attribute::new(qualified_name(&attr.name), attr.value.to_string()))
                .collect();

            Some(Node::Element(Element::new(name.local.to_string(), attrs)))
        }
        NodeData::Doctype { .. } | NodeData::ProcessingInstruction { .. } => None,
    }
}

/// `prefix:local` for namespaced attributes such as `xlink:href`.
fn qualified_name(name: &QualName) -> String {
    match name.prefix {
        Some(ref prefix) => format!("{}:{}", prefix, name.local),
        None => name.local.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(doc: &Document) -> Vec<&str> {
        doc.elements().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn parses_fragment_without_wrappers() {
        let doc = parse_fragment("<p class=x>Hello <b>world</b></p>tail");
        assert_eq!(names(&doc), ["p", "b"]);
        assert_eq!(doc.text(), "Hello worldtail");

        let p = doc.elements().next().unwrap();
        assert_eq!(p.attr("class"), Some("x"));
        assert_eq!(doc.root().children().count(), 2);
    }

    #[test]
    fn decodes_entities() {
        let doc = parse_fragment(r#"<a href="/?a=1&amp;b=2">&lt;x&gt;</a>"#);
        assert_eq!(doc.elements().next().unwrap().attr("href"), Some("/?a=1&b=2"));
        assert_eq!(doc.text(), "<x>");
    }

    #[test]
    fn keeps_comments_and_drops_doctype() {
        let doc = parse_fragment("<!DOCTYPE html><!-- note -->x");
        let kids: Vec<_> = doc.root().children().map(|c| c.value().clone()).collect();
        assert_eq!(kids.len(), 2);
        assert_eq!(kids[0].as_comment().map(|c| &**c), Some(" note "));
    }

    #[test]
    fn lowercases_names() {
        let doc = parse_fragment(r#"<DIV ID="a">x</DIV>"#);
        let el = doc.elements().next().unwrap();
        assert_eq!(el.name, "div");
        assert_eq!(el.attrs, vec![Attribute::new("id", "a")]);
    }

    #[test]
    fn template_contents_become_children() {
        let doc = parse_fragment("<template><b>x</b></template>");
        assert_eq!(names(&doc), ["template", "b"]);
    }

    #[test]
    fn namespaced_attributes_keep_prefix() {
        let doc = parse_fragment(r##"<svg><a xlink:href="#x">y</a></svg>"##);
        let a = doc.elements().find(|e| e.name == "a").unwrap();
        assert_eq!(a.attr("xlink:href"), Some("#x"));
    }

    #[test]
    fn deep_markup_does_not_overflow() {
        let depth = 5_000;
        let markup = format!("{}x{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let doc = parse_fragment(&markup);
        assert_eq!(doc.text(), "x");
        assert!(doc.elements().count() >= 1);
    }
}
