//! The tree transform.

use crate::attributes::filter_attributes;
use crate::embed::match_cluster;
use crate::node::{Document, Element, Node};
use crate::policy::Policy;
use ego_tree::{NodeId, NodeRef};

/// Sanitize `input` into a new tree holding only what `policy` allows.
///
/// The input is walked once, depth first, with an explicit stack of
/// `(input node, output parent)` pairs, so nesting depth costs heap rather
/// than call stack. For each node:
///
/// - text is copied;
/// - comments are copied only when the policy allows them;
/// - a trusted embed cluster is copied whole with its attributes filtered
///   against the embed pattern;
/// - an allowed element is copied with filtered attributes and its children
///   are walked beneath the copy;
/// - a disallowed element listed in `remove_contents` is dropped along with
///   its subtree;
/// - any other element is unwrapped: its children are walked in its place.
pub fn sanitize_tree(input: &Document, policy: &Policy) -> Document {
    let mut out = Document::new();
    let out_root = out.root_id();
    let mut stack: Vec<(NodeRef<'_, Node>, NodeId)> = vec![(input.root(), out_root)];

    while let Some((node, parent)) = stack.pop() {
        match node.value() {
            Node::Document => push_children(&mut stack, node, parent),
            Node::Text(text) => {
                out.append(parent, Node::Text(text.clone()));
            }
            Node::Comment(comment) => {
                if policy.allow_comments() {
                    out.append(parent, Node::Comment(comment.clone()));
                }
            }
            Node::Element(el) => {
                if let Some(cluster) = match_cluster(node, policy) {
                    log::trace!("keeping trusted embed <{}>", el.name);
                    cluster.emit(&mut out, parent, policy);
                    continue;
                }

                let name = el.name.to_ascii_lowercase();

                if policy.allows_element(&name) {
                    let attrs = filter_attributes(&name, &el.attrs, policy);

                    if let Some(id) = out.append(parent, Node::Element(Element { name, attrs })) {
                        push_children(&mut stack, node, id);
                    }
                } else if policy.removes_contents(&name) {
                    log::trace!("removing <{}> with its contents", name);
                } else {
                    log::trace!("unwrapping <{}>", name);
                    push_children(&mut stack, node, parent);
                }
            }
        }
    }

    out
}

/// Queue the children of `node` for `parent`, last first, so they pop in
/// document order.
fn push_children<'a>(stack: &mut Vec<(NodeRef<'a, Node>, NodeId)>, node: NodeRef<'a, Node>, parent: NodeId) {
    let mut child = node.last_child();

    while let Some(c) = child {
        stack.push((c, parent));
        child = c.prev_sibling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attribute;
    use crate::policy::{Preset, RELATIVE};

    fn names(doc: &Document) -> Vec<String> {
        doc.elements().map(|e| e.name.clone()).collect()
    }

    #[test]
    fn unwraps_unknown_elements_in_place() {
        let policy = Policy::builder().with_elements(["b"]).build().unwrap();

        // a<x>b<b>c</b>d</x>e
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.append_text(root, "a");
        let x = doc.append_element(root, "x", vec![]).unwrap();
        doc.append_text(x, "b");
        let b = doc.append_element(x, "B", vec![]).unwrap();
        doc.append_text(b, "c");
        doc.append_text(x, "d");
        doc.append_text(root, "e");

        let out = sanitize_tree(&doc, &policy);
        assert_eq!(names(&out), ["b"]);
        assert_eq!(out.text(), "abcde");

        let kids: Vec<_> = out.root().children().map(|c| c.value().clone()).collect();
        assert_eq!(kids.len(), 5);
        assert!(kids[2].is_element());
    }

    #[test]
    fn removes_danger_class_with_contents() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let script = doc.append_element(root, "SCRIPT", vec![]).unwrap();
        doc.append_text(script, "alert(1)");
        let style = doc.append_element(root, "style", vec![]).unwrap();
        doc.append_text(style, "body{}");

        let out = sanitize_tree(&doc, &Policy::default());
        assert!(out.is_empty());
    }

    #[test]
    fn danger_class_is_configurable() {
        let policy = Policy::builder()
            .with_remove_contents(["blink"])
            .build()
            .unwrap();

        let mut doc = Document::new();
        let root = doc.root_id();
        let blink = doc.append_element(root, "blink", vec![]).unwrap();
        doc.append_text(blink, "gone");
        let script = doc.append_element(root, "script", vec![]).unwrap();
        doc.append_text(script, "kept as text");

        let out = sanitize_tree(&doc, &policy);
        assert_eq!(out.text(), "kept as text");
    }

    #[test]
    fn comments_follow_policy() {
        let mut doc = Document::new();
        let root = doc.root_id();
        doc.append_comment(root, " hi ");

        assert!(sanitize_tree(&doc, &Policy::default()).is_empty());

        let policy = Policy::builder().with_allow_comments(true).build().unwrap();
        let out = sanitize_tree(&doc, &policy);
        assert_eq!(out.root().first_child().unwrap().value().as_comment().map(|c| &**c), Some(" hi "));
    }

    #[test]
    fn filters_attributes_of_kept_elements() {
        let policy = Policy::builder()
            .with_elements(["a"])
            .with_attributes("a", ["href"])
            .with_protocols("a", "href", ["https", RELATIVE])
            .build()
            .unwrap();

        let mut doc = Document::new();
        let root = doc.root_id();
        let a = doc
            .append_element(
                root,
                "A",
                vec![
                    Attribute::new("HREF", "javascript:alert(1)"),
                    Attribute::new("onclick", "alert(1)"),
                ],
            )
            .unwrap();
        doc.append_text(a, "x");

        let out = sanitize_tree(&doc, &policy);
        let el = out.elements().next().unwrap();
        assert_eq!(el.name, "a");
        assert!(el.attrs.is_empty());
    }

    #[test]
    fn nested_document_nodes_are_unwrapped() {
        let mut doc = Document::new();
        let root = doc.root_id();
        let inner = doc.append(root, Node::Document).unwrap();
        doc.append_text(inner, "inner");

        let out = sanitize_tree(&doc, &Policy::default());
        assert_eq!(out.text(), "inner");
        assert_eq!(out.root().children().count(), 1);
    }

    #[test]
    fn element_root_is_handled() {
        let mut tree = ego_tree::Tree::new(Node::Element(Element::new("b", vec![])));
        tree.root_mut().append(Node::Text(crate::node::Text {
            text: "bold".into(),
        }));
        let doc = Document::from_tree(tree);

        let out = sanitize_tree(&doc, Preset::Restricted.policy());
        assert_eq!(names(&out), ["b"]);
        assert_eq!(out.text(), "bold");
    }

    #[test]
    fn survives_adversarial_depth() {
        let policy = Preset::Basic.policy();
        let mut doc = Document::new();
        let mut parent = doc.root_id();
        for i in 0..250_000 {
            let name = if i % 2 == 0 { "b" } else { "x" };
            parent = doc.append_element(parent, name, vec![]).unwrap();
        }
        doc.append_text(parent, "deep");

        let out = sanitize_tree(&doc, policy);
        assert_eq!(out.elements().count(), 125_000);
        assert_eq!(out.text(), "deep");
    }

    #[test]
    fn is_idempotent() {
        let policy = Preset::Relaxed.policy();
        let mut doc = Document::new();
        let root = doc.root_id();
        let p = doc.append_element(root, "P", vec![Attribute::new("class", "x")]).unwrap();
        let a = doc
            .append_element(p, "a", vec![Attribute::new("href", "/x"), Attribute::new("title", "t")])
            .unwrap();
        doc.append_text(a, "link");
        let span = doc.append_element(p, "span", vec![]).unwrap();
        doc.append_text(span, "inner");
        doc.append_comment(p, "c");

        let once = sanitize_tree(&doc, policy);
        let twice = sanitize_tree(&once, policy);
        assert_eq!(once, twice);
    }
}
