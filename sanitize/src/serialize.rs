//! Render a tree back to markup.

use crate::node::{Document, Element, Node};
use crate::policy::OutputMode;
use ego_tree::iter::Edge;
use phf::phf_set;

/// Elements that never take an end tag.
static VOID_ELEMENTS: phf::Set<&'static str> = phf_set! {
    "area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param",
    "source", "track", "wbr", "basefont", "bgsound", "frame",
};

/// Is the lowercase element name a void element?
pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(name)
}

/// Serialize the tree. A root element is rendered too; a root document only
/// contributes its children.
pub fn render(document: &Document, mode: OutputMode) -> String {
    let mut out = String::new();

    for edge in document.root().traverse() {
        match edge {
            Edge::Open(node) => match node.value() {
                Node::Document => (),
                Node::Text(text) => escape_text(&mut out, text),
                Node::Comment(comment) => write_comment(&mut out, comment),
                Node::Element(el) => {
                    write_start_tag(&mut out, el);

                    if !node.has_children() && is_void(&el.name) {
                        match mode {
                            OutputMode::Xhtml => out.push_str(" />"),
                            OutputMode::Html => out.push('>'),
                        }
                    } else {
                        out.push('>');
                    }
                }
            },
            Edge::Close(node) => {
                if let Node::Element(el) = node.value() {
                    if node.has_children() || !is_void(&el.name) {
                        out.push_str("</");
                        out.push_str(&el.name);
                        out.push('>');
                    }
                }
            }
        }
    }

    out
}

fn write_start_tag(out: &mut String, el: &Element) {
    out.push('<');
    out.push_str(&el.name);

    for attr in el.attrs.iter() {
        out.push(' ');
        out.push_str(&attr.name);
        out.push_str("=\"");
        escape_text(out, &attr.value);
        out.push('"');
    }
}

/// Escape `& < > "`.
fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Write a comment whose body cannot close it early.
fn write_comment(out: &mut String, comment: &str) {
    let mut body = comment
        .replace("--!>", "--!&gt;")
        .replace("-->", "--&gt;");

    if body.starts_with('>') {
        body.replace_range(..1, "&gt;");
    } else if body.starts_with("->") {
        body.replace_range(..2, "-&gt;");
    }

    out.push_str("<!--");
    out.push_str(&body);
    out.push_str("-->");
}
