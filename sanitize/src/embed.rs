//! Trusted embed clusters.
//!
//! Generic `object`/`embed` markup can load arbitrary plugins, so filtering
//! its attributes is not enough. A cluster is only trusted when its whole
//! shape matches the policy's [`EmbedPattern`] and its media URL starts with
//! one of the trusted prefixes. Anything else falls through to ordinary
//! element handling.

use crate::attributes::{filter_with, protocol_allowed, url_scheme};
use crate::node::{Attribute, Document, Element, Node};
use crate::policy::{EmbedPattern, Policy};
use ego_tree::{NodeId, NodeRef};

/// A subtree recognized as a trusted embed.
#[derive(Debug, Clone, Copy)]
pub struct TrustedCluster<'a> {
    root: NodeRef<'a, Node>,
    pattern: &'a EmbedPattern,
}

impl<'a> TrustedCluster<'a> {
    /// The container node.
    pub fn root(&self) -> NodeRef<'a, Node> {
        self.root
    }

    /// Copy the cluster under `parent` in `out`, names lowercased and
    /// attributes filtered against the embed pattern.
    pub fn emit(&self, out: &mut Document, parent: NodeId, policy: &Policy) {
        let Some(container) = self.root.value().as_element() else {
            return;
        };

        let Some(container_id) = out.append(parent, self.filtered(container, policy)) else {
            return;
        };

        for child in self.root.children() {
            match child.value() {
                Node::Element(el) => {
                    out.append(container_id, self.filtered(el, policy));
                }
                Node::Text(text) => {
                    out.append(container_id, Node::Text(text.clone()));
                }
                // rejected by the matcher
                Node::Comment(_) | Node::Document => (),
            }
        }
    }

    fn filtered(&self, el: &Element, policy: &Policy) -> Node {
        let name = el.name.to_ascii_lowercase();
        let allowed = self.pattern.attributes_for(&name);
        let attrs = filter_with(&name, &el.attrs, policy, |attr| {
            allowed.map_or(false, |names| names.contains(attr))
        });

        Node::Element(Element { name, attrs })
    }
}

/// Recognize a trusted embed cluster rooted at `node`.
pub fn match_cluster<'a>(node: NodeRef<'a, Node>, policy: &'a Policy) -> Option<TrustedCluster<'a>> {
    let pattern = policy.embed_pattern()?;

    if policy.trusted_prefixes().is_empty() {
        return None;
    }

    let container = node.value().as_element()?;

    if !container.name.eq_ignore_ascii_case(&pattern.container)
        || !attributes_fit(pattern, &pattern.container, &container.attrs)
    {
        return None;
    }

    let mut media_seen = false;

    for child in node.children() {
        match child.value() {
            Node::Text(text) => {
                if !text.chars().all(char::is_whitespace) {
                    log::trace!("embed rejected: text inside <{}>", pattern.container);
                    return None;
                }
            }
            Node::Element(el) => {
                if child.has_children() {
                    return None;
                }

                let name = el.name.to_ascii_lowercase();

                if name == pattern.parameter {
                    if !attributes_fit(pattern, &name, &el.attrs) || !parameter_trusted(el, policy)
                    {
                        return None;
                    }
                } else if name == pattern.media {
                    if media_seen || !attributes_fit(pattern, &name, &el.attrs) {
                        return None;
                    }
                    if !media_trusted(pattern, el, policy) {
                        log::debug!("embed rejected: untrusted media url");
                        return None;
                    }
                    media_seen = true;
                } else {
                    return None;
                }
            }
            Node::Comment(_) | Node::Document => return None,
        }
    }

    if media_seen {
        Some(TrustedCluster {
            root: node,
            pattern,
        })
    } else {
        None
    }
}

/// Every attribute name is listed for the element in the pattern.
fn attributes_fit(pattern: &EmbedPattern, element: &str, attrs: &[Attribute]) -> bool {
    match pattern.attributes_for(element) {
        Some(allowed) => attrs
            .iter()
            .all(|a| allowed.contains(a.name.to_ascii_lowercase().as_str())),
        None => false,
    }
}

fn has_trusted_prefix(value: &str, policy: &Policy) -> bool {
    policy
        .trusted_prefixes()
        .iter()
        .any(|prefix| value.starts_with(prefix.as_str()))
}

/// The media URL attribute is present, trusted, and passes any protocol rule.
fn media_trusted(pattern: &EmbedPattern, media: &Element, policy: &Policy) -> bool {
    let mut urls = media
        .attrs
        .iter()
        .filter(|a| a.name.eq_ignore_ascii_case(&pattern.media_url_attribute));

    let (Some(url), None) = (urls.next(), urls.next()) else {
        return false;
    };

    if !has_trusted_prefix(&url.value, policy) {
        return false;
    }

    match policy.protocols(&pattern.media, &pattern.media_url_attribute) {
        Some(protocols) => protocol_allowed(&url.value, protocols),
        None => true,
    }
}

/// Parameters the container loads itself.
const URL_PARAMETERS: &[&str] = &["movie", "src", "url", "filename", "code", "codebase", "data"];

/// A parameter carrying a URL (the container loads `movie`-style params
/// itself) must point at a trusted prefix too. Named URL parameters always
/// count as URLs, whatever their value looks like.
fn parameter_trusted(param: &Element, policy: &Policy) -> bool {
    let url_parameter = param
        .attr("name")
        .map(|name| {
            URL_PARAMETERS
                .iter()
                .any(|p| name.trim().eq_ignore_ascii_case(p))
        })
        .unwrap_or(false);

    param.attrs.iter().all(|a| {
        let is_url = looks_like_url(&a.value)
            || (url_parameter && a.name.eq_ignore_ascii_case("value"));

        !is_url || has_trusted_prefix(&a.value, policy)
    })
}

/// A scheme, or a protocol-relative `//host` (browsers read `\\` the same way).
fn looks_like_url(value: &str) -> bool {
    let value = value.trim_start();

    url_scheme(value).is_some()
        || ["//", "\\\\", "/\\", "\\/"]
            .iter()
            .any(|p| value.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Attribute;

    const YOUTUBE: &str = "https://www.youtube.com/v/";

    fn policy() -> Policy {
        Policy::builder()
            .with_trusted_prefixes([YOUTUBE])
            .build()
            .unwrap()
    }

    fn attrs(pairs: &[(&str, &str)]) -> Vec<Attribute> {
        pairs.iter().map(|(n, v)| Attribute::new(*n, *v)).collect()
    }

    /// `<object><param><param><embed></object>` with the given embed src.
    fn cluster(src: &str) -> (Document, NodeId) {
        let mut doc = Document::new();
        let root = doc.root_id();
        let object = doc
            .append_element(root, "OBJECT", attrs(&[("width", "425"), ("height", "344")]))
            .unwrap();
        doc.append_element(object, "param", attrs(&[("name", "movie"), ("value", src)]));
        doc.append_text(object, "\n  ");
        doc.append_element(
            object,
            "param",
            attrs(&[("name", "allowFullScreen"), ("value", "true")]),
        );
        doc.append_element(
            object,
            "Embed",
            attrs(&[
                ("src", src),
                ("type", "application/x-shockwave-flash"),
                ("allowfullscreen", "true"),
                ("width", "425"),
                ("height", "344"),
            ]),
        );
        (doc, object)
    }

    #[test]
    fn matches_trusted_cluster() {
        let policy = policy();
        let (doc, object) = cluster("https://www.youtube.com/v/abc");
        let node = doc.tree.get(object).unwrap();
        let trusted = match_cluster(node, &policy).unwrap();

        let mut out = Document::new();
        let root = out.root_id();
        trusted.emit(&mut out, root, &policy);

        let names: Vec<_> = out.elements().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["object", "param", "param", "embed"]);
        assert_eq!(out.text(), "\n  ");
    }

    #[test]
    fn rejects_untrusted_url() {
        let policy = policy();
        let (doc, object) = cluster("https://evil.example/x");
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn prefix_is_case_sensitive() {
        let policy = policy();
        let (doc, object) = cluster("https://www.YouTube.com/v/abc");
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn nothing_trusted_without_prefixes() {
        let policy = Policy::default();
        let (doc, object) = cluster("https://www.youtube.com/v/abc");
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn rejects_extra_attributes() {
        let policy = policy();
        let (mut doc, object) = cluster("https://www.youtube.com/v/abc");
        if let Some(mut node) = doc.tree.get_mut(object) {
            if let Node::Element(el) = node.value() {
                el.attrs.push(Attribute::new("data", "https://evil.example/x.swf"));
            }
        }
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn rejects_extra_children() {
        let policy = policy();

        let (mut doc, object) = cluster("https://www.youtube.com/v/abc");
        doc.append_element(object, "script", vec![]);
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());

        let (mut doc, object) = cluster("https://www.youtube.com/v/abc");
        doc.append_text(object, "fallback");
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());

        let (mut doc, object) = cluster("https://www.youtube.com/v/abc");
        doc.append_comment(object, "hidden");
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn rejects_second_media() {
        let policy = policy();
        let (mut doc, object) = cluster("https://www.youtube.com/v/abc");
        doc.append_element(
            object,
            "embed",
            attrs(&[("src", "https://www.youtube.com/v/def")]),
        );
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn rejects_url_on_wrong_attribute() {
        let policy = policy();
        let mut doc = Document::new();
        let root = doc.root_id();
        let object = doc.append_element(root, "object", vec![]).unwrap();
        doc.append_element(
            object,
            "embed",
            attrs(&[("type", "https://www.youtube.com/v/abc")]),
        );
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn rejects_untrusted_movie_param() {
        let policy = policy();
        let mut doc = Document::new();
        let root = doc.root_id();
        let object = doc.append_element(root, "object", vec![]).unwrap();
        doc.append_element(
            object,
            "param",
            attrs(&[("name", "movie"), ("value", "https://evil.example/x.swf")]),
        );
        doc.append_element(object, "embed", attrs(&[("src", "https://www.youtube.com/v/abc")]));
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }

    #[test]
    fn rejects_protocol_relative_params() {
        let policy = policy();

        for movie in ["//evil.example/x.swf", " //evil.example/x.swf", "\\\\evil.example/x.swf", "evil.swf"] {
            let mut doc = Document::new();
            let root = doc.root_id();
            let object = doc
                .append_element(root, "object", attrs(&[("width", "1"), ("height", "1")]))
                .unwrap();
            doc.append_element(object, "param", attrs(&[("name", "movie"), ("value", movie)]));
            doc.append_element(object, "embed", attrs(&[("src", "https://www.youtube.com/v/abc")]));
            assert!(
                match_cluster(doc.tree.get(object).unwrap(), &policy).is_none(),
                "{movie:?}"
            );
        }

        // non-url parameters may carry any plain value
        let mut doc = Document::new();
        let root = doc.root_id();
        let object = doc.append_element(root, "object", vec![]).unwrap();
        doc.append_element(object, "param", attrs(&[("name", "wmode"), ("value", "transparent")]));
        doc.append_element(object, "embed", attrs(&[("src", "https://www.youtube.com/v/abc")]));
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_some());
    }

    #[test]
    fn media_url_obeys_protocol_rules() {
        let policy = Policy::builder()
            .with_trusted_prefixes(["http://www.youtube.com/v/"])
            .with_protocols("embed", "src", ["https"])
            .build()
            .unwrap();
        let (doc, object) = cluster("http://www.youtube.com/v/abc");
        assert!(match_cluster(doc.tree.get(object).unwrap(), &policy).is_none());
    }
}
