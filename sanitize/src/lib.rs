#![warn(missing_docs)]

//! Allow-list HTML sanitizer.
//!
//! Markup is parsed into a tree, rebuilt keeping only what a [`Policy`]
//! permits, and serialized again. Everything not explicitly allowed is
//! removed: unknown elements are unwrapped so their text survives, dangerous
//! elements such as `script` disappear with their contents, attributes are
//! filtered per element and URL attributes are checked against allowed
//! protocols.
//!
//! # Basic usage
//!
//! ```
//! use sanitize::{sanitize_text, Preset};
//!
//! let html = r#"<p onclick="evil()">Hi <a href="javascript:x">there</a><script>x</script></p>"#;
//! let clean = sanitize_text(html, Preset::Basic.policy());
//!
//! assert_eq!(clean, r#"<p>Hi <a rel="nofollow">there</a></p>"#);
//! ```
//!
//! Policies are built with [`Policy::builder`], starting from the default
//! policy which keeps text only:
//!
//! ```
//! use sanitize::{Policy, Sanitizer, RELATIVE};
//!
//! let policy = Policy::builder()
//!     .with_elements(["a", "b"])
//!     .with_attributes("a", ["href"])
//!     .with_protocols("a", "href", ["https", RELATIVE])
//!     .build()
//!     .unwrap();
//!
//! let sanitizer = Sanitizer::new(policy);
//! assert_eq!(sanitizer.clean("<b>bold</b><x>unwrapped</x>"), "<b>bold</b>unwrapped");
//! ```
//!
//! Trees built by another parser can be sanitized directly with
//! [`sanitize_tree`]. The walk never recurses, so arbitrarily deep input only
//! costs memory.

#[macro_use]
extern crate lazy_static;
extern crate log;

pub mod attributes;
pub mod embed;
pub mod error;
pub mod node;
pub mod parse;
pub mod policy;
pub mod serialize;
pub mod walker;

pub use error::{ConfigurationError, Result};
pub use node::{Attribute, Document, Element, Node};
pub use parse::parse_fragment;
pub use policy::{EmbedPattern, OutputMode, Policy, PolicyBuilder, Preset, Protocol, RELATIVE};
pub use serialize::render;
pub use walker::sanitize_tree;

#[cfg(feature = "serde")]
pub use policy::PolicyOverrides;

/// Parse `markup`, sanitize it with `policy` and serialize it in the policy's
/// output mode.
pub fn sanitize_text(markup: &str, policy: &Policy) -> String {
    let document = parse_fragment(markup);
    let clean = sanitize_tree(&document, policy);
    render(&clean, policy.output_mode())
}

/// Sanitize with the default policy, keeping text only.
pub fn clean(markup: &str) -> String {
    sanitize_text(markup, &policy::DEFAULT_POLICY)
}

/// A policy bound to the sanitize entry points.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    policy: Policy,
}

impl Sanitizer {
    /// Create a sanitizer for `policy`.
    pub fn new(policy: Policy) -> Self {
        Sanitizer { policy }
    }

    /// The policy in use.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Sanitize markup.
    pub fn clean(&self, markup: &str) -> String {
        sanitize_text(markup, &self.policy)
    }

    /// Sanitize a tree.
    pub fn clean_tree(&self, document: &Document) -> Document {
        sanitize_tree(document, &self.policy)
    }

    /// Sanitize markup, returning `None` when the result is identical to the
    /// input.
    pub fn clean_if_changed(&self, markup: &str) -> Option<String> {
        let clean = self.clean(markup);

        if clean == markup {
            None
        } else {
            Some(clean)
        }
    }
}

impl From<Policy> for Sanitizer {
    fn from(policy: Policy) -> Self {
        Sanitizer::new(policy)
    }
}

impl From<Preset> for Sanitizer {
    fn from(preset: Preset) -> Self {
        Sanitizer::new(preset.policy().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_keeps_text_only() {
        assert_eq!(clean("<x>Hello</x>"), "Hello");
        assert_eq!(clean("<script>alert(1)</script>"), "");
        assert_eq!(clean("<b>a</b> &amp; <i>b</i>"), "a &amp; b");
    }

    #[test]
    fn clean_if_changed() {
        let sanitizer = Sanitizer::from(Preset::Restricted);
        assert_eq!(sanitizer.clean_if_changed("<b>ok</b>"), None);
        assert_eq!(
            sanitizer.clean_if_changed("<b onclick=x>ok</b>").as_deref(),
            Some("<b>ok</b>")
        );
    }

    #[test]
    fn policy_is_shareable_across_threads() {
        fn assert_sync<T: Send + Sync>() {}
        assert_sync::<Policy>();
        assert_sync::<Sanitizer>();

        let sanitizer = std::sync::Arc::new(Sanitizer::from(Preset::Basic));
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let sanitizer = sanitizer.clone();
                std::thread::spawn(move || sanitizer.clean(&format!("<em>{i}</em><script>x</script>")))
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), format!("<em>{i}</em>"));
        }
    }
}
