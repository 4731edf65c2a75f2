//! Built-in policies.

use super::{EmbedPattern, OutputMode, Policy, Protocol, RELATIVE};
use crate::error::{ConfigurationError, Result};
use crate::node::Attribute;
use hashbrown::{HashMap, HashSet};
use std::str::FromStr;
use strum::IntoEnumIterator;

/// Elements dropped together with everything inside them unless a policy allows them.
pub const DEFAULT_REMOVE_CONTENTS: &[&str] = &[
    "applet", "embed", "iframe", "noembed", "noframes", "noscript", "object", "plaintext",
    "script", "style", "template", "xmp",
];

const RESTRICTED_ELEMENTS: &[&str] = &["b", "em", "i", "strong", "u"];

const BASIC_ELEMENTS: &[&str] = &[
    "a", "b", "blockquote", "br", "cite", "code", "dd", "dl", "dt", "em", "i", "li", "ol", "p",
    "pre", "q", "small", "strike", "strong", "sub", "sup", "u", "ul",
];

const BASIC_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("blockquote", &["cite"]),
    ("q", &["cite"]),
];

const BASIC_ADDED: &[(&str, &[(&str, &str)])] = &[("a", &[("rel", "nofollow")])];

const BASIC_PROTOCOLS: &[(&str, &str, &[&str])] = &[
    ("a", "href", &["ftp", "http", "https", "mailto", RELATIVE]),
    ("blockquote", "cite", &["http", "https", RELATIVE]),
    ("q", "cite", &["http", "https", RELATIVE]),
];

const RELAXED_ELEMENTS: &[&str] = &[
    "a", "b", "blockquote", "br", "caption", "cite", "code", "col", "colgroup", "dd", "dl", "dt",
    "em", "h1", "h2", "h3", "h4", "h5", "h6", "i", "img", "li", "ol", "p", "pre", "q", "small",
    "strike", "strong", "sub", "sup", "table", "tbody", "td", "tfoot", "th", "thead", "tr", "u",
    "ul",
];

const RELAXED_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "title"]),
    ("blockquote", &["cite"]),
    ("col", &["span", "width"]),
    ("colgroup", &["span", "width"]),
    ("img", &["align", "alt", "height", "src", "title", "width"]),
    ("ol", &["start", "type"]),
    ("q", &["cite"]),
    ("table", &["summary", "width"]),
    ("td", &["abbr", "axis", "colspan", "rowspan", "width"]),
    ("th", &["abbr", "axis", "colspan", "rowspan", "scope", "width"]),
    ("ul", &["type"]),
];

const RELAXED_PROTOCOLS: &[(&str, &str, &[&str])] = &[
    ("a", "href", &["ftp", "http", "https", "mailto", RELATIVE]),
    ("blockquote", "cite", &["http", "https", RELATIVE]),
    ("img", "src", &["http", "https", RELATIVE]),
    ("q", "cite", &["http", "https", RELATIVE]),
];

lazy_static! {
    /// Strips all markup, keeping only text. Comments are removed, the flash
    /// video embed pattern is configured but no prefix is trusted.
    pub static ref DEFAULT_POLICY: Policy = preset(&[], &[], &[], &[]);
    static ref RESTRICTED_POLICY: Policy = preset(RESTRICTED_ELEMENTS, &[], &[], &[]);
    static ref BASIC_POLICY: Policy =
        preset(BASIC_ELEMENTS, BASIC_ATTRIBUTES, BASIC_ADDED, BASIC_PROTOCOLS);
    static ref RELAXED_POLICY: Policy =
        preset(RELAXED_ELEMENTS, RELAXED_ATTRIBUTES, &[], RELAXED_PROTOCOLS);
}

/// A named built-in policy.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Preset {
    /// No elements at all.
    #[default]
    Default,
    /// Simple inline formatting: `b em i strong u`.
    Restricted,
    /// Inline formatting, links, lists and quotes. Links get `rel="nofollow"`.
    Basic,
    /// Basic plus headings, images and tables.
    Relaxed,
}

impl Preset {
    /// Look a preset up by name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Result<Self> {
        Preset::from_str(name.trim()).map_err(|_| ConfigurationError::UnknownPreset(name.to_string()))
    }

    /// Every preset, from most to least restrictive.
    pub fn all() -> impl Iterator<Item = Preset> {
        Preset::iter()
    }

    /// The shared policy for this preset.
    pub fn policy(&self) -> &'static Policy {
        match self {
            Preset::Default => &*DEFAULT_POLICY,
            Preset::Restricted => &*RESTRICTED_POLICY,
            Preset::Basic => &*BASIC_POLICY,
            Preset::Relaxed => &*RELAXED_POLICY,
        }
    }
}

/// Assemble a policy from literal tables. The tables are lowercase and
/// well-formed, so no validation pass is needed.
fn preset(
    elements: &[&str],
    attributes: &[(&str, &[&str])],
    added: &[(&str, &[(&str, &str)])],
    protocols: &[(&str, &str, &[&str])],
) -> Policy {
    let mut protocol_map: HashMap<String, HashMap<String, HashSet<Protocol>>> = HashMap::new();

    for (element, attribute, protos) in protocols {
        let protos = protos
            .iter()
            .map(|p| {
                if *p == RELATIVE {
                    Protocol::Relative
                } else {
                    Protocol::Scheme(p.to_string())
                }
            })
            .collect();

        protocol_map
            .entry(element.to_string())
            .or_default()
            .insert(attribute.to_string(), protos);
    }

    Policy {
        allowed_elements: elements.iter().map(|e| e.to_string()).collect(),
        allowed_attributes: attributes
            .iter()
            .map(|(element, names)| {
                (
                    element.to_string(),
                    names.iter().map(|n| n.to_string()).collect(),
                )
            })
            .collect(),
        global_attributes: HashSet::new(),
        added_attributes: added
            .iter()
            .map(|(element, attrs)| {
                (
                    element.to_string(),
                    attrs
                        .iter()
                        .map(|(name, value)| Attribute::new(*name, *value))
                        .collect(),
                )
            })
            .collect(),
        protocols: protocol_map,
        embed_pattern: Some(EmbedPattern::flash_video()),
        trusted_prefixes: Vec::new(),
        allow_comments: false,
        output_mode: OutputMode::Xhtml,
        remove_contents: DEFAULT_REMOVE_CONTENTS.iter().map(|e| e.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_parse_by_name() {
        assert_eq!(Preset::from_name("relaxed").unwrap(), Preset::Relaxed);
        assert_eq!(Preset::from_name("BASIC").unwrap(), Preset::Basic);
        assert!(matches!(
            Preset::from_name("wide-open"),
            Err(ConfigurationError::UnknownPreset(_))
        ));
    }

    #[test]
    fn presets_survive_validation() {
        for preset in Preset::iter() {
            let policy = preset.policy();
            let rebuilt = super::super::PolicyBuilder::from(policy).build().unwrap();
            assert_eq!(&rebuilt, policy, "{preset}");
        }
    }

    #[test]
    fn basic_links_are_nofollow() {
        let policy = Preset::Basic.policy();
        assert!(policy.allows_attribute("a", "href"));
        assert_eq!(policy.added_attributes("a"), &[Attribute::new("rel", "nofollow")]);
        assert!(policy
            .protocols("a", "href")
            .unwrap()
            .contains(&Protocol::Relative));
    }

    #[test]
    fn relaxed_extends_basic() {
        let basic = Preset::Basic.policy();
        let relaxed = Preset::Relaxed.policy();
        for element in basic.allowed_elements() {
            assert!(relaxed.allows_element(element), "{element}");
        }
        assert!(relaxed.allows_element("img"));
        assert!(relaxed.added_attributes("a").is_empty());
    }
}
