//! The sanitization policy: what survives, what gets added, what is trusted.
//!
//! A [`Policy`] is built once through a [`PolicyBuilder`], validated and
//! normalized to lowercase keys, and is read-only from then on. It is
//! `Send + Sync`, so one instance can serve any number of concurrent
//! sanitize calls.

#[cfg(feature = "serde")]
mod overrides;
mod presets;

#[cfg(feature = "serde")]
pub use overrides::PolicyOverrides;
pub use presets::{Preset, DEFAULT_POLICY, DEFAULT_REMOVE_CONTENTS};

use crate::error::{ConfigurationError, Result};
use crate::node::Attribute;
use hashbrown::{HashMap, HashSet};
use std::str::FromStr;

/// The protocol sentinel allowing scheme-less (relative) URLs.
pub const RELATIVE: &str = "relative";

/// How sanitized markup is serialized.
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
    strum::AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum OutputMode {
    /// HTML5: void elements are written as `<br>`.
    Html,
    /// XHTML: void elements are written as `<br />`.
    #[default]
    Xhtml,
}

/// An allowed URL protocol for an attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// A lowercase URL scheme such as `https` or `mailto`.
    Scheme(String),
    /// URLs with no scheme at all.
    Relative,
}

impl Protocol {
    /// Parse a configured protocol, `relative` being the sentinel.
    pub fn parse(element: &str, attribute: &str, protocol: &str) -> Result<Self> {
        let lower = protocol.to_ascii_lowercase();

        if lower == RELATIVE {
            return Ok(Protocol::Relative);
        }

        if is_scheme(&lower) {
            Ok(Protocol::Scheme(lower))
        } else {
            Err(ConfigurationError::InvalidProtocol {
                element: element.to_string(),
                attribute: attribute.to_string(),
                protocol: protocol.to_string(),
            })
        }
    }

    /// The configured spelling of the protocol.
    pub fn as_str(&self) -> &str {
        match self {
            Protocol::Scheme(s) => s,
            Protocol::Relative => RELATIVE,
        }
    }
}

/// The exact shape of a trusted embed cluster: a container element holding
/// parameter elements and a single media element whose URL attribute is
/// checked against the trusted prefixes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(deny_unknown_fields)
)]
pub struct EmbedPattern {
    /// The outer element, e.g. `object`.
    pub container: String,
    /// The parameter element, e.g. `param`.
    pub parameter: String,
    /// The media element, e.g. `embed`.
    pub media: String,
    /// The attribute on the media element carrying the URL, e.g. `src`.
    pub media_url_attribute: String,
    /// Allowed attributes for each of the three elements.
    pub attributes: HashMap<String, HashSet<String>>,
}

impl EmbedPattern {
    /// A pattern with the given element roles and no attributes yet.
    pub fn new(container: &str, parameter: &str, media: &str, media_url_attribute: &str) -> Self {
        EmbedPattern {
            container: container.to_string(),
            parameter: parameter.to_string(),
            media: media.to_string(),
            media_url_attribute: media_url_attribute.to_string(),
            attributes: HashMap::new(),
        }
    }

    /// Set the allowed attributes for one element of the pattern.
    pub fn with_attributes<'a>(
        mut self,
        element: &str,
        attributes: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        self.attributes.insert(
            element.to_ascii_lowercase(),
            attributes.into_iter().map(str::to_string).collect(),
        );
        self
    }

    /// The standard flash video embed: `object`, `param` and `embed`.
    pub fn flash_video() -> Self {
        EmbedPattern::new("object", "param", "embed", "src")
            .with_attributes("object", ["width", "height"])
            .with_attributes("param", ["name", "value"])
            .with_attributes(
                "embed",
                [
                    "src",
                    "type",
                    "allowscriptaccess",
                    "allowfullscreen",
                    "width",
                    "height",
                ],
            )
    }

    /// Allowed attributes for a lowercase element name in the pattern.
    pub fn attributes_for(&self, element: &str) -> Option<&HashSet<String>> {
        self.attributes.get(element)
    }

    /// True if the lowercase name plays any role in the pattern.
    pub fn contains(&self, element: &str) -> bool {
        self.container == element || self.parameter == element || self.media == element
    }

    fn normalize(&self) -> Result<Self> {
        let container = valid_name("element", &self.container)?;
        let parameter = valid_name("element", &self.parameter)?;
        let media = valid_name("element", &self.media)?;
        let media_url_attribute = valid_name("attribute", &self.media_url_attribute)?;

        if container == parameter || container == media || parameter == media {
            return Err(ConfigurationError::InvalidEmbedPattern(format!(
                "container, parameter and media must differ (got {}, {}, {})",
                container, parameter, media
            )));
        }

        let mut attributes = HashMap::with_capacity(self.attributes.len());

        for (element, names) in self.attributes.iter() {
            let element = valid_name("element", element)?;

            if element != container && element != parameter && element != media {
                return Err(ConfigurationError::InvalidEmbedPattern(format!(
                    "attributes given for {} which has no role in the pattern",
                    element
                )));
            }

            let names = names
                .iter()
                .map(|n| valid_name("attribute", n))
                .collect::<Result<HashSet<_>>>()?;

            insert_unique(&mut attributes, "element", element, names)?;
        }

        for role in [&container, &parameter, &media] {
            if !attributes.contains_key(role) {
                return Err(ConfigurationError::InvalidEmbedPattern(format!(
                    "no attributes listed for {}",
                    role
                )));
            }
        }

        let url_listed = attributes
            .get(&media)
            .map_or(false, |names| names.contains(&media_url_attribute));

        if !url_listed {
            return Err(ConfigurationError::InvalidEmbedPattern(format!(
                "{} is not an allowed attribute of {}",
                media_url_attribute, media
            )));
        }

        Ok(EmbedPattern {
            container,
            parameter,
            media,
            media_url_attribute,
            attributes,
        })
    }
}

/// A validated, immutable sanitization policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    pub(crate) allowed_elements: HashSet<String>,
    pub(crate) allowed_attributes: HashMap<String, HashSet<String>>,
    pub(crate) global_attributes: HashSet<String>,
    pub(crate) added_attributes: HashMap<String, Vec<Attribute>>,
    pub(crate) protocols: HashMap<String, HashMap<String, HashSet<Protocol>>>,
    pub(crate) embed_pattern: Option<EmbedPattern>,
    pub(crate) trusted_prefixes: Vec<String>,
    pub(crate) allow_comments: bool,
    pub(crate) output_mode: OutputMode,
    pub(crate) remove_contents: HashSet<String>,
}

impl Default for Policy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl Policy {
    /// A builder starting from the default policy.
    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::from(&*DEFAULT_POLICY)
    }

    /// Is the lowercase element name allowed?
    pub fn allows_element(&self, element: &str) -> bool {
        self.allowed_elements.contains(element)
    }

    /// Is the lowercase element name one whose contents are dropped with it?
    pub fn removes_contents(&self, element: &str) -> bool {
        self.remove_contents.contains(element)
    }

    /// Is the lowercase attribute allowed on the lowercase element?
    pub fn allows_attribute(&self, element: &str, attribute: &str) -> bool {
        self.global_attributes.contains(attribute)
            || self
                .allowed_attributes
                .get(element)
                .map_or(false, |names| names.contains(attribute))
    }

    /// Allowed element names.
    pub fn allowed_elements(&self) -> &HashSet<String> {
        &self.allowed_elements
    }

    /// Per element allowed attribute names.
    pub fn allowed_attributes(&self) -> &HashMap<String, HashSet<String>> {
        &self.allowed_attributes
    }

    /// Attribute names allowed on every allowed element.
    pub fn global_attributes(&self) -> &HashSet<String> {
        &self.global_attributes
    }

    /// Attributes force-inserted on a lowercase element, in declared order.
    pub fn added_attributes(&self, element: &str) -> &[Attribute] {
        self.added_attributes
            .get(element)
            .map_or(&[], |attrs| attrs.as_slice())
    }

    /// Allowed protocols for a lowercase element/attribute pair, if the pair is URL checked.
    pub fn protocols(&self, element: &str, attribute: &str) -> Option<&HashSet<Protocol>> {
        self.protocols
            .get(element)
            .and_then(|attrs| attrs.get(attribute))
    }

    /// The trusted embed pattern.
    pub fn embed_pattern(&self) -> Option<&EmbedPattern> {
        self.embed_pattern.as_ref()
    }

    /// Literal URL prefixes trusted inside an embed cluster.
    pub fn trusted_prefixes(&self) -> &[String] {
        &self.trusted_prefixes
    }

    /// Are comments kept?
    pub fn allow_comments(&self) -> bool {
        self.allow_comments
    }

    /// How the result is serialized.
    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    /// Elements removed together with their contents when not allowed.
    pub fn remove_contents(&self) -> &HashSet<String> {
        &self.remove_contents
    }
}

/// Collects policy settings and validates them into a [`Policy`].
///
/// Setters replace the whole field, except the per-element maps
/// (`with_attributes`, `with_added_attributes`, `with_protocols`) which only
/// replace the entry they name.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    allowed_elements: Vec<String>,
    allowed_attributes: HashMap<String, Vec<String>>,
    global_attributes: Vec<String>,
    added_attributes: HashMap<String, Vec<Attribute>>,
    protocols: HashMap<String, HashMap<String, Vec<String>>>,
    embed_pattern: Option<EmbedPattern>,
    trusted_prefixes: Vec<String>,
    allow_comments: bool,
    output_mode: String,
    remove_contents: Vec<String>,
}

impl From<&Policy> for PolicyBuilder {
    fn from(policy: &Policy) -> Self {
        PolicyBuilder {
            allowed_elements: policy.allowed_elements.iter().cloned().collect(),
            allowed_attributes: policy
                .allowed_attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.iter().cloned().collect()))
                .collect(),
            global_attributes: policy.global_attributes.iter().cloned().collect(),
            added_attributes: policy.added_attributes.clone(),
            protocols: policy
                .protocols
                .iter()
                .map(|(element, attrs)| {
                    let attrs = attrs
                        .iter()
                        .map(|(attr, protos)| {
                            (
                                attr.clone(),
                                protos.iter().map(|p| p.as_str().to_string()).collect(),
                            )
                        })
                        .collect();
                    (element.clone(), attrs)
                })
                .collect(),
            embed_pattern: policy.embed_pattern.clone(),
            trusted_prefixes: policy.trusted_prefixes.clone(),
            allow_comments: policy.allow_comments,
            output_mode: policy.output_mode.to_string(),
            remove_contents: policy.remove_contents.iter().cloned().collect(),
        }
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Policy::builder()
    }
}

impl PolicyBuilder {
    /// A builder starting from the default policy.
    pub fn new() -> Self {
        Policy::builder()
    }

    /// Replace the allowed elements.
    pub fn with_elements<I, S>(&mut self, elements: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_elements = elements.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the allowed attributes of one element, leaving other elements alone.
    pub fn with_attributes<I, S>(&mut self, element: &str, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_attributes.insert(
            element.to_ascii_lowercase(),
            attributes.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Replace the attributes allowed on every allowed element.
    pub fn with_global_attributes<I, S>(&mut self, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the forced attributes of one element. Order is kept.
    pub fn with_added_attributes<I, K, V>(&mut self, element: &str, attributes: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.added_attributes.insert(
            element.to_ascii_lowercase(),
            attributes
                .into_iter()
                .map(|(name, value)| Attribute::new(name, value))
                .collect(),
        );
        self
    }

    /// Replace the allowed protocols of one element attribute. Use
    /// [`RELATIVE`] to allow scheme-less URLs.
    pub fn with_protocols<I, S>(&mut self, element: &str, attribute: &str, protocols: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protocols
            .entry(element.to_ascii_lowercase())
            .or_default()
            .insert(
                attribute.to_ascii_lowercase(),
                protocols.into_iter().map(Into::into).collect(),
            );
        self
    }

    /// Replace the trusted embed pattern. `None` disables trusted embeds.
    pub fn with_embed_pattern(&mut self, embed_pattern: Option<EmbedPattern>) -> &mut Self {
        self.embed_pattern = embed_pattern;
        self
    }

    /// Replace the trusted embed URL prefixes.
    pub fn with_trusted_prefixes<I, S>(&mut self, prefixes: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_prefixes = prefixes.into_iter().map(Into::into).collect();
        self
    }

    /// Keep or drop comments.
    pub fn with_allow_comments(&mut self, allow_comments: bool) -> &mut Self {
        self.allow_comments = allow_comments;
        self
    }

    /// Set the output mode.
    pub fn with_output_mode(&mut self, output_mode: OutputMode) -> &mut Self {
        self.output_mode = output_mode.to_string();
        self
    }

    /// Set the output mode by name, checked by [`build`](Self::build).
    pub fn with_output(&mut self, output: &str) -> &mut Self {
        self.output_mode = output.to_string();
        self
    }

    /// Replace the elements removed together with their contents.
    pub fn with_remove_contents<I, S>(&mut self, elements: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.remove_contents = elements.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and normalize into an immutable policy.
    pub fn build(&self) -> Result<Policy> {
        let output_mode = OutputMode::from_str(self.output_mode.trim())
            .map_err(|_| ConfigurationError::UnknownOutputMode(self.output_mode.clone()))?;

        let allowed_elements = valid_names("element", &self.allowed_elements)?;
        let global_attributes = valid_names("attribute", &self.global_attributes)?;
        let remove_contents = valid_names("element", &self.remove_contents)?;

        let mut allowed_attributes = HashMap::with_capacity(self.allowed_attributes.len());

        for (element, names) in self.allowed_attributes.iter() {
            insert_unique(
                &mut allowed_attributes,
                "element",
                valid_name("element", element)?,
                valid_names("attribute", names)?,
            )?;
        }

        let mut added_attributes = HashMap::with_capacity(self.added_attributes.len());

        for (element, attrs) in self.added_attributes.iter() {
            let mut normalized: Vec<Attribute> = Vec::with_capacity(attrs.len());

            for attr in attrs {
                let name = valid_name("attribute", &attr.name)?;
                // last declaration of a name wins, at its first position
                match normalized.iter_mut().find(|a| a.name == name) {
                    Some(existing) => existing.value = attr.value.clone(),
                    None => normalized.push(Attribute::new(name, attr.value.clone())),
                }
            }

            insert_unique(
                &mut added_attributes,
                "element",
                valid_name("element", element)?,
                normalized,
            )?;
        }

        let mut protocols: HashMap<String, HashMap<String, HashSet<Protocol>>> =
            HashMap::with_capacity(self.protocols.len());

        for (element, attrs) in self.protocols.iter() {
            let element = valid_name("element", element)?;
            let mut entry = HashMap::with_capacity(attrs.len());

            for (attribute, protos) in attrs.iter() {
                let attribute = valid_name("attribute", attribute)?;
                let protos = protos
                    .iter()
                    .map(|p| Protocol::parse(&element, &attribute, p))
                    .collect::<Result<HashSet<_>>>()?;

                insert_unique(&mut entry, "attribute", attribute, protos)?;
            }

            insert_unique(&mut protocols, "element", element, entry)?;
        }

        let embed_pattern = match self.embed_pattern {
            Some(ref pattern) => Some(pattern.normalize()?),
            None => None,
        };

        let mut trusted_prefixes = Vec::with_capacity(self.trusted_prefixes.len());

        for prefix in self.trusted_prefixes.iter() {
            if !is_qualified_prefix(prefix) {
                return Err(ConfigurationError::InvalidTrustedPrefix(prefix.clone()));
            }
            if !trusted_prefixes.contains(prefix) {
                trusted_prefixes.push(prefix.clone());
            }
        }

        if let Some(ref pattern) = embed_pattern {
            for element in allowed_elements.iter() {
                if pattern.contains(element) {
                    log::warn!(
                        "<{}> is allowed outside of trusted embeds; any such element will be kept",
                        element
                    );
                }
            }
        }

        log::debug!(
            "policy built: {} elements, {} attribute rules, {} protocol rules, {} trusted prefixes, output {}",
            allowed_elements.len(),
            allowed_attributes.len(),
            protocols.len(),
            trusted_prefixes.len(),
            output_mode
        );

        Ok(Policy {
            allowed_elements,
            allowed_attributes,
            global_attributes,
            added_attributes,
            protocols,
            embed_pattern,
            trusted_prefixes,
            allow_comments: self.allow_comments,
            output_mode,
            remove_contents,
        })
    }
}

/// Lowercase a name, rejecting anything that cannot be an element or attribute name.
fn valid_name(kind: &'static str, name: &str) -> Result<String> {
    let invalid = name.is_empty()
        || name.chars().any(|c| {
            c.is_whitespace()
                || c.is_control()
                || matches!(c, '<' | '>' | '"' | '\'' | '/' | '=' | '`')
        });

    if invalid {
        Err(ConfigurationError::InvalidName {
            kind,
            name: name.to_string(),
        })
    } else {
        Ok(name.to_ascii_lowercase())
    }
}

/// Insert a normalized key, rejecting a second key that lowercased to the same name.
fn insert_unique<V>(
    map: &mut HashMap<String, V>,
    kind: &'static str,
    key: String,
    value: V,
) -> Result<()> {
    if map.contains_key(&key) {
        return Err(ConfigurationError::DuplicateKey { kind, name: key });
    }

    map.insert(key, value);
    Ok(())
}

fn valid_names(kind: &'static str, names: &[String]) -> Result<HashSet<String>> {
    names.iter().map(|n| valid_name(kind, n)).collect()
}

/// RFC 3986 scheme: a letter followed by letters, digits, `+`, `-` or `.`.
fn is_scheme(s: &str) -> bool {
    let mut chars = s.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}

/// `scheme://authority/...`, so a prefix cannot be extended into another host.
fn is_qualified_prefix(prefix: &str) -> bool {
    match prefix.split_once("://") {
        Some((scheme, rest)) => {
            is_scheme(scheme) && rest.find('/').map_or(false, |slash| slash > 0)
        }
        None => false,
    }
}
