//! Declarative policy overrides, decoded from JSON.
//!
//! ```json
//! {
//!   "elements": ["a", "b"],
//!   "attributes": { "a": ["href"] },
//!   "add_attributes": { "a": [["rel", "nofollow"]] },
//!   "protocols": { "a": { "href": ["https", "relative"] } },
//!   "object_urls": ["https://www.youtube.com/v/"],
//!   "output": "html"
//! }
//! ```
//!
//! Every field is optional. Present fields replace the base policy's value,
//! except `attributes`, `add_attributes` and `protocols` which replace only
//! the elements they name. Unknown keys are rejected.

use super::{EmbedPattern, Policy, PolicyBuilder};
use crate::error::{ConfigurationError, Result};
use hashbrown::{HashMap, HashSet};

/// Field level overrides applied on top of a base policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverrides {
    /// Allowed elements.
    pub elements: Option<Vec<String>>,
    /// Allowed attributes per element.
    pub attributes: Option<HashMap<String, Vec<String>>>,
    /// Attributes allowed on every element.
    pub global_attributes: Option<Vec<String>>,
    /// Forced `[name, value]` pairs per element, in order.
    #[serde(alias = "added_attributes")]
    pub add_attributes: Option<HashMap<String, Vec<(String, String)>>>,
    /// Allowed protocols per element and attribute.
    pub protocols: Option<HashMap<String, HashMap<String, Vec<String>>>>,
    /// The trusted embed pattern.
    #[serde(alias = "object_config")]
    pub embed_pattern: Option<EmbedPattern>,
    /// Disable trusted embeds entirely.
    pub disable_embeds: Option<bool>,
    /// Trusted embed URL prefixes.
    #[serde(alias = "object_urls")]
    pub trusted_prefixes: Option<Vec<String>>,
    /// Keep comments.
    pub allow_comments: Option<bool>,
    /// `html` or `xhtml`.
    #[serde(alias = "output_mode")]
    pub output: Option<String>,
    /// Elements removed together with their contents.
    pub remove_contents: Option<Vec<String>>,
}

impl PolicyOverrides {
    /// Decode overrides from JSON, rejecting unknown keys.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Merge the overrides into a builder.
    ///
    /// Fails without touching the builder when two keys of one map name the
    /// same element or attribute in different case.
    pub fn merge_into(&self, builder: &mut PolicyBuilder) -> Result<()> {
        self.check_keys()?;

        if let Some(ref elements) = self.elements {
            builder.with_elements(elements.iter().cloned());
        }

        if let Some(ref attributes) = self.attributes {
            for (element, names) in attributes.iter() {
                builder.with_attributes(element, names.iter().cloned());
            }
        }

        if let Some(ref global) = self.global_attributes {
            builder.with_global_attributes(global.iter().cloned());
        }

        if let Some(ref added) = self.add_attributes {
            for (element, attrs) in added.iter() {
                builder.with_added_attributes(element, attrs.iter().cloned());
            }
        }

        if let Some(ref protocols) = self.protocols {
            for (element, attrs) in protocols.iter() {
                for (attribute, protos) in attrs.iter() {
                    builder.with_protocols(element, attribute, protos.iter().cloned());
                }
            }
        }

        if let Some(ref pattern) = self.embed_pattern {
            builder.with_embed_pattern(Some(pattern.clone()));
        }

        if self.disable_embeds == Some(true) {
            builder.with_embed_pattern(None);
        }

        if let Some(ref prefixes) = self.trusted_prefixes {
            builder.with_trusted_prefixes(prefixes.iter().cloned());
        }

        if let Some(allow_comments) = self.allow_comments {
            builder.with_allow_comments(allow_comments);
        }

        if let Some(ref output) = self.output {
            builder.with_output(output);
        }

        if let Some(ref remove_contents) = self.remove_contents {
            builder.with_remove_contents(remove_contents.iter().cloned());
        }

        Ok(())
    }

    fn check_keys(&self) -> Result<()> {
        if let Some(ref attributes) = self.attributes {
            unique_keys("element", attributes.keys())?;
        }

        if let Some(ref added) = self.add_attributes {
            unique_keys("element", added.keys())?;
        }

        if let Some(ref protocols) = self.protocols {
            unique_keys("element", protocols.keys())?;

            for attrs in protocols.values() {
                unique_keys("attribute", attrs.keys())?;
            }
        }

        Ok(())
    }

    /// Apply the overrides to `base` and validate the result.
    pub fn apply(&self, base: &Policy) -> Result<Policy> {
        let mut builder = PolicyBuilder::from(base);
        self.merge_into(&mut builder)?;
        builder.build()
    }
}

/// Keys are compared as the builder stores them, lowercased.
fn unique_keys<'a>(kind: &'static str, keys: impl Iterator<Item = &'a String>) -> Result<()> {
    let mut seen = HashSet::new();

    for key in keys {
        let name = key.to_ascii_lowercase();

        if !seen.insert(name.clone()) {
            return Err(ConfigurationError::DuplicateKey { kind, name });
        }
    }

    Ok(())
}

impl Policy {
    /// Build a policy from `base` plus JSON overrides.
    pub fn from_json(base: &Policy, json: &str) -> Result<Policy> {
        PolicyOverrides::from_json(json)?.apply(base)
    }
}
