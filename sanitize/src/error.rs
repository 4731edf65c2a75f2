//! Policy construction errors.
//!
//! Sanitizing itself never fails: malformed markup is neutralized, not
//! rejected. The only fallible step is turning a declarative policy into a
//! [`Policy`](crate::Policy).

use thiserror::Error;

/// Result alias defaulting to [`ConfigurationError`].
pub type Result<T, E = ConfigurationError> = std::result::Result<T, E>;

/// A structurally invalid policy.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// The output mode is neither `html` nor `xhtml`.
    #[error("unknown output mode {0:?}, expected \"html\" or \"xhtml\"")]
    UnknownOutputMode(String),
    /// The preset name does not exist.
    #[error("unknown preset {0:?}")]
    UnknownPreset(String),
    /// An element or attribute name that can never appear in markup.
    #[error("invalid {kind} name {name:?}")]
    InvalidName {
        /// What the name was meant to be, e.g. `element` or `attribute`.
        kind: &'static str,
        /// The offending name.
        name: String,
    },
    /// Two keys of one map that are the same name once lowercased.
    #[error("{kind} {name:?} is configured more than once (names are case-insensitive)")]
    DuplicateKey {
        /// What the key names, e.g. `element` or `attribute`.
        kind: &'static str,
        /// The lowercased key.
        name: String,
    },
    /// A protocol entry that is not a URL scheme or the `relative` sentinel.
    #[error("invalid protocol {protocol:?} for {element}@{attribute}")]
    InvalidProtocol {
        /// Element the rule applies to.
        element: String,
        /// Attribute the rule applies to.
        attribute: String,
        /// The offending protocol.
        protocol: String,
    },
    /// The trusted embed pattern is inconsistent.
    #[error("invalid embed pattern: {0}")]
    InvalidEmbedPattern(String),
    /// A trusted prefix that is not a fully qualified `scheme://host/` prefix.
    #[error("invalid trusted prefix {0:?}, expected scheme://host/...")]
    InvalidTrustedPrefix(String),
    /// The declarative policy could not be decoded.
    #[cfg(feature = "serde")]
    #[error("{0}")]
    Parse(#[from] serde_json::Error),
}
