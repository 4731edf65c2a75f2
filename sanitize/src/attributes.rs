//! Attribute filtering and URL protocol checks.

use crate::node::Attribute;
use crate::policy::{Policy, Protocol};
use hashbrown::HashSet;
use regex::Regex;

lazy_static! {
    /// Everything before the first colon, as long as no `/` or `#` comes
    /// first. Values arrive entity-decoded, so a literal `&#58;` or `&#x3a;`
    /// here only comes from double-encoded source (`&amp;#58;`). It is still
    /// counted as a colon, which is stricter than a browser reads it.
    static ref PROTOCOL_PATTERN: Regex =
        Regex::new(r"(?i)^([^/#]*?)(?::|&#0*58|&#x0*3a)").expect("valid regex pattern");
}

/// The lowercase URL scheme of `value`, or `None` for a relative URL.
pub fn url_scheme(value: &str) -> Option<String> {
    PROTOCOL_PATTERN
        .captures(value)
        .and_then(|caps| caps.get(1))
        .map(|scheme| scheme.as_str().to_ascii_lowercase())
}

/// Does `value` satisfy the allowed protocol set?
pub fn protocol_allowed(value: &str, allowed: &HashSet<Protocol>) -> bool {
    match url_scheme(value) {
        Some(scheme) => allowed.contains(&Protocol::Scheme(scheme)),
        None => allowed.contains(&Protocol::Relative),
    }
}

/// Filter the attributes of a lowercase `element` against the policy.
///
/// Survivors keep their source order and come out with lowercase names; the
/// policy's added attributes follow in declared order, replacing any
/// survivor of the same name.
pub fn filter_attributes(element: &str, attrs: &[Attribute], policy: &Policy) -> Vec<Attribute> {
    let mut kept = filter_with(element, attrs, policy, |name| {
        policy.allows_attribute(element, name)
    });

    let added = policy.added_attributes(element);

    if !added.is_empty() {
        kept.retain(|attr| !added.iter().any(|a| a.name == attr.name));
        kept.extend(added.iter().cloned());
    }

    kept
}

/// Keep the attributes accepted by `allowed` whose URL, if the policy checks
/// one for the pair, has an allowed protocol. Later duplicates of a name are
/// dropped, as an HTML parser would.
pub(crate) fn filter_with<F>(
    element: &str,
    attrs: &[Attribute],
    policy: &Policy,
    allowed: F,
) -> Vec<Attribute>
where
    F: Fn(&str) -> bool,
{
    let mut kept: Vec<Attribute> = Vec::with_capacity(attrs.len());

    for attr in attrs {
        let name = attr.name.to_ascii_lowercase();

        if !allowed(&name) {
            log::trace!("dropping attribute {}@{}", element, name);
            continue;
        }

        if kept.iter().any(|a| a.name == name) {
            continue;
        }

        if let Some(protocols) = policy.protocols(element, &name) {
            if !protocol_allowed(&attr.value, protocols) {
                log::trace!("dropping {}@{}: protocol not allowed", element, name);
                continue;
            }
        }

        kept.push(Attribute {
            name,
            value: attr.value.clone(),
        });
    }

    kept
}
