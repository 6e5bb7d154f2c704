//! Resource kind abstraction
//!
//! A kind describes one family of resources (VLANs, VRFs, interfaces): how
//! keys and association members are normalized, which attributes exist, what
//! values are legal, and how operations translate into device commands. The
//! engine itself is generic over kinds.

use crate::error::{Error, Result};
use crate::types::{AttrValue, DesiredResource, ObservedResource, Operation, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How an explicitly empty association list is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmptyAssociations {
    /// `[]` leaves membership alone, same as omitting the field
    #[default]
    Unchanged,
    /// `[]` detaches every current member
    RemoveAll,
}

impl std::fmt::Display for EmptyAssociations {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::RemoveAll => write!(f, "remove-all"),
        }
    }
}

/// A family of resources managed on the external system
pub trait ResourceKind: Send + Sync {
    /// Kind name used in descriptors (e.g., "vlan")
    fn name(&self) -> &str;

    /// Descriptor field holding the resource key
    fn key_field(&self) -> &str;

    /// Descriptor field holding associated identifiers, if the kind has any
    fn association_field(&self) -> Option<&str> {
        None
    }

    /// Attributes this kind manages
    fn attribute_names(&self) -> &[&'static str];

    /// Normalize a raw key, keeping the verbatim form for display
    ///
    /// Applied to desired and observed keys alike. Fails only when the raw
    /// value cannot be interpreted at all.
    fn canonical_key(&self, raw: &str) -> Result<ResourceKey>;

    /// Normalize an association member
    fn canonical_association(&self, raw: &str) -> Result<String> {
        Ok(raw.to_string())
    }

    /// Normalize an attribute value, e.g. `suspended` to `suspend`
    fn canonical_value(&self, _attribute: &str, raw: &str) -> String {
        raw.to_string()
    }

    /// Check kind-specific rules on a desired resource
    fn validate(&self, _resource: &DesiredResource) -> Result<()> {
        Ok(())
    }

    /// Keys the external system owns and purge must never delete
    fn reserved_keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Interpretation of an explicitly empty association list
    fn empty_associations(&self) -> EmptyAssociations {
        EmptyAssociations::Unchanged
    }

    /// Translate one operation into device command lines
    fn render(&self, operation: &Operation) -> Vec<String>;

    /// Build an observed resource through the same normalization as desired input
    fn observed(
        &self,
        name: &str,
        attributes: BTreeMap<String, AttrValue>,
        associations: &[String],
    ) -> Result<ObservedResource> {
        let key = self.canonical_key(name)?;
        let mut resource = ObservedResource::new(key);
        for attr in self.attribute_names() {
            let value = match attributes.get(*attr) {
                Some(AttrValue::Set(raw)) => AttrValue::Set(self.canonical_value(attr, raw)),
                _ => AttrValue::Unset,
            };
            resource.attributes.insert((*attr).to_string(), value);
        }
        for member in associations {
            resource
                .associations
                .insert(self.canonical_association(member)?);
        }
        Ok(resource)
    }

    /// Check if a field name is meaningful for this kind
    fn accepts_field(&self, field: &str) -> bool {
        field == self.key_field()
            || self.association_field() == Some(field)
            || self.attribute_names().contains(&field)
    }
}

/// Reject a value outside a fixed set of choices
pub fn require_choice(key: &ResourceKey, field: &str, value: &str, choices: &[&str]) -> Result<()> {
    if choices.contains(&value) {
        return Ok(());
    }
    Err(Error::validation(
        key.to_string(),
        format!(
            "{field} must be one of {}, got '{value}'",
            choices.join(", ")
        ),
    ))
}
