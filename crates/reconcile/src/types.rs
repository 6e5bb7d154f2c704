//! Core types for convergence reconciliation

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

// ============================================================================
// Keys and values
// ============================================================================

/// Identifier selecting one resource within a desired or observed collection
///
/// Equality, ordering and hashing use the canonical form only, so `Blue` and
/// `blue` are the same VRF when the resource kind folds case. The verbatim
/// name is what gets sent to the external system on create.
#[derive(Debug, Clone)]
pub struct ResourceKey {
    name: String,
    canonical: String,
}

impl ResourceKey {
    /// Create a key with an explicit canonical form
    pub fn new(name: impl Into<String>, canonical: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            canonical: canonical.into(),
        }
    }

    /// Create a key whose canonical form is the name itself
    pub fn verbatim(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            canonical: name.clone(),
            name,
        }
    }

    /// Name as declared or observed
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized form used for matching
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Whether a user-supplied selector picks this key
    pub fn matches(&self, selector: &str) -> bool {
        self.canonical == selector || self.name == selector
    }
}

impl PartialEq for ResourceKey {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for ResourceKey {}

impl Hash for ResourceKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state);
    }
}

impl PartialOrd for ResourceKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name)
    }
}

/// Value of an attribute as reported by the external system
///
/// `Unset` means the device does not carry the attribute at all, which is
/// not the same as carrying it with an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// Attribute present with a value (possibly empty)
    Set(String),
    /// Attribute absent on the device
    #[default]
    Unset,
}

static UNSET: AttrValue = AttrValue::Unset;

impl AttrValue {
    /// Get the value if present
    pub fn as_set(&self) -> Option<&str> {
        match self {
            Self::Set(value) => Some(value),
            Self::Unset => None,
        }
    }

    /// Check if the attribute is absent
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    /// Check if the attribute already holds the desired value
    pub fn matches(&self, desired: &str) -> bool {
        self.as_set() == Some(desired)
    }
}

impl From<Option<String>> for AttrValue {
    fn from(value: Option<String>) -> Self {
        value.map_or(Self::Unset, Self::Set)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Set(value.to_string())
    }
}

// ============================================================================
// Desired and observed resources
// ============================================================================

/// Whether a declared resource should exist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DesiredState {
    /// Resource should exist and match the declared attributes
    #[default]
    Present,
    /// Resource should not exist
    Absent,
}

/// A resource as the caller wants it to be
///
/// Only attributes present in `attributes` are managed; an attribute that is
/// not listed is left alone whatever the device reports. `associations` of
/// `None` likewise leaves membership alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredResource {
    pub key: ResourceKey,
    pub state: DesiredState,
    pub attributes: BTreeMap<String, String>,
    pub associations: Option<BTreeSet<String>>,
}

impl DesiredResource {
    /// Create a present resource with nothing specified
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            state: DesiredState::Present,
            attributes: BTreeMap::new(),
            associations: None,
        }
    }

    /// Set a managed attribute
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Declare the exact set of associated identifiers
    pub fn with_associations<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associations = Some(members.into_iter().map(Into::into).collect());
        self
    }

    /// Mark the resource for removal
    pub fn absent(mut self) -> Self {
        self.state = DesiredState::Absent;
        self
    }

    /// Check if the resource should exist
    pub fn is_present(&self) -> bool {
        self.state == DesiredState::Present
    }
}

/// A resource as the external system currently reports it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedResource {
    pub key: ResourceKey,
    pub attributes: BTreeMap<String, AttrValue>,
    pub associations: BTreeSet<String>,
}

impl ObservedResource {
    /// Create an observed resource with no attributes
    pub fn new(key: ResourceKey) -> Self {
        Self {
            key,
            attributes: BTreeMap::new(),
            associations: BTreeSet::new(),
        }
    }

    /// Record an attribute value
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Record associated identifiers
    pub fn with_associations<I, S>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.associations.extend(members.into_iter().map(Into::into));
        self
    }

    /// Look up an attribute, treating a missing entry as unset
    pub fn attribute(&self, name: &str) -> &AttrValue {
        self.attributes.get(name).unwrap_or(&UNSET)
    }
}

// ============================================================================
// Operations
// ============================================================================

/// A single atomic imperative action against one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub key: ResourceKey,
    #[serde(flatten)]
    pub kind: OperationKind,
}

/// What an operation does
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OperationKind {
    /// Create the resource with every specified attribute
    CreateResource { attributes: BTreeMap<String, String> },
    /// Remove the resource
    DeleteResource,
    /// Set one attribute to a value
    SetAttribute { name: String, value: String },
    /// Attach a related identifier
    AddAssociation { member: String },
    /// Detach a related identifier
    RemoveAssociation { member: String },
}

impl OperationKind {
    /// Stable label for reporting
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateResource { .. } => "create-resource",
            Self::DeleteResource => "delete-resource",
            Self::SetAttribute { .. } => "set-attribute",
            Self::AddAssociation { .. } => "add-association",
            Self::RemoveAssociation { .. } => "remove-association",
        }
    }

    /// Check if this is an association change
    pub fn is_association(&self) -> bool {
        matches!(
            self,
            Self::AddAssociation { .. } | Self::RemoveAssociation { .. }
        )
    }
}

impl Operation {
    pub fn create(key: ResourceKey, attributes: BTreeMap<String, String>) -> Self {
        Self {
            key,
            kind: OperationKind::CreateResource { attributes },
        }
    }

    pub fn delete(key: ResourceKey) -> Self {
        Self {
            key,
            kind: OperationKind::DeleteResource,
        }
    }

    pub fn set(key: ResourceKey, name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key,
            kind: OperationKind::SetAttribute {
                name: name.into(),
                value: value.into(),
            },
        }
    }

    pub fn add(key: ResourceKey, member: impl Into<String>) -> Self {
        Self {
            key,
            kind: OperationKind::AddAssociation {
                member: member.into(),
            },
        }
    }

    pub fn remove(key: ResourceKey, member: impl Into<String>) -> Self {
        Self {
            key,
            kind: OperationKind::RemoveAssociation {
                member: member.into(),
            },
        }
    }

    /// Check if this operation removes the resource
    pub fn is_delete(&self) -> bool {
        matches!(self.kind, OperationKind::DeleteResource)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OperationKind::CreateResource { attributes } => {
                write!(f, "create {}", self.key)?;
                if !attributes.is_empty() {
                    let pairs: Vec<String> =
                        attributes.iter().map(|(k, v)| format!("{k}={v}")).collect();
                    write!(f, " ({})", pairs.join(", "))?;
                }
                Ok(())
            }
            OperationKind::DeleteResource => write!(f, "delete {}", self.key),
            OperationKind::SetAttribute { name, value } => {
                write!(f, "set {} {name}={value:?}", self.key)
            }
            OperationKind::AddAssociation { member } => write!(f, "add {member} to {}", self.key),
            OperationKind::RemoveAssociation { member } => {
                write!(f, "remove {member} from {}", self.key)
            }
        }
    }
}

/// Outcome of one operation during execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplyResult {
    /// Operation accepted by the external system
    Applied { assigned_id: Option<String> },
    /// Operation rejected
    Failed { error: String },
    /// Operation not attempted
    Skipped { reason: String },
}
