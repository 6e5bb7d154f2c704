//! File-backed device
//!
//! A JSON state file stands in for a network device. It carries the
//! physical port inventory and one collection per resource kind:
//!
//! ```json
//! {
//!   "read_only": false,
//!   "ports": ["GigabitEthernet0/1", "GigabitEthernet0/2"],
//!   "vlan": [
//!     { "name": "1", "attributes": { "name": "default", "status": "active" } },
//!     { "name": "100", "attributes": { "name": "users" }, "members": ["GigabitEthernet0/1"] }
//!   ]
//! }
//! ```
//!
//! Every accepted operation is written back to disk before the next one is
//! attempted, so a failure halfway through a batch leaves the earlier
//! changes in place.

use anyhow::Context;
use reconcile::{
    Applier, AttrValue, Error, ObservedResource, Operation, OperationKind, ResourceKey,
    ResourceKind, Result, Scope, StateObserver,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Serialized device contents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceState {
    /// Reject every mutation
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    /// Physical interfaces; empty means "not tracked"
    pub ports: Vec<String>,
    /// Resources keyed by kind name
    #[serde(flatten)]
    pub collections: BTreeMap<String, Vec<Entry>>,
}

/// One resource as stored on the device
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub name: String,
    /// `null` or a missing key means the attribute is not configured
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, Option<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<String>,
}

/// Device backed by a JSON file, viewed through one resource kind
pub struct FileDevice<'k> {
    path: PathBuf,
    kind: &'k dyn ResourceKind,
    state: DeviceState,
}

impl<'k> FileDevice<'k> {
    /// Open an existing device file
    pub fn open(path: &Path, kind: &'k dyn ResourceKind) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read device file {}", path.display()))?;
        let state: DeviceState = serde_json::from_str(&content)
            .with_context(|| format!("Invalid device file {}", path.display()))?;
        log::debug!(
            "Opened device {} ({} {} resource(s), {} port(s))",
            path.display(),
            state.collections.get(kind.name()).map_or(0, Vec::len),
            kind.name(),
            state.ports.len()
        );
        Ok(Self {
            path: path.to_path_buf(),
            kind,
            state,
        })
    }

    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    fn entries(&self) -> &[Entry] {
        self.state
            .collections
            .get(self.kind.name())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    fn entries_mut(&mut self) -> &mut Vec<Entry> {
        self.state
            .collections
            .entry(self.kind.name().to_string())
            .or_default()
    }

    /// Index of the entry whose name canonicalizes to `key`
    fn position(&self, key: &ResourceKey) -> Result<Option<usize>> {
        for (index, entry) in self.entries().iter().enumerate() {
            if &self.kind.canonical_key(&entry.name)? == key {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    fn existing(&self, operation: &Operation) -> Result<usize> {
        self.position(&operation.key)?.ok_or_else(|| Error::NotFound {
            key: operation.key.to_string(),
            reference: format!("{} {}", self.kind.name(), operation.key),
        })
    }

    /// Slot of a member in an entry, comparing canonical names
    fn member_position(&self, index: usize, member: &str) -> Result<Option<usize>> {
        for (slot, raw) in self.entries()[index].members.iter().enumerate() {
            if self.kind.canonical_association(raw)? == member {
                return Ok(Some(slot));
            }
        }
        Ok(None)
    }

    fn check_port(&self, operation: &Operation, member: &str) -> Result<()> {
        if self.state.ports.is_empty() {
            return Ok(());
        }
        for port in &self.state.ports {
            if self.kind.canonical_association(port)? == member {
                return Ok(());
            }
        }
        Err(Error::NotFound {
            key: operation.key.to_string(),
            reference: format!("interface {member}"),
        })
    }

    fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.state).map_err(anyhow::Error::from)?;
        fs::write(&self.path, content + "\n").map_err(|source| Error::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl StateObserver for FileDevice<'_> {
    fn observe(&self, scope: &Scope) -> Result<Vec<ObservedResource>> {
        let mut observed = Vec::new();
        for entry in self.entries() {
            let key = self.kind.canonical_key(&entry.name)?;
            if !scope.includes(&key) {
                continue;
            }
            let attributes = entry
                .attributes
                .iter()
                .map(|(name, value)| (name.clone(), AttrValue::from(value.clone())))
                .collect();
            observed.push(self.kind.observed(&entry.name, attributes, &entry.members)?);
        }
        Ok(observed)
    }
}

impl Applier for FileDevice<'_> {
    fn apply(&mut self, operation: &Operation) -> Result<Option<String>> {
        if self.state.read_only {
            return Err(Error::Apply {
                key: operation.key.to_string(),
                operation: operation.kind.label().to_string(),
                detail: "device is read-only".to_string(),
            });
        }

        let mut assigned = None;
        match &operation.kind {
            OperationKind::CreateResource { attributes } => {
                if self.position(&operation.key)?.is_some() {
                    return Err(Error::Apply {
                        key: operation.key.to_string(),
                        operation: operation.kind.label().to_string(),
                        detail: "resource already exists".to_string(),
                    });
                }
                self.entries_mut().push(Entry {
                    name: operation.key.name().to_string(),
                    attributes: attributes
                        .iter()
                        .map(|(name, value)| (name.clone(), Some(value.clone())))
                        .collect(),
                    members: Vec::new(),
                });
                assigned = Some(operation.key.canonical().to_string());
            }
            OperationKind::DeleteResource => {
                let index = self.existing(operation)?;
                self.entries_mut().remove(index);
            }
            OperationKind::SetAttribute { name, value } => {
                let index = self.existing(operation)?;
                self.entries_mut()[index]
                    .attributes
                    .insert(name.clone(), Some(value.clone()));
            }
            OperationKind::AddAssociation { member } => {
                let index = self.existing(operation)?;
                self.check_port(operation, member)?;
                if self.member_position(index, member)?.is_none() {
                    self.entries_mut()[index].members.push(member.clone());
                }
            }
            OperationKind::RemoveAssociation { member } => {
                let index = self.existing(operation)?;
                if let Some(slot) = self.member_position(index, member)? {
                    self.entries_mut()[index].members.remove(slot);
                }
            }
        }

        self.save()?;
        log::debug!("device {}: {operation}", self.path.display());
        Ok(assigned)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{Vlan, Vrf};
    use reconcile::ErrorKind;
    use tempfile::TempDir;

    const VLAN_DEVICE: &str = r#"{
  "ports": ["GigabitEthernet0/1", "GigabitEthernet0/2"],
  "vlan": [
    { "name": "1", "attributes": { "name": "default", "status": "active" } },
    {
      "name": "100",
      "attributes": { "name": "users", "status": "suspended" },
      "members": ["Gi0/1"]
    }
  ]
}"#;

    fn device_file(content: &str) -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("device.json");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_observe_normalizes_entries() {
        let (_dir, path) = device_file(VLAN_DEVICE);
        let kind = Vlan::default();
        let device = FileDevice::open(&path, &kind).unwrap();

        let all = device.observe(&Scope::All).unwrap();
        assert_eq!(all.len(), 2);

        let vlan100 = &all[1];
        assert!(vlan100.attribute("status").matches("suspend"));
        assert!(vlan100.associations.contains("GigabitEthernet0/1"));

        let scoped = device
            .observe(&Scope::keys([ResourceKey::verbatim("100")]))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert_eq!(scoped[0].key.name(), "100");
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let (_dir, path) = device_file(VLAN_DEVICE);
        let kind = Vrf::default();
        let device = FileDevice::open(&path, &kind).unwrap();
        assert!(device.observe(&Scope::All).unwrap().is_empty());
    }

    #[test]
    fn test_apply_persists_each_operation() {
        let (_dir, path) = device_file(VLAN_DEVICE);
        let kind = Vlan::default();
        let key = ResourceKey::verbatim("200");

        {
            let mut device = FileDevice::open(&path, &kind).unwrap();
            let mut attrs = BTreeMap::new();
            attrs.insert("name".to_string(), "servers".to_string());
            let id = device.apply(&Operation::create(key.clone(), attrs)).unwrap();
            assert_eq!(id.as_deref(), Some("200"));
            device
                .apply(&Operation::add(key.clone(), "GigabitEthernet0/2"))
                .unwrap();
        }

        let reopened = FileDevice::open(&path, &kind).unwrap();
        let observed = reopened.observe(&Scope::keys([key])).unwrap();
        assert_eq!(observed.len(), 1);
        assert!(observed[0].attribute("name").matches("servers"));
        assert!(observed[0].attribute("status").is_unset());
        assert!(observed[0].associations.contains("GigabitEthernet0/2"));
    }

    #[test]
    fn test_create_existing_is_apply_error() {
        let (_dir, path) = device_file(VLAN_DEVICE);
        let kind = Vlan::default();
        let mut device = FileDevice::open(&path, &kind).unwrap();

        let err = device
            .apply(&Operation::create(ResourceKey::verbatim("100"), BTreeMap::new()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Apply);
    }

    #[test]
    fn test_missing_references_are_not_found() {
        let (_dir, path) = device_file(VLAN_DEVICE);
        let kind = Vlan::default();
        let mut device = FileDevice::open(&path, &kind).unwrap();

        let unknown_port = device
            .apply(&Operation::add(ResourceKey::verbatim("100"), "GigabitEthernet0/9"))
            .unwrap_err();
        assert_eq!(unknown_port.kind(), ErrorKind::NotFound);
        assert!(unknown_port.to_string().contains("interface GigabitEthernet0/9"));

        let missing = device
            .apply(&Operation::set(ResourceKey::verbatim("300"), "name", "x"))
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let delete_missing = device
            .apply(&Operation::delete(ResourceKey::verbatim("300")))
            .unwrap_err();
        assert_eq!(delete_missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_remove_matches_abbreviated_member() {
        let (_dir, path) = device_file(VLAN_DEVICE);
        let kind = Vlan::default();
        let mut device = FileDevice::open(&path, &kind).unwrap();

        device
            .apply(&Operation::remove(ResourceKey::verbatim("100"), "GigabitEthernet0/1"))
            .unwrap();
        assert!(device.state().collections["vlan"][1].members.is_empty());
    }

    #[test]
    fn test_untracked_ports_accept_any_member() {
        let (_dir, path) = device_file(r#"{ "vlan": [ { "name": "10" } ] }"#);
        let kind = Vlan::default();
        let mut device = FileDevice::open(&path, &kind).unwrap();
        device
            .apply(&Operation::add(ResourceKey::verbatim("10"), "Ethernet7"))
            .unwrap();
        assert_eq!(device.state().collections["vlan"][0].members, vec!["Ethernet7"]);
    }

    #[test]
    fn test_read_only_rejects_mutation() {
        let (_dir, path) = device_file(r#"{ "read_only": true, "vrf": [] }"#);
        let kind = Vrf::default();
        let mut device = FileDevice::open(&path, &kind).unwrap();

        let err = device
            .apply(&Operation::create(ResourceKey::new("Blue", "blue"), BTreeMap::new()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Apply);
        assert!(err.to_string().contains("read-only"));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{ "read_only": true, "vrf": [] }"#);
    }

    #[test]
    fn test_vrf_lookup_is_case_insensitive() {
        let (_dir, path) = device_file(r#"{ "vrf": [ { "name": "BLUE" } ] }"#);
        let kind = Vrf::default();
        let mut device = FileDevice::open(&path, &kind).unwrap();

        device
            .apply(&Operation::set(ResourceKey::new("blue", "blue"), "description", "tenant"))
            .unwrap();
        let entry = &device.state().collections["vrf"][0];
        assert_eq!(entry.name, "BLUE");
        assert_eq!(entry.attributes["description"].as_deref(), Some("tenant"));
    }
}
