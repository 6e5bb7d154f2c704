//! VLAN resource kind
//!
//! Keyed by numeric VLAN ID. Member interfaces are access ports; short
//! interface names reported by the device (`Gi1/0/1`) are expanded so they
//! compare equal to the long form users tend to write.

use reconcile::{
    EmptyAssociations, Error, Operation, OperationKind, ResourceKey, ResourceKind, Result,
    require_choice,
};

use super::KindSettings;

const ATTRIBUTES: &[&str] = &["name", "status"];
const STATUSES: &[&str] = &["active", "suspend"];

/// Interface name prefixes the device abbreviates
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Gi", "GigabitEthernet"),
    ("Fa", "FastEthernet"),
    ("Te", "TenGigabitEthernet"),
];

/// VLANs on an access switch
#[derive(Debug, Clone)]
pub struct Vlan {
    settings: KindSettings,
}

impl Vlan {
    pub const NAME: &'static str = "vlan";

    pub fn new(settings: KindSettings) -> Self {
        Self { settings }
    }

    /// Built-in reserved keys and empty-list policy
    pub fn default_settings() -> KindSettings {
        KindSettings::new(["1"], EmptyAssociations::Unchanged)
    }
}

impl Default for Vlan {
    fn default() -> Self {
        Self::new(Self::default_settings())
    }
}

impl ResourceKind for Vlan {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn key_field(&self) -> &str {
        "vlan_id"
    }

    fn association_field(&self) -> Option<&str> {
        Some("interfaces")
    }

    fn attribute_names(&self) -> &[&'static str] {
        ATTRIBUTES
    }

    fn canonical_key(&self, raw: &str) -> Result<ResourceKey> {
        let id: u32 = raw
            .trim()
            .parse()
            .map_err(|_| Error::validation(raw, "vlan_id must be an integer"))?;
        Ok(ResourceKey::verbatim(id.to_string()))
    }

    fn canonical_association(&self, raw: &str) -> Result<String> {
        Ok(expand_interface(raw.trim()))
    }

    fn canonical_value(&self, attribute: &str, raw: &str) -> String {
        match (attribute, raw) {
            ("status", "suspended") => "suspend".to_string(),
            _ => raw.to_string(),
        }
    }

    fn validate(&self, resource: &reconcile::DesiredResource) -> Result<()> {
        let key = &resource.key;
        let in_range = key
            .canonical()
            .parse::<u32>()
            .is_ok_and(|id| (1..=4094).contains(&id));
        if !in_range {
            return Err(Error::validation(
                key.to_string(),
                "vlan_id must be between 1 and 4094",
            ));
        }

        if let Some(status) = resource.attributes.get("status") {
            require_choice(key, "status", status, STATUSES)?;
        }
        Ok(())
    }

    fn reserved_keys(&self) -> Vec<String> {
        self.settings.reserved.clone()
    }

    fn empty_associations(&self) -> EmptyAssociations {
        self.settings.empty_associations
    }

    fn render(&self, operation: &Operation) -> Vec<String> {
        let id = operation.key.name();
        match &operation.kind {
            OperationKind::CreateResource { attributes } => {
                let mut lines = vec![format!("vlan {id}")];
                if let Some(name) = attributes.get("name").filter(|n| !n.is_empty()) {
                    lines.push(format!("name {name}"));
                }
                if let Some(status) = attributes.get("status") {
                    lines.push(format!("state {status}"));
                }
                lines
            }
            OperationKind::SetAttribute { name, value } => {
                let line = match (name.as_str(), value.is_empty()) {
                    ("name", true) => "no name".to_string(),
                    ("name", false) => format!("name {value}"),
                    (_, _) => format!("state {value}"),
                };
                vec![format!("vlan {id}"), line]
            }
            OperationKind::AddAssociation { member } => vec![
                format!("interface {member}"),
                "switchport mode access".to_string(),
                format!("switchport access vlan {id}"),
            ],
            OperationKind::RemoveAssociation { member } => vec![
                format!("interface {member}"),
                "switchport mode access".to_string(),
                format!("no switchport access vlan {id}"),
            ],
            OperationKind::DeleteResource => vec![format!("no vlan {id}")],
        }
    }
}

/// Expand an abbreviated interface name (`Gi0/1` to `GigabitEthernet0/1`)
pub fn expand_interface(name: &str) -> String {
    for (short, long) in ABBREVIATIONS {
        if let Some(rest) = name.strip_prefix(short)
            && rest.starts_with(|c: char| c.is_ascii_digit())
        {
            return format!("{long}{rest}");
        }
    }
    name.to_string()
}
