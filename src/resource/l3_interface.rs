//! L3 interface resource kind

use reconcile::{
    DesiredResource, EmptyAssociations, Error, Operation, OperationKind, ResourceKey,
    ResourceKind, Result,
};
use std::net::{Ipv4Addr, Ipv6Addr};

use super::KindSettings;

const ATTRIBUTES: &[&str] = &["ipv4", "ipv6"];

/// Routed interfaces and their addresses
#[derive(Debug, Clone)]
pub struct L3Interface {
    settings: KindSettings,
}

impl L3Interface {
    pub const NAME: &'static str = "l3_interface";

    pub fn new(settings: KindSettings) -> Self {
        Self { settings }
    }

    /// Built-in reserved keys and empty-list policy
    pub fn default_settings() -> KindSettings {
        KindSettings::new(["mgmt0"], EmptyAssociations::Unchanged)
    }
}

impl Default for L3Interface {
    fn default() -> Self {
        Self::new(Self::default_settings())
    }
}

impl ResourceKind for L3Interface {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn key_field(&self) -> &str {
        "name"
    }

    fn attribute_names(&self) -> &[&'static str] {
        ATTRIBUTES
    }

    fn canonical_key(&self, raw: &str) -> Result<ResourceKey> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::invalid("interface name cannot be empty"));
        }
        Ok(ResourceKey::verbatim(name))
    }

    fn validate(&self, resource: &DesiredResource) -> Result<()> {
        for (attr, value) in &resource.attributes {
            if value.is_empty() {
                continue;
            }
            let valid = match attr.as_str() {
                "ipv4" => is_prefixed::<Ipv4Addr>(value, 32),
                _ => is_prefixed::<Ipv6Addr>(value, 128),
            };
            if !valid {
                return Err(Error::validation(
                    resource.key.to_string(),
                    format!("{attr} must be an address/prefix, got '{value}'"),
                ));
            }
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
        let name = operation.key.name();
        let mut lines = vec![format!("interface {name}"), "no switchport".to_string()];
        match &operation.kind {
            OperationKind::CreateResource { attributes } => {
                for (attr, value) in attributes.iter().filter(|(_, v)| !v.is_empty()) {
                    lines.push(address_line(attr, value));
                }
            }
            OperationKind::SetAttribute { name: attr, value } => {
                lines.push(address_line(attr, value));
            }
            OperationKind::DeleteResource => return vec![format!("no interface {name}")],
            OperationKind::AddAssociation { .. } | OperationKind::RemoveAssociation { .. } => {
                return Vec::new();
            }
        }
        lines.push("exit".to_string());
        lines
    }
}

fn address_line(attr: &str, value: &str) -> String {
    let family = if attr == "ipv4" { "ip" } else { "ipv6" };
    if value.is_empty() {
        format!("no {family} address")
    } else {
        format!("{family} address {value}")
    }
}

/// Check `address/prefix` with a prefix no longer than `max_prefix`
fn is_prefixed<A: std::str::FromStr>(value: &str, max_prefix: u8) -> bool {
    let Some((address, prefix)) = value.split_once('/') else {
        return false;
    };
    address.parse::<A>().is_ok() && prefix.parse::<u8>().is_ok_and(|p| p <= max_prefix)
}
