//! VRF resource kind
//!
//! VRF names are matched case-insensitively but created with the casing the
//! user wrote. `default` and `management` exist on every device and cannot
//! be removed.

use once_cell::sync::Lazy;
use regex::Regex;
use reconcile::{
    DesiredResource, EmptyAssociations, Error, Operation, OperationKind, ResourceKey,
    ResourceKind, Result, require_choice,
};

use super::KindSettings;

const ATTRIBUTES: &[&str] = &["admin_state", "description", "rd", "vni"];
const ADMIN_STATES: &[&str] = &["up", "down"];
const MAX_NAME_LEN: usize = 32;
const MAX_VNI: u32 = 16_777_214;

/// Route distinguisher: `auto`, `ASN:nn`, or `A.B.C.D:nn`
static RD_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(auto|\d+:\d+|\d{1,3}(\.\d{1,3}){3}:\d+)$").ok());

/// Keyword that clears `rd` or `vni`, same as an empty value
const CLEAR_KEYWORD: &str = "default";

/// VRF contexts on a routing switch
#[derive(Debug, Clone)]
pub struct Vrf {
    settings: KindSettings,
}

impl Vrf {
    pub const NAME: &'static str = "vrf";

    pub fn new(settings: KindSettings) -> Self {
        Self { settings }
    }

    /// Built-in reserved keys and empty-list policy
    pub fn default_settings() -> KindSettings {
        KindSettings::new(["default", "management"], EmptyAssociations::Unchanged)
    }
}

impl Default for Vrf {
    fn default() -> Self {
        Self::new(Self::default_settings())
    }
}

impl ResourceKind for Vrf {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn key_field(&self) -> &str {
        "name"
    }

    fn association_field(&self) -> Option<&str> {
        Some("interfaces")
    }

    fn attribute_names(&self) -> &[&'static str] {
        ATTRIBUTES
    }

    fn canonical_key(&self, raw: &str) -> Result<ResourceKey> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(Error::invalid("VRF name cannot be empty"));
        }
        Ok(ResourceKey::new(name, name.to_lowercase()))
    }

    fn canonical_association(&self, raw: &str) -> Result<String> {
        Ok(raw.trim().to_string())
    }

    fn canonical_value(&self, attribute: &str, raw: &str) -> String {
        match attribute {
            "admin_state" => raw.trim().to_lowercase(),
            "rd" | "vni" if raw.trim() == CLEAR_KEYWORD => String::new(),
            _ => raw.to_string(),
        }
    }

    fn validate(&self, resource: &DesiredResource) -> Result<()> {
        let key = &resource.key;

        if key.canonical() == "default" {
            return Err(Error::validation(
                key.to_string(),
                "cannot use default as name of a VRF",
            ));
        }
        if key.name().chars().count() > MAX_NAME_LEN {
            return Err(Error::validation(
                key.to_string(),
                format!("VRF name exceeded max length of {MAX_NAME_LEN}"),
            ));
        }

        if let Some(state) = resource.attributes.get("admin_state") {
            require_choice(key, "admin_state", state, ADMIN_STATES)?;
        }

        if let Some(vni) = resource.attributes.get("vni").filter(|v| !v.is_empty()) {
            let valid = vni.parse::<u32>().is_ok_and(|n| (1..=MAX_VNI).contains(&n));
            if !valid {
                return Err(Error::validation(
                    key.to_string(),
                    format!("vni must be an integer between 1 and {MAX_VNI}, got '{vni}'"),
                ));
            }
        }

        if let Some(rd) = resource.attributes.get("rd").filter(|v| !v.is_empty()) {
            let valid = RD_PATTERN.as_ref().is_some_and(|re| re.is_match(rd));
            if !valid {
                return Err(Error::validation(
                    key.to_string(),
                    format!("rd must be auto, ASN:nn or A.B.C.D:nn, got '{rd}'"),
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
        match &operation.kind {
            OperationKind::CreateResource { attributes } => {
                let mut lines = vec![format!("vrf context {name}")];
                for attr in ["rd", "description", "vni", "admin_state"] {
                    if let Some(value) = attributes.get(attr)
                        && !value.is_empty()
                    {
                        lines.push(attribute_line(attr, value));
                    }
                }
                lines.push("exit".to_string());
                lines
            }
            OperationKind::SetAttribute { name: attr, value } => vec![
                format!("vrf context {name}"),
                attribute_line(attr, value),
                "exit".to_string(),
            ],
            OperationKind::AddAssociation { member } => vec![
                format!("interface {member}"),
                "no switchport".to_string(),
                format!("vrf member {name}"),
            ],
            OperationKind::RemoveAssociation { member } => vec![
                format!("interface {member}"),
                "no switchport".to_string(),
                format!("no vrf member {name}"),
            ],
            OperationKind::DeleteResource => vec![format!("no vrf context {name}")],
        }
    }
}

/// Configuration line setting one VRF attribute; an empty value clears it
fn attribute_line(attr: &str, value: &str) -> String {
    match (attr, value) {
        ("admin_state", "down") => "shutdown".to_string(),
        ("admin_state", _) => "no shutdown".to_string(),
        (_, "") => format!("no {attr}"),
        _ => format!("{attr} {value}"),
    }
}
