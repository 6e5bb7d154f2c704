//! Spec loader - parses desired-state descriptors
//!
//! A descriptor names one resource kind and declares either an `aggregate`
//! list of resources or a single `resource`. Field values are normalized to
//! strings and checked against the kind before any I/O happens.
//!
//! ```toml
//! kind = "vlan"
//! purge = true
//!
//! [defaults]
//! status = "active"
//!
//! [[aggregate]]
//! vlan_id = 100
//! name = "test-vlan"
//! interfaces = ["eth0", "eth1"]
//! ```

use crate::error::{Error, Result};
use crate::kind::{EmptyAssociations, ResourceKind};
use crate::types::{DesiredResource, DesiredState, ResourceKey};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

/// Field selecting `present` or `absent` on an entry
pub const STATE_FIELD: &str = "state";

/// Descriptor file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Toml,
    Json,
}

impl Format {
    /// Pick a format from the file extension, TOML unless it is `.json`
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// A parsed but not yet validated descriptor
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    /// Resource kind every entry belongs to
    pub kind: String,
    /// Delete undeclared resources
    #[serde(default)]
    pub purge: bool,
    /// Values for fields an entry leaves out or sets to null
    #[serde(default)]
    pub defaults: Map<String, Value>,
    /// Many resources
    #[serde(default)]
    pub aggregate: Option<Vec<Map<String, Value>>>,
    /// Exactly one resource
    #[serde(default)]
    pub resource: Option<Map<String, Value>>,
}

/// Validated desired state for one kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredSet {
    pub kind: String,
    pub purge: bool,
    /// Resources in declaration order, keys unique
    pub resources: Vec<DesiredResource>,
}

impl DesiredSet {
    /// Keys of every declared resource
    pub fn keys(&self) -> impl Iterator<Item = &ResourceKey> {
        self.resources.iter().map(|r| &r.key)
    }
}

impl Document {
    /// Parse descriptor text
    pub fn parse(text: &str, format: Format) -> Result<Self> {
        let parsed = match format {
            Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| Error::Descriptor {
            path: None,
            message,
        })
    }

    /// Read and parse a descriptor file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text, Format::from_path(path)).map_err(|e| match e {
            Error::Descriptor { message, .. } => Error::Descriptor {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        })
    }

    /// Validate every entry against `kind` and build the desired set
    pub fn resolve(&self, kind: &dyn ResourceKind) -> Result<DesiredSet> {
        if self.kind != kind.name() {
            return Err(Error::invalid(format!(
                "descriptor declares kind '{}' but was resolved as '{}'",
                self.kind,
                kind.name()
            )));
        }

        let entries: Vec<&Map<String, Value>> = match (&self.aggregate, &self.resource) {
            (Some(_), Some(_)) => {
                return Err(Error::invalid(
                    "aggregate and resource are mutually exclusive",
                ));
            }
            (None, None) => {
                return Err(Error::invalid("one of aggregate or resource is required"));
            }
            (Some(items), None) => items.iter().collect(),
            (None, Some(item)) => vec![item],
        };

        for field in self.defaults.keys() {
            if field == kind.key_field() {
                return Err(Error::invalid(format!(
                    "defaults cannot set the key field '{field}'"
                )));
            }
            if field != STATE_FIELD && !kind.accepts_field(field) {
                return Err(Error::invalid(format!(
                    "unknown field '{field}' in defaults for kind {}",
                    kind.name()
                )));
            }
        }

        let mut seen = HashSet::new();
        let mut resources = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            let resource = self.resolve_entry(kind, entry, index)?;
            if !seen.insert(resource.key.clone()) {
                return Err(Error::validation(
                    resource.key.to_string(),
                    "declared more than once",
                ));
            }
            resources.push(resource);
        }

        Ok(DesiredSet {
            kind: self.kind.clone(),
            purge: self.purge,
            resources,
        })
    }

    fn resolve_entry(
        &self,
        kind: &dyn ResourceKind,
        entry: &Map<String, Value>,
        index: usize,
    ) -> Result<DesiredResource> {
        let label = format!("entry {}", index + 1);

        if let Some(field) = entry
            .keys()
            .find(|f| f.as_str() != STATE_FIELD && !kind.accepts_field(f))
        {
            return Err(Error::validation(
                label,
                format!("unknown field '{field}' for kind {}", kind.name()),
            ));
        }

        let value_of = |field: &str| lookup(entry, &self.defaults, field);

        let Some(raw_key) = value_of(kind.key_field()) else {
            return Err(Error::validation(
                label,
                format!("missing required field '{}'", kind.key_field()),
            ));
        };
        let key = kind.canonical_key(&scalar(&label, kind.key_field(), raw_key)?)?;
        let name = key.to_string();
        let mut resource = DesiredResource::new(key);

        if let Some(state) = value_of(STATE_FIELD) {
            resource.state = match state.as_str() {
                Some("present") => DesiredState::Present,
                Some("absent") => DesiredState::Absent,
                _ => {
                    return Err(Error::validation(
                        name,
                        format!("state must be present or absent, got {state}"),
                    ));
                }
            };
        }

        for attr in kind.attribute_names() {
            if let Some(value) = value_of(*attr) {
                let raw = scalar(&name, attr, value)?;
                resource
                    .attributes
                    .insert((*attr).to_string(), kind.canonical_value(attr, &raw));
            }
        }

        if let Some(field) = kind.association_field()
            && let Some(value) = value_of(field)
        {
            let Value::Array(items) = value else {
                return Err(Error::validation(name, format!("{field} must be a list")));
            };
            let members = items
                .iter()
                .map(|item| kind.canonical_association(&scalar(&name, field, item)?))
                .collect::<Result<BTreeSet<String>>>()?;

            resource.associations =
                if members.is_empty() && kind.empty_associations() == EmptyAssociations::Unchanged {
                    None
                } else {
                    Some(members)
                };
        }

        kind.validate(&resource)?;
        Ok(resource)
    }
}

/// Entry value for `field`, falling back to the defaults when missing or null
fn lookup<'a>(
    entry: &'a Map<String, Value>,
    defaults: &'a Map<String, Value>,
    field: &str,
) -> Option<&'a Value> {
    entry
        .get(field)
        .filter(|v| !v.is_null())
        .or_else(|| defaults.get(field).filter(|v| !v.is_null()))
}

/// Normalize a scalar descriptor value to its string form
fn scalar(label: &str, field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(Error::validation(
            label,
            format!("{field} must be a string, number or boolean"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::Operation;
    use std::io::Write;

    /// Minimal kind: numeric keys, one attribute, lowercase members
    struct Numbered {
        empty: EmptyAssociations,
    }

    impl ResourceKind for Numbered {
        fn name(&self) -> &str {
            "numbered"
        }

        fn key_field(&self) -> &str {
            "id"
        }

        fn association_field(&self) -> Option<&str> {
            Some("members")
        }

        fn attribute_names(&self) -> &[&'static str] {
            &["name", "enabled"]
        }

        fn canonical_key(&self, raw: &str) -> Result<ResourceKey> {
            let id: u32 = raw
                .trim()
                .parse()
                .map_err(|_| Error::validation(raw, "id must be an integer"))?;
            Ok(ResourceKey::verbatim(id.to_string()))
        }

        fn canonical_association(&self, raw: &str) -> Result<String> {
            Ok(raw.to_lowercase())
        }

        fn empty_associations(&self) -> EmptyAssociations {
            self.empty
        }

        fn render(&self, operation: &Operation) -> Vec<String> {
            vec![operation.to_string()]
        }
    }

    fn kind() -> Numbered {
        Numbered {
            empty: EmptyAssociations::Unchanged,
        }
    }

    fn resolve(text: &str) -> Result<DesiredSet> {
        Document::parse(text, Format::Toml)?.resolve(&kind())
    }

    #[test]
    fn test_aggregate_with_defaults() {
        let set = resolve(
            r#"
kind = "numbered"
purge = true

[defaults]
enabled = true

[[aggregate]]
id = 100
name = "web"
members = ["ETH0", "eth1"]

[[aggregate]]
id = "7"
enabled = false
"#,
        )
        .unwrap();

        assert!(set.purge);
        assert_eq!(set.resources.len(), 2);

        let web = &set.resources[0];
        assert_eq!(web.key.name(), "100");
        assert_eq!(web.attributes.get("name").unwrap(), "web");
        assert_eq!(web.attributes.get("enabled").unwrap(), "true");
        let members: Vec<&str> = web
            .associations
            .as_ref()
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(members, vec!["eth0", "eth1"]);

        let seven = &set.resources[1];
        assert_eq!(seven.attributes.get("enabled").unwrap(), "false");
        assert!(!seven.attributes.contains_key("name"));
        assert!(seven.associations.is_none());
    }

    #[test]
    fn test_single_resource_json() {
        let doc = Document::parse(
            r#"{"kind": "numbered", "resource": {"id": 5, "name": "", "state": "absent"}}"#,
            Format::Json,
        )
        .unwrap();
        let set = doc.resolve(&kind()).unwrap();

        assert!(!set.purge);
        let resource = &set.resources[0];
        assert_eq!(resource.state, DesiredState::Absent);
        assert_eq!(resource.attributes.get("name").unwrap(), "");
    }

    #[test]
    fn test_null_falls_back_to_default() {
        let doc = Document::parse(
            r#"{"kind": "numbered", "defaults": {"name": "fallback"},
                "aggregate": [{"id": 1, "name": null}]}"#,
            Format::Json,
        )
        .unwrap();
        let set = doc.resolve(&kind()).unwrap();

        assert_eq!(set.resources[0].attributes.get("name").unwrap(), "fallback");
    }

    #[test]
    fn test_aggregate_and_resource_exclusive() {
        let err = resolve(
            r#"
kind = "numbered"
[resource]
id = 1
[[aggregate]]
id = 2
"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_one_of_aggregate_or_resource_required() {
        let err = resolve("kind = \"numbered\"\n").unwrap_err();
        assert!(err.to_string().contains("required"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = resolve(
            r#"
kind = "numbered"
[resource]
id = 1
colour = "red"
"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "validation failed for entry 1: unknown field 'colour' for kind numbered"
        );
    }

    #[test]
    fn test_missing_key_rejected() {
        let err = resolve(
            r#"
kind = "numbered"
[[aggregate]]
name = "nameless"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing required field 'id'"));
    }

    #[test]
    fn test_duplicate_canonical_key_rejected() {
        let err = resolve(
            r#"
kind = "numbered"
[[aggregate]]
id = 10
[[aggregate]]
id = "010"
"#,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "validation failed for 10: declared more than once");
    }

    #[test]
    fn test_invalid_state_rejected() {
        let err = resolve(
            r#"
kind = "numbered"
[resource]
id = 1
state = "gone"
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("state must be present or absent"));
    }

    #[test]
    fn test_empty_associations_policy() {
        let text = r#"
kind = "numbered"
[resource]
id = 1
members = []
"#;
        let doc = Document::parse(text, Format::Toml).unwrap();

        let unchanged = doc.resolve(&kind()).unwrap();
        assert!(unchanged.resources[0].associations.is_none());

        let remove_all = doc
            .resolve(&Numbered {
                empty: EmptyAssociations::RemoveAll,
            })
            .unwrap();
        assert_eq!(remove_all.resources[0].associations, Some(BTreeSet::new()));
    }

    #[test]
    fn test_non_scalar_attribute_rejected() {
        let err = resolve(
            r#"
kind = "numbered"
[resource]
id = 1
name = ["a", "b"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("name must be a string, number or boolean"));
    }

    #[test]
    fn test_kind_mismatch() {
        let err = resolve("kind = \"vrf\"\n[resource]\nid = 1\n").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unknown_top_level_field_is_descriptor_error() {
        let err = Document::parse("kind = \"numbered\"\nprune = true\n", Format::Toml).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_load_picks_format_from_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"kind": "numbered", "resource": {{"id": 3}}}}"#).unwrap();

        let doc = Document::load(file.path()).unwrap();
        assert_eq!(doc.kind, "numbered");
        assert_eq!(Format::from_path(Path::new("x.toml")), Format::Toml);
        assert_eq!(Format::from_path(Path::new("x.JSON")), Format::Json);
    }

    #[test]
    fn test_load_reports_path_on_parse_error() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "kind = ").unwrap();

        let err = Document::load(file.path()).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("invalid descriptor "));
        assert!(message.contains(&file.path().display().to_string()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Document::load(Path::new("/nonexistent/desired.toml")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Input);
    }
}
