//! Resource kinds managed by converge
//!
//! Each kind implements [`reconcile::ResourceKind`] for one family of
//! network resources. Reserved keys and the empty-association policy come
//! from the kind's built-in settings, optionally overridden in config.

use anyhow::{Result, bail};
use reconcile::{EmptyAssociations, ResourceKind};

use crate::config::{Config, KindConfig};

pub mod l3_interface;
pub mod vlan;
pub mod vrf;

pub use l3_interface::L3Interface;
pub use vlan::Vlan;
pub use vrf::Vrf;

/// Names of every supported kind, in display order
pub const KINDS: &[&str] = &[Vlan::NAME, Vrf::NAME, L3Interface::NAME];

/// Per-kind knobs the user may override
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSettings {
    pub reserved: Vec<String>,
    pub empty_associations: EmptyAssociations,
}

impl KindSettings {
    pub fn new<I, S>(reserved: I, empty_associations: EmptyAssociations) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved: reserved.into_iter().map(Into::into).collect(),
            empty_associations,
        }
    }

    /// Replace whichever settings the config section provides
    #[must_use]
    pub fn with_overrides(mut self, overrides: Option<&KindConfig>) -> Self {
        let Some(overrides) = overrides else {
            return self;
        };
        if let Some(reserved) = &overrides.reserved {
            self.reserved.clone_from(reserved);
        }
        if let Some(policy) = overrides.empty_associations {
            self.empty_associations = policy;
        }
        self
    }
}

/// Resolve a kind by name, applying config overrides
pub fn lookup(name: &str, config: &Config) -> Result<Box<dyn ResourceKind>> {
    let overrides = config.kinds.get(name);
    let kind: Box<dyn ResourceKind> = match name {
        Vlan::NAME => Box::new(Vlan::new(Vlan::default_settings().with_overrides(overrides))),
        Vrf::NAME => Box::new(Vrf::new(Vrf::default_settings().with_overrides(overrides))),
        L3Interface::NAME => Box::new(L3Interface::new(
            L3Interface::default_settings().with_overrides(overrides),
        )),
        other => bail!(
            "Unknown resource kind '{other}' (expected one of: {})",
            KINDS.join(", ")
        ),
    };
    log::debug!(
        "Resolved kind {name}: reserved={:?}, empty associations={}",
        kind.reserved_keys(),
        kind.empty_associations()
    );
    Ok(kind)
}
