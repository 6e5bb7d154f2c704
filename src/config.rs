//! Application configuration
//!
//! Loaded from `config.toml` in the config directory, or from an explicit
//! `--config` path. A missing default file means built-in defaults.
//!
//! ```toml
//! [execution]
//! error_policy = "fail-fast"
//!
//! [verify]
//! enabled = true
//! delay_secs = 10
//! poll_interval_ms = 1000
//! timeout_secs = 30
//!
//! [kinds.vlan]
//! reserved = ["1", "1002"]
//! empty_associations = "remove-all"
//! ```

use anyhow::{Context, Result, bail};
use reconcile::{EmptyAssociations, ErrorPolicy, VerifyOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::paths;
use crate::resource::KINDS;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub execution: ExecutionConfig,
    pub verify: VerifyConfig,
    pub kinds: BTreeMap<String, KindConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutionConfig {
    pub error_policy: ErrorPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerifyConfig {
    pub enabled: bool,
    pub delay_secs: u64,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            delay_secs: 10,
            poll_interval_ms: 1000,
            timeout_secs: 30,
        }
    }
}

impl VerifyConfig {
    pub fn options(&self) -> VerifyOptions {
        VerifyOptions {
            delay: Duration::from_secs(self.delay_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Overrides for one resource kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KindConfig {
    pub reserved: Option<Vec<String>>,
    pub empty_associations: Option<EmptyAssociations>,
}

impl Config {
    /// Load config from an explicit path, or the default location
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_file(path);
        }

        let path = paths::config_file()?;
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load_file(&path)
    }

    /// Load config from a file that must exist
    pub fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let config = Self::parse(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for name in self.kinds.keys() {
            if !KINDS.contains(&name.as_str()) {
                bail!(
                    "Unknown kind '{name}' in [kinds] (expected one of: {})",
                    KINDS.join(", ")
                );
            }
        }
        if self.verify.poll_interval_ms == 0 {
            bail!("verify.poll_interval_ms must be greater than zero");
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
