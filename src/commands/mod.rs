//! Command implementations
//!
//! Every command follows the same pipeline: load the descriptor, resolve its
//! kind, open the device, observe, diff, and then print, apply or verify.

use anyhow::{Context, Result};
use colored::Colorize;
use regex::Regex;
use reconcile::{
    DesiredResource, DesiredSet, Document, Plan, PlanSummary, PurgePolicy, ResourceKey,
    ResourceKind, Scope, StateObserver, diff,
};

use crate::cli::TargetArgs;
use crate::config::Config;
use crate::resource;
use crate::ui;

pub mod apply;
pub mod observe;
pub mod plan;
pub mod validate;

/// A descriptor resolved against its kind
pub struct Prepared {
    pub kind: Box<dyn ResourceKind>,
    pub desired: DesiredSet,
    pub purge: PurgePolicy,
}

impl Prepared {
    /// Load and validate a descriptor file
    pub fn load(config: &Config, target: &TargetArgs) -> Result<Self> {
        let path = &target.descriptor;
        let document = Document::load(path)?;
        let kind = resource::lookup(&document.kind, config)
            .with_context(|| format!("In descriptor {}", path.display()))?;
        let desired = document
            .resolve(kind.as_ref())
            .with_context(|| format!("In descriptor {}", path.display()))?;
        let purge = PurgePolicy::for_kind(desired.purge || target.purge, kind.as_ref());

        log::info!(
            "Loaded {} {} resource(s) from {} (purge: {})",
            desired.resources.len(),
            kind.name(),
            path.display(),
            purge.is_enabled()
        );
        Ok(Self {
            kind,
            desired,
            purge,
        })
    }

    /// Observe the device and compute the operations still needed
    pub fn plan(&self, device: &dyn StateObserver, filter: &KeyFilter) -> Result<Plan> {
        let scope = if self.purge.is_enabled() {
            Scope::All
        } else {
            Scope::keys(self.desired.keys().cloned())
        };
        let have = device.observe(&scope)?;
        log::debug!("Observed {} {} resource(s)", have.len(), self.kind.name());

        let operations = diff(&self.desired.resources, &have, &self.purge)?;
        Ok(filter.narrow(Plan::new(operations)))
    }
}

// ============================================================================
// Key filter (--limit)
// ============================================================================

/// Key selection from `--limit` patterns; `*` and `?` are wildcards
pub struct KeyFilter {
    patterns: Vec<Regex>,
}

impl KeyFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let translated = regex::escape(pattern)
                    .replace(r"\*", ".*")
                    .replace(r"\?", ".");
                Regex::new(&format!("^{translated}$"))
                    .with_context(|| format!("Invalid --limit pattern '{pattern}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Check a key against the patterns; no patterns selects everything
    pub fn matches(&self, key: &ResourceKey) -> bool {
        self.is_empty()
            || self
                .patterns
                .iter()
                .any(|re| re.is_match(key.name()) || re.is_match(key.canonical()))
    }

    /// Drop every batch whose key is not selected
    pub fn narrow(&self, plan: Plan) -> Plan {
        if self.is_empty() {
            return plan;
        }
        let selected: Vec<String> = plan
            .batches()
            .iter()
            .filter(|batch| self.matches(&batch.key))
            .map(|batch| batch.key.canonical().to_string())
            .collect();
        if selected.is_empty() {
            log::warn!("--limit matched no planned resources");
            return Plan::default();
        }
        plan.limit(selected.as_slice())
    }

    /// Desired resources the filter selects
    pub fn select(&self, resources: &[DesiredResource]) -> Vec<DesiredResource> {
        resources
            .iter()
            .filter(|r| self.matches(&r.key))
            .cloned()
            .collect()
    }
}

// ============================================================================
// Display
// ============================================================================

/// Print a plan grouped by resource
pub fn display_plan(kind: &dyn ResourceKind, plan: &Plan, show_commands: bool) {
    if plan.is_empty() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        format!("Plan: {}", kind.name()).bold()
    );
    println!("│");
    for batch in plan.batches() {
        println!("│ {} {}", kind.key_field().dimmed(), batch.key.to_string().bold());
        for op in &batch.operations {
            ui::operation(kind, op, show_commands);
        }
        println!("│");
    }
    println!("├─────────────────────────────────────────────────────┤");
    println!("│ Summary: {}", summary_line(&plan.summary()));
    println!("└─────────────────────────────────────────────────────┘");
}

/// "2 to create, 1 to update, ..." with zero counts omitted
pub fn summary_line(summary: &PlanSummary) -> String {
    let parts: Vec<String> = [
        (summary.creates, "to create"),
        (summary.updates, "to update"),
        (summary.associations, "membership change(s)"),
        (summary.deletes, "to delete"),
    ]
    .iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{} {label}", count.to_string().bold()))
    .collect();

    if parts.is_empty() {
        "no changes".to_string()
    } else {
        parts.join(", ")
    }
}

// ============================================================================
// Tests
// ============================================================================
