//! Machine-readable run result
//!
//! Shaped like a configuration-management module result: `changed`, the
//! device `commands` that were (or would be) sent, the structured
//! `operations`, per-resource `errors`, and `warnings`.

use chrono::{DateTime, Utc};
use reconcile::{ExecutionReport, Operation, PlanSummary, ResourceError, ResourceKind};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct RunResult {
    pub kind: String,
    pub changed: bool,
    pub check_mode: bool,
    pub commands: Vec<String>,
    pub operations: Vec<Operation>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<Operation>,
    pub errors: BTreeMap<String, ResourceError>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assigned_ids: BTreeMap<String, String>,
    pub warnings: Vec<String>,
    pub summary: PlanSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_attempts: Option<usize>,
    pub timestamp: DateTime<Utc>,
}

impl RunResult {
    /// Build from an execution report
    pub fn from_report(
        kind: &dyn ResourceKind,
        summary: PlanSummary,
        report: &ExecutionReport,
    ) -> Self {
        Self {
            kind: kind.name().to_string(),
            changed: report.changed,
            check_mode: report.dry_run,
            commands: commands(kind, &report.applied),
            operations: report.applied.clone(),
            skipped: report.skipped.clone(),
            errors: report
                .errors
                .iter()
                .map(|(key, error)| (key.to_string(), error.clone()))
                .collect(),
            assigned_ids: report
                .assigned_ids
                .iter()
                .map(|(key, id)| (key.to_string(), id.clone()))
                .collect(),
            warnings: report.warnings.clone(),
            summary,
            verify_attempts: None,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Device command lines for a list of operations, in order
pub fn commands<'a, I>(kind: &dyn ResourceKind, operations: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Operation>,
{
    operations
        .into_iter()
        .flat_map(|op| kind.render(op))
        .collect()
}
