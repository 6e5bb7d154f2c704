//! Execution engine - applies a plan sequentially with per-resource fail-fast
//!
//! Operations are dispatched one at a time in plan order. Nothing is rolled
//! back: a create followed by attribute sets is not atomic, so a rejection
//! mid-batch leaves the resource partially configured. Re-running the diff
//! against freshly observed state computes what remains.

use crate::context::{Applier, ConfirmCallback, ProgressCallback};
use crate::error::{Error, ErrorKind, Result};
use crate::planner::Plan;
use crate::types::{ApplyResult, Operation, OperationKind, ResourceKey};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// What happens to the rest of the plan after a rejected operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// Skip the failed resource's remaining operations, continue with others
    #[default]
    Isolate,
    /// Stop at the first error and skip everything after it
    FailFast,
}

/// Options for plan execution
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    /// Preview only; the applier is never called
    pub dry_run: bool,
    /// Behavior after a rejected operation
    pub error_policy: ErrorPolicy,
}

/// Structured error entry for one resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceError {
    pub kind: ErrorKind,
    /// Operation that failed, if the error came from one
    pub operation: Option<Operation>,
    pub message: String,
    /// Whether re-running the invocation may succeed
    pub retryable: bool,
}

impl ResourceError {
    /// Build an entry from an error raised while applying `operation`
    pub fn from_apply(operation: &Operation, error: &Error) -> Self {
        Self {
            kind: error.kind(),
            operation: Some(operation.clone()),
            message: error.to_string(),
            retryable: error.kind().is_retryable(),
        }
    }
}

/// Result of executing a plan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionReport {
    /// Whether the external system was (or in check mode, would be) changed
    pub changed: bool,
    /// Whether this was a check-mode run
    pub dry_run: bool,
    /// Operations accepted, in order; in check mode the full plan
    pub applied: Vec<Operation>,
    /// Operations not attempted
    pub skipped: Vec<Operation>,
    /// First error per resource
    pub errors: BTreeMap<ResourceKey, ResourceError>,
    /// Identifiers returned by creates
    pub assigned_ids: BTreeMap<ResourceKey, String>,
    /// Non-fatal problems, such as slow convergence
    pub warnings: Vec<String>,
}

impl ExecutionReport {
    /// Check if every attempted operation succeeded
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Total number of operations accounted for
    pub fn total(&self) -> usize {
        self.applied.len() + self.skipped.len() + self.errors.len()
    }
}

/// Execute a plan with the given options and callbacks
///
/// In check mode the applier is never invoked and the report carries the
/// plan unchanged. Otherwise the confirm callback is asked once; declining
/// skips every operation.
pub fn execute<P, C>(
    plan: &Plan,
    opts: &ExecuteOptions,
    applier: &mut dyn Applier,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecutionReport>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    if plan.is_empty() {
        return Ok(ExecutionReport {
            dry_run: opts.dry_run,
            ..Default::default()
        });
    }

    if opts.dry_run {
        return Ok(ExecutionReport {
            changed: true,
            dry_run: true,
            applied: plan.operations().cloned().collect(),
            ..Default::default()
        });
    }

    let prompt = format!(
        "Apply {} operation(s) to {} resource(s)?",
        plan.len(),
        plan.batches().len()
    );
    if !confirm.confirm(&prompt)? {
        return Ok(ExecutionReport {
            skipped: plan.operations().cloned().collect(),
            ..Default::default()
        });
    }

    let mut report = ExecutionReport::default();
    let mut failed: HashSet<ResourceKey> = HashSet::new();
    let mut halted = false;

    progress.on_batch_start(plan.len());

    for batch in plan.batches() {
        for op in &batch.operations {
            if halted || failed.contains(&op.key) {
                skip(op, halted, &mut report, progress);
                continue;
            }

            progress.on_operation_start(op);
            match applier.apply(op) {
                Ok(assigned) => {
                    info!("applied: {op}");
                    if let Some(id) = &assigned
                        && matches!(op.kind, OperationKind::CreateResource { .. })
                    {
                        report.assigned_ids.insert(op.key.clone(), id.clone());
                    }
                    progress.on_operation_complete(
                        op,
                        &ApplyResult::Applied {
                            assigned_id: assigned,
                        },
                    );
                    report.applied.push(op.clone());
                }
                Err(e) => {
                    warn!("{}: {e}", op.key);
                    progress.on_operation_complete(
                        op,
                        &ApplyResult::Failed {
                            error: e.to_string(),
                        },
                    );
                    report
                        .errors
                        .entry(op.key.clone())
                        .or_insert_with(|| ResourceError::from_apply(op, &e));
                    failed.insert(op.key.clone());
                    if opts.error_policy == ErrorPolicy::FailFast {
                        halted = true;
                    }
                }
            }
        }
    }

    progress.on_batch_complete();

    report.changed = !report.applied.is_empty();
    Ok(report)
}

fn skip<P: ProgressCallback>(
    op: &Operation,
    halted: bool,
    report: &mut ExecutionReport,
    progress: &mut P,
) {
    let reason = if halted {
        "stopped after earlier error".to_string()
    } else {
        format!("earlier operation on {} failed", op.key)
    };
    progress.on_operation_complete(op, &ApplyResult::Skipped { reason });
    report.skipped.push(op.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, NoProgress};
    use std::collections::BTreeMap;

    /// Applier that records calls and rejects configured operations
    #[derive(Default)]
    struct Recorder {
        calls: Vec<Operation>,
        reject: Vec<Operation>,
    }

    impl Applier for Recorder {
        fn apply(&mut self, operation: &Operation) -> Result<Option<String>> {
            self.calls.push(operation.clone());
            if self.reject.contains(operation) {
                return Err(Error::Apply {
                    key: operation.key.to_string(),
                    operation: operation.kind.label().to_string(),
                    detail: "device said no".to_string(),
                });
            }
            match operation.kind {
                OperationKind::CreateResource { .. } => {
                    Ok(Some(format!("id-{}", operation.key.canonical())))
                }
                _ => Ok(None),
            }
        }
    }

    /// Progress callback that counts events
    #[derive(Default)]
    struct Counter {
        started: usize,
        completed: usize,
        skipped: usize,
    }

    impl ProgressCallback for Counter {
        fn on_batch_start(&mut self, _total: usize) {}

        fn on_operation_start(&mut self, _operation: &Operation) {
            self.started += 1;
        }

        fn on_operation_complete(&mut self, _operation: &Operation, result: &ApplyResult) {
            self.completed += 1;
            if matches!(result, ApplyResult::Skipped { .. }) {
                self.skipped += 1;
            }
        }

        fn on_batch_complete(&mut self) {}
    }

    fn key(k: &str) -> ResourceKey {
        ResourceKey::verbatim(k)
    }

    fn two_resources() -> Vec<Operation> {
        vec![
            Operation::create(key("100"), BTreeMap::new()),
            Operation::add(key("100"), "eth0"),
            Operation::set(key("200"), "name", "db"),
            Operation::add(key("200"), "eth2"),
        ]
    }

    #[test]
    fn test_execute_empty_plan() {
        let mut applier = Recorder::default();
        let report = execute(
            &Plan::default(),
            &ExecuteOptions::default(),
            &mut applier,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert!(!report.changed);
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_dry_run_never_applies() {
        let ops = two_resources();
        let mut applier = Recorder::default();
        let opts = ExecuteOptions {
            dry_run: true,
            ..Default::default()
        };

        let report = execute(
            &Plan::new(ops.clone()),
            &opts,
            &mut applier,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert!(report.changed);
        assert!(report.dry_run);
        assert_eq!(report.applied, ops);
        assert!(applier.calls.is_empty());
    }

    #[test]
    fn test_applies_in_order_and_records_ids() {
        let ops = two_resources();
        let mut applier = Recorder::default();

        let report = execute(
            &Plan::new(ops.clone()),
            &ExecuteOptions::default(),
            &mut applier,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert!(report.changed);
        assert!(report.is_success());
        assert_eq!(applier.calls, ops);
        assert_eq!(report.assigned_ids.get(&key("100")).unwrap(), "id-100");
        assert!(!report.assigned_ids.contains_key(&key("200")));
    }

    #[test]
    fn test_isolate_continues_with_other_resources() {
        let mut applier = Recorder {
            reject: vec![Operation::create(key("100"), BTreeMap::new())],
            ..Default::default()
        };
        let mut progress = Counter::default();

        let report = execute(
            &Plan::new(two_resources()),
            &ExecuteOptions::default(),
            &mut applier,
            &mut progress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert!(report.changed);
        assert_eq!(report.applied.len(), 2);
        assert_eq!(report.skipped, vec![Operation::add(key("100"), "eth0")]);

        let error = report.errors.get(&key("100")).unwrap();
        assert_eq!(error.kind, ErrorKind::Apply);
        assert_eq!(error.message, "create-resource on 100 rejected: device said no");
        assert_eq!(
            error.operation,
            Some(Operation::create(key("100"), BTreeMap::new()))
        );
        assert!(error.retryable);

        assert_eq!(progress.started, 3);
        assert_eq!(progress.completed, 4);
        assert_eq!(progress.skipped, 1);
    }

    #[test]
    fn test_fail_fast_stops_everything() {
        let mut applier = Recorder {
            reject: vec![Operation::add(key("100"), "eth0")],
            ..Default::default()
        };
        let opts = ExecuteOptions {
            error_policy: ErrorPolicy::FailFast,
            ..Default::default()
        };

        let report = execute(
            &Plan::new(two_resources()),
            &opts,
            &mut applier,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        assert_eq!(applier.calls.len(), 2);
        assert_eq!(report.applied.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.errors.len(), 1);
        assert!(report.changed);
    }

    #[test]
    fn test_declined_confirmation_skips_all() {
        let mut applier = Recorder::default();

        let report = execute(
            &Plan::new(two_resources()),
            &ExecuteOptions::default(),
            &mut applier,
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();

        assert!(!report.changed);
        assert_eq!(report.skipped.len(), 4);
        assert!(applier.calls.is_empty());
    }

    #[test]
    fn test_report_serializes_keys_as_names() {
        let mut applier = Recorder {
            reject: vec![Operation::set(key("200"), "name", "db")],
            ..Default::default()
        };

        let report = execute(
            &Plan::new(two_resources()),
            &ExecuteOptions::default(),
            &mut applier,
            &mut NoProgress,
            &mut AutoConfirm,
        )
        .unwrap();

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["errors"]["200"]["kind"], "apply");
        assert_eq!(json["assigned_ids"]["100"], "id-100");
    }

    #[test]
    fn test_error_policy_serde() {
        let policy: ErrorPolicy = serde_json::from_str("\"fail-fast\"").unwrap();
        assert_eq!(policy, ErrorPolicy::FailFast);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Isolate);
    }
}
