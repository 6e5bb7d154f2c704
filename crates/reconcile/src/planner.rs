//! Execution planner - groups operations into per-resource batches

use crate::types::{Operation, OperationKind, ResourceKey};
use serde::Serialize;

/// Consecutive operations targeting one resource
///
/// A batch is the unit of fail-fast: once one of its operations is rejected,
/// the rest are skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceBatch {
    pub key: ResourceKey,
    pub operations: Vec<Operation>,
}

/// Ordered operations grouped by resource
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    batches: Vec<ResourceBatch>,
}

/// Counts of planned changes by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    /// Resources to create
    pub creates: usize,
    /// Attributes to set on existing resources
    pub updates: usize,
    /// Associations to add or remove
    pub associations: usize,
    /// Resources to delete
    pub deletes: usize,
}

impl PlanSummary {
    /// Total number of operations
    pub fn total(&self) -> usize {
        self.creates + self.updates + self.associations + self.deletes
    }

    /// Check if there are any changes
    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

impl Plan {
    /// Build a plan from the Differ's output, preserving order
    pub fn new(operations: Vec<Operation>) -> Self {
        let mut batches: Vec<ResourceBatch> = Vec::new();
        for op in operations {
            match batches.last_mut() {
                Some(batch) if batch.key == op.key => batch.operations.push(op),
                _ => batches.push(ResourceBatch {
                    key: op.key.clone(),
                    operations: vec![op],
                }),
            }
        }
        Self { batches }
    }

    /// Per-resource batches in execution order
    pub fn batches(&self) -> &[ResourceBatch] {
        &self.batches
    }

    /// All operations in execution order
    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        self.batches.iter().flat_map(|b| b.operations.iter())
    }

    /// Total number of operations in the plan
    pub fn len(&self) -> usize {
        self.batches.iter().map(|b| b.operations.len()).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Count operations by kind
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for op in self.operations() {
            if op.kind.is_association() {
                summary.associations += 1;
                continue;
            }
            match op.kind {
                OperationKind::CreateResource { .. } => summary.creates += 1,
                OperationKind::DeleteResource => summary.deletes += 1,
                _ => summary.updates += 1,
            }
        }
        summary
    }

    /// Keep only batches whose key matches one of the selectors
    ///
    /// An empty selector list keeps everything.
    pub fn limit<S: AsRef<str>>(self, selectors: &[S]) -> Self {
        if selectors.is_empty() {
            return self;
        }
        Self {
            batches: self
                .batches
                .into_iter()
                .filter(|b| selectors.iter().any(|s| b.key.matches(s.as_ref())))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn key(k: &str) -> ResourceKey {
        ResourceKey::verbatim(k)
    }

    fn sample() -> Plan {
        Plan::new(vec![
            Operation::create(key("100"), BTreeMap::new()),
            Operation::add(key("100"), "eth0"),
            Operation::set(key("200"), "name", "db"),
            Operation::remove(key("200"), "eth2"),
            Operation::delete(key("300")),
        ])
    }

    #[test]
    fn test_groups_consecutive_operations() {
        let plan = sample();
        let keys: Vec<&str> = plan.batches().iter().map(|b| b.key.name()).collect();

        assert_eq!(keys, vec!["100", "200", "300"]);
        assert_eq!(plan.batches()[0].operations.len(), 2);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_summary_counts() {
        let summary = sample().summary();
        assert_eq!(
            summary,
            PlanSummary {
                creates: 1,
                updates: 1,
                associations: 2,
                deletes: 1,
            }
        );
        assert_eq!(summary.total(), 5);
        assert!(summary.has_changes());
    }

    #[test]
    fn test_limit_selects_keys() {
        let plan = sample().limit(&["200"]);
        assert_eq!(plan.len(), 2);
        assert!(plan.operations().all(|op| op.key == key("200")));

        let plan = sample().limit::<&str>(&[]);
        assert_eq!(plan.len(), 5);
    }

    #[test]
    fn test_empty_plan() {
        let plan = Plan::new(Vec::new());
        assert!(plan.is_empty());
        assert!(!plan.summary().has_changes());
        assert_eq!(plan.len(), 0);
    }
}
