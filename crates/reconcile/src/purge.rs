//! Purge policy
//!
//! Decides which observed resources are deleted because the desired set does
//! not mention them, and guards the keys the external system owns.

use crate::kind::ResourceKind;
use crate::types::{DesiredResource, ObservedResource, Operation, ResourceKey};
use log::debug;
use std::collections::{BTreeSet, HashSet};

/// Whether undeclared resources are deleted, and which keys are untouchable
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgePolicy {
    enabled: bool,
    reserved: BTreeSet<String>,
}

impl PurgePolicy {
    /// Purge nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Purge every undeclared resource except the reserved canonical keys
    pub fn enabled<I, S>(reserved: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            reserved: reserved.into_iter().map(Into::into).collect(),
        }
    }

    /// Build the policy for a kind, canonicalizing its reserved keys
    ///
    /// The guard list is kept even when purge is off so callers can still
    /// ask whether a key is reserved.
    pub fn for_kind(enabled: bool, kind: &dyn ResourceKind) -> Self {
        let reserved = kind
            .reserved_keys()
            .into_iter()
            .map(|raw| {
                kind.canonical_key(&raw)
                    .map_or(raw, |key| key.canonical().to_string())
            })
            .collect();
        Self { enabled, reserved }
    }

    /// Check if purge is on
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Check if a key is owned by the external system
    pub fn is_reserved(&self, key: &ResourceKey) -> bool {
        self.reserved.contains(key.canonical())
    }

    /// Reserved canonical keys
    pub fn reserved(&self) -> impl Iterator<Item = &str> {
        self.reserved.iter().map(String::as_str)
    }

    /// Delete operations for observed resources with no desired entry
    ///
    /// Emitted in observed order. Empty when purge is disabled.
    pub fn deletions(&self, want: &[DesiredResource], have: &[ObservedResource]) -> Vec<Operation> {
        if !self.enabled {
            return Vec::new();
        }

        let declared: HashSet<&ResourceKey> = want.iter().map(|r| &r.key).collect();
        have.iter()
            .filter(|observed| !declared.contains(&observed.key))
            .filter(|observed| {
                let reserved = self.is_reserved(&observed.key);
                if reserved {
                    debug!("purge: keeping reserved {}", observed.key);
                }
                !reserved
            })
            .map(|observed| Operation::delete(observed.key.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn have(keys: &[&str]) -> Vec<ObservedResource> {
        keys.iter()
            .map(|k| ObservedResource::new(ResourceKey::verbatim(*k)))
            .collect()
    }

    #[test]
    fn test_disabled_never_deletes() {
        let ops = PurgePolicy::disabled().deletions(&[], &have(&["10", "20"]));
        assert!(ops.is_empty());
    }

    #[test]
    fn test_deletes_undeclared_in_observed_order() {
        let want = vec![DesiredResource::new(ResourceKey::verbatim("20"))];
        let ops = PurgePolicy::enabled(Vec::<String>::new())
            .deletions(&want, &have(&["30", "20", "10"]));

        assert_eq!(
            ops,
            vec![
                Operation::delete(ResourceKey::verbatim("30")),
                Operation::delete(ResourceKey::verbatim("10")),
            ]
        );
    }

    #[test]
    fn test_reserved_keys_survive_purge() {
        let policy = PurgePolicy::enabled(["1"]);
        let ops = policy.deletions(&[], &have(&["1", "10"]));

        assert_eq!(ops, vec![Operation::delete(ResourceKey::verbatim("10"))]);
        assert!(policy.is_reserved(&ResourceKey::verbatim("1")));
    }

    #[test]
    fn test_reserved_match_uses_canonical_form() {
        let policy = PurgePolicy::enabled(["management"]);
        let observed = vec![ObservedResource::new(ResourceKey::new(
            "Management",
            "management",
        ))];

        assert!(policy.deletions(&[], &observed).is_empty());
    }
}
