//! Want-vs-have diff
//!
//! Pure computation of the operations that converge observed state to
//! desired state. No I/O happens here.
//!
//! Ordering:
//! - resources are visited in desired order
//! - within a resource, create or attribute sets come before association
//!   changes, adds before removes, members in sorted order
//! - every delete (explicit `absent` entries, then purge) comes after all
//!   creates and updates

use crate::error::{Error, Result};
use crate::purge::PurgePolicy;
use crate::types::{DesiredResource, ObservedResource, Operation, ResourceKey};
use log::debug;
use std::collections::{HashMap, HashSet};

/// Compute the ordered operation list converging `have` to `want`
///
/// Fails with a validation error if either side holds a key twice.
pub fn diff(
    want: &[DesiredResource],
    have: &[ObservedResource],
    purge: &PurgePolicy,
) -> Result<Vec<Operation>> {
    ensure_unique("desired", want.iter().map(|r| &r.key))?;
    ensure_unique("observed", have.iter().map(|r| &r.key))?;

    let index: HashMap<&ResourceKey, &ObservedResource> =
        have.iter().map(|r| (&r.key, r)).collect();

    let mut operations = Vec::new();
    let mut deletes = Vec::new();

    for desired in want {
        let observed = index.get(&desired.key).copied();
        if desired.is_present() {
            operations.extend(resource_operations(desired, observed));
        } else if observed.is_some() {
            debug!("{}: declared absent, deleting", desired.key);
            deletes.push(Operation::delete(desired.key.clone()));
        }
    }

    deletes.extend(purge.deletions(want, have));
    operations.extend(deletes);

    Ok(operations)
}

/// Operations converging a single resource
///
/// Deletes for `absent` entries are included so the result is empty exactly
/// when this resource has converged.
pub fn resource_operations(
    desired: &DesiredResource,
    observed: Option<&ObservedResource>,
) -> Vec<Operation> {
    let key = &desired.key;

    if !desired.is_present() {
        return observed
            .map(|_| vec![Operation::delete(key.clone())])
            .unwrap_or_default();
    }

    let Some(observed) = observed else {
        debug!("{key}: not observed, creating");
        let mut ops = vec![Operation::create(key.clone(), desired.attributes.clone())];
        if let Some(members) = &desired.associations {
            ops.extend(members.iter().map(|m| Operation::add(key.clone(), m.clone())));
        }
        return ops;
    };

    let mut ops = Vec::new();

    for (name, value) in &desired.attributes {
        let current = observed.attribute(name);
        if !current.matches(value) {
            debug!("{key}: {name} is {current:?}, want {value:?}");
            ops.push(Operation::set(key.clone(), name.clone(), value.clone()));
        }
    }

    // Omitted membership is left alone
    if let Some(members) = &desired.associations {
        ops.extend(
            members
                .difference(&observed.associations)
                .map(|m| Operation::add(key.clone(), m.clone())),
        );
        ops.extend(
            observed
                .associations
                .difference(members)
                .map(|m| Operation::remove(key.clone(), m.clone())),
        );
    }

    ops
}

fn ensure_unique<'a>(side: &str, keys: impl Iterator<Item = &'a ResourceKey>) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key) {
            return Err(Error::validation(
                key.to_string(),
                format!("duplicate key in {side} state"),
            ));
        }
    }
    Ok(())
}
