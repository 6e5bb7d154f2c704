//! # Reconcile
//!
//! Declarative convergence: compare the resources a caller wants with the
//! resources an external system reports, and compute the minimal operations
//! that make the two match.
//!
//! ## Core Concepts
//!
//! - **DesiredResource / ObservedResource**: the two sides of a diff, keyed by
//!   a [`ResourceKey`] that carries both a verbatim and a canonical form
//! - **Operation**: one atomic imperative action (create, delete, set an
//!   attribute, add or remove an association)
//! - **Differ**: [`diff`] is a pure function of `(want, have, purge)`
//! - **Plan / Executor**: operations grouped per resource and applied in
//!   order, or previewed in check mode
//! - **Verifier**: optional post-apply polling until the diff is empty
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{diff, execute, Document, ExecuteOptions, Plan, PurgePolicy};
//!
//! let desired = Document::load(path)?.resolve(&vlan_kind)?;
//! let purge = PurgePolicy::for_kind(desired.purge, &vlan_kind);
//! let have = device.observe(&Scope::All)?;
//!
//! let plan = Plan::new(diff(&desired.resources, &have, &purge)?);
//! let opts = ExecuteOptions::default();
//! let report = execute(&plan, &opts, &mut device, &mut NoProgress, &mut AutoConfirm)?;
//! ```
//!
//! ## Collaborator Traits
//!
//! - [`StateObserver`]: queries the external system
//! - [`Applier`]: performs one operation
//! - [`ProgressCallback`]: receives per-operation progress
//! - [`ConfirmCallback`]: handles user confirmation
//! - [`ResourceKind`]: normalization, validation and rendering for one
//!   family of resources
//!
//! Re-running the whole invocation is always safe: an already converged
//! system yields an empty plan.

pub mod context;
pub mod diff;
pub mod error;
pub mod executor;
pub mod kind;
pub mod loader;
pub mod planner;
pub mod purge;
pub mod types;
pub mod verify;

// Re-export main types at crate root
pub use context::{
    Applier, AutoConfirm, AutoDecline, ConfirmCallback, NoProgress, ProgressCallback, Scope,
    StateObserver,
};
pub use diff::{diff, resource_operations};
pub use error::{Error, ErrorKind, Result};
pub use executor::{ErrorPolicy, ExecuteOptions, ExecutionReport, ResourceError, execute};
pub use kind::{EmptyAssociations, ResourceKind, require_choice};
pub use loader::{DesiredSet, Document, Format};
pub use planner::{Plan, PlanSummary, ResourceBatch};
pub use purge::PurgePolicy;
pub use types::{
    ApplyResult, AttrValue, DesiredResource, DesiredState, ObservedResource, Operation,
    OperationKind, ResourceKey,
};
pub use verify::{Verified, VerifyOptions, verify};
