//! Collaborator traits
//!
//! The engine never talks to a device directly. The calling environment
//! supplies an observer, an applier, and optional progress and confirmation
//! hooks; these traits are the whole contract.

use crate::error::Result;
use crate::types::{ApplyResult, ObservedResource, Operation, ResourceKey};
use std::thread;
use std::time::{Duration, Instant};

/// Which part of the external collection to query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Every resource of the kind
    All,
    /// Only the listed keys
    Keys(Vec<ResourceKey>),
}

impl Scope {
    /// Scope covering the given keys
    pub fn keys<I: IntoIterator<Item = ResourceKey>>(keys: I) -> Self {
        Self::Keys(keys.into_iter().collect())
    }

    /// Check if a key falls inside this scope
    pub fn includes(&self, key: &ResourceKey) -> bool {
        match self {
            Self::All => true,
            Self::Keys(keys) => keys.contains(key),
        }
    }
}

/// Query side of the external resource API
pub trait StateObserver {
    /// Fetch the current state of every resource in `scope`
    ///
    /// A key that does not exist is simply missing from the result; that is
    /// not an error.
    fn observe(&self, scope: &Scope) -> Result<Vec<ObservedResource>>;

    /// Poll one resource until `predicate` holds or `timeout` elapses
    ///
    /// The predicate receives `None` while the resource does not exist.
    /// Always observes at least once, even with a zero timeout.
    fn wait(
        &self,
        key: &ResourceKey,
        predicate: &dyn Fn(Option<&ObservedResource>) -> bool,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<bool> {
        let started = Instant::now();
        let scope = Scope::keys([key.clone()]);

        loop {
            let observed = self.observe(&scope)?;
            if predicate(observed.iter().find(|r| &r.key == key)) {
                return Ok(true);
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Ok(false);
            }
            thread::sleep(poll_interval.min(timeout - elapsed));
        }
    }
}

/// Mutation side of the external resource API
pub trait Applier {
    /// Perform one operation
    ///
    /// Returns the identifier assigned by the external system, if it
    /// generates one (typically only for creates).
    fn apply(&mut self, operation: &Operation) -> Result<Option<String>>;
}

/// Progress callback for execution operations
///
/// Implement this trait to receive progress updates during execution.
pub trait ProgressCallback {
    /// Called once before the first operation
    fn on_batch_start(&mut self, total: usize);

    /// Called when an operation is about to be dispatched
    fn on_operation_start(&mut self, operation: &Operation);

    /// Called when an operation was applied, rejected or skipped
    fn on_operation_complete(&mut self, operation: &Operation, result: &ApplyResult);

    /// Called after the last operation
    fn on_batch_complete(&mut self);
}

/// Confirmation callback for user interaction
pub trait ConfirmCallback {
    /// Ask the user to confirm an action
    fn confirm(&mut self, prompt: &str) -> anyhow::Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _total: usize) {}
    fn on_operation_start(&mut self, _operation: &Operation) {}
    fn on_operation_complete(&mut self, _operation: &Operation, _result: &ApplyResult) {}
    fn on_batch_complete(&mut self) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> anyhow::Result<bool> {
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    /// Observer whose resource appears after a number of polls
    struct Delayed {
        appears_after: usize,
        polls: Cell<usize>,
    }

    impl StateObserver for Delayed {
        fn observe(&self, scope: &Scope) -> Result<Vec<ObservedResource>> {
            let polls = self.polls.get() + 1;
            self.polls.set(polls);

            let key = ResourceKey::verbatim("100");
            if polls > self.appears_after && scope.includes(&key) {
                Ok(vec![ObservedResource::new(key)])
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn test_scope_includes() {
        let key = ResourceKey::verbatim("100");
        assert!(Scope::All.includes(&key));
        assert!(Scope::keys([key.clone()]).includes(&key));
        assert!(!Scope::keys([ResourceKey::verbatim("200")]).includes(&key));
    }

    #[test]
    fn test_wait_polls_until_predicate_holds() {
        let observer = Delayed {
            appears_after: 2,
            polls: Cell::new(0),
        };

        let found = observer
            .wait(
                &ResourceKey::verbatim("100"),
                &|r| r.is_some(),
                Duration::ZERO,
                Duration::from_secs(5),
            )
            .unwrap();

        assert!(found);
        assert_eq!(observer.polls.get(), 3);
    }

    #[test]
    fn test_wait_observes_once_with_zero_timeout() {
        let observer = Delayed {
            appears_after: 10,
            polls: Cell::new(0),
        };

        let found = observer
            .wait(
                &ResourceKey::verbatim("100"),
                &|r| r.is_some(),
                Duration::ZERO,
                Duration::ZERO,
            )
            .unwrap();

        assert!(!found);
        assert_eq!(observer.polls.get(), 1);
    }

    #[test]
    fn test_auto_callbacks() {
        assert!(AutoConfirm.confirm("go?").unwrap());
        assert!(!AutoDecline.confirm("go?").unwrap());
    }
}
