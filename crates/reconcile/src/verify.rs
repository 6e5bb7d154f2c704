//! Convergence verifier
//!
//! After apply, some systems take a while before the new state shows up.
//! The verifier waits an initial delay, then polls until the desired set no
//! longer diffs against what is observed, or the timeout elapses.

use crate::context::{Scope, StateObserver};
use crate::diff::{diff, resource_operations};
use crate::error::{Error, Result};
use crate::purge::PurgePolicy;
use crate::types::{DesiredResource, ObservedResource};
use log::{debug, warn};
use std::cell::Cell;
use std::thread;
use std::time::{Duration, Instant};

/// Timing for post-apply verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyOptions {
    /// Settle time before the first observation
    pub delay: Duration,
    /// Pause between observations
    pub poll_interval: Duration,
    /// Upper bound on polling, measured after the delay
    pub timeout: Duration,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Successful verification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verified {
    /// Number of observations made
    pub attempts: usize,
    /// Time spent, delay included
    pub elapsed: Duration,
}

/// Wait until observed state matches `want`
///
/// Only the desired keys are re-observed, unless purge is enabled, in which
/// case the whole collection is polled so leftover resources count as
/// divergence. Returns [`Error::ConvergenceTimeout`] with the residual
/// operations if the state still diverges when time runs out. Nothing is
/// retried or rolled back.
pub fn verify(
    want: &[DesiredResource],
    purge: &PurgePolicy,
    observer: &dyn StateObserver,
    opts: &VerifyOptions,
) -> Result<Verified> {
    let started = Instant::now();
    if !opts.delay.is_zero() {
        debug!("verify: settling for {:?}", opts.delay);
        thread::sleep(opts.delay);
    }

    let polling = Instant::now();
    let attempts = Cell::new(0usize);

    let scope = if purge.is_enabled() {
        Scope::All
    } else {
        Scope::keys(want.iter().map(|r| r.key.clone()))
    };

    let converged = if purge.is_enabled() {
        poll_collection(want, purge, observer, opts, polling, &attempts)?
    } else {
        poll_keys(want, observer, opts, polling, &attempts)?
    };

    if converged {
        return Ok(Verified {
            attempts: attempts.get(),
            elapsed: started.elapsed(),
        });
    }

    // One last look so the residual reflects the latest state
    let have = observer.observe(&scope)?;
    let residual = diff(want, &have, purge)?;
    if residual.is_empty() {
        return Ok(Verified {
            attempts: attempts.get() + 1,
            elapsed: started.elapsed(),
        });
    }

    warn!(
        "state did not converge, {} operation(s) outstanding",
        residual.len()
    );
    Err(Error::ConvergenceTimeout {
        waited: started.elapsed(),
        residual,
    })
}

fn poll_keys(
    want: &[DesiredResource],
    observer: &dyn StateObserver,
    opts: &VerifyOptions,
    polling: Instant,
    attempts: &Cell<usize>,
) -> Result<bool> {
    for desired in want {
        let remaining = opts.timeout.saturating_sub(polling.elapsed());
        let predicate = |observed: Option<&ObservedResource>| {
            attempts.set(attempts.get() + 1);
            resource_operations(desired, observed).is_empty()
        };

        if !observer.wait(&desired.key, &predicate, opts.poll_interval, remaining)? {
            debug!("verify: {} still diverges", desired.key);
            return Ok(false);
        }
    }
    Ok(true)
}

fn poll_collection(
    want: &[DesiredResource],
    purge: &PurgePolicy,
    observer: &dyn StateObserver,
    opts: &VerifyOptions,
    polling: Instant,
    attempts: &Cell<usize>,
) -> Result<bool> {
    loop {
        let have = observer.observe(&Scope::All)?;
        attempts.set(attempts.get() + 1);
        if diff(want, &have, purge)?.is_empty() {
            return Ok(true);
        }

        let elapsed = polling.elapsed();
        if elapsed >= opts.timeout {
            return Ok(false);
        }
        thread::sleep(opts.poll_interval.min(opts.timeout - elapsed));
    }
}
