//! # Lazy Update Protocol
//!
//! Decides what a settled producer result does to the observable state.
//! Every branch re-checks that the invocation still holds the current term
//! before touching anything.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Settlement Routing                               │
//! │                                                                         │
//! │  Ok(Value(v))    ─► commit v, loaded=true, error=None                  │
//! │  Ok(Staged(f))   ─► error=None, then f(apply) outside the lock         │
//! │  Ok(Missing)     ─► log; Strict also records ContractViolation         │
//! │  Err(e)          ─► classify; reportable classes set error             │
//! │                                                                         │
//! │  Stale term at any point ─► dropped, state untouched                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, error, trace, warn};

use fetchstate_core::{
    Applier, Apply, Commit, ErrorClass, FetchError, InvocationId, Resolved, StagedUpdate, Update,
};

use crate::config::ContractPolicy;
use crate::controller::InvocationPhase;
use crate::producer::ProducerResult;
use crate::shared::{FetchValue, Shared};

/// Routes a settled result into the state.
///
/// Returns the value the invocation committed, if it is still current.
pub(crate) fn settle<T: FetchValue>(
    shared: &Arc<Shared<T>>,
    id: InvocationId,
    result: ProducerResult<T>,
) -> Option<T> {
    let kind = result.as_ref().map_or("rejected", Resolved::kind);
    debug!(label = %shared.label(), invocation = %id, kind, "Producer settled");

    match result {
        Ok(Resolved::Value(value)) => commit_value(shared, id, value),
        Ok(Resolved::Staged(update)) => run_staged(shared, id, update),
        Ok(Resolved::Missing) => missing_value(shared, id),
        Err(err) => reject(shared, id, err),
    }
}

fn commit_value<T: FetchValue>(shared: &Shared<T>, id: InvocationId, value: T) -> Option<T> {
    let mut inner = shared.inner.lock();

    match inner.container.commit(id, value) {
        Commit::Applied => {
            inner.phase = InvocationPhase::Completed;
            shared.publish(&inner);
            debug!(label = %shared.label(), invocation = %id, "Committed value");
            Some(inner.container.state().value.clone())
        }
        _ => {
            debug!(label = %shared.label(), invocation = %id, "Discarding stale value");
            None
        }
    }
}

fn missing_value<T: FetchValue>(shared: &Shared<T>, id: InvocationId) -> Option<T> {
    let mut inner = shared.inner.lock();

    if !inner.container.is_current(id) {
        return None;
    }
    inner.phase = InvocationPhase::Completed;

    error!(
        label = %shared.label(),
        invocation = %id,
        "Producer resolved without a value. Preventing setting."
    );

    // Strict promotes the violation to a reportable error.
    if shared.config.contract() == ContractPolicy::Strict {
        let commit = inner.container.commit_error(
            id,
            FetchError::ContractViolation,
            ErrorClass::Reportable,
        );
        if commit.is_applied() {
            shared.publish(&inner);
        }
    }

    None
}

fn reject<T: FetchValue>(shared: &Shared<T>, id: InvocationId, err: FetchError) -> Option<T> {
    let class = classify(shared, id, &err);
    let mut inner = shared.inner.lock();

    if !inner.container.is_current(id) {
        debug!(label = %shared.label(), invocation = %id, "Discarding stale rejection");
        return None;
    }
    inner.phase = InvocationPhase::Completed;

    if class.is_suppressed() {
        debug!(label = %shared.label(), invocation = %id, %class, error = %err, "Producer not settled");
    } else {
        warn!(label = %shared.label(), invocation = %id, %class, error = %err, "Producer rejected");
    }

    if inner.container.commit_error(id, err, class).is_applied() {
        shared.publish(&inner);
    }
    None
}

/// Runs the classifier. A panicking classifier counts the error as reportable.
fn classify<T: FetchValue>(shared: &Shared<T>, id: InvocationId, err: &FetchError) -> ErrorClass {
    std::panic::catch_unwind(AssertUnwindSafe(|| (shared.classifier)(err))).unwrap_or_else(|_| {
        error!(label = %shared.label(), invocation = %id, error = %err, "Error classifier panicked");
        ErrorClass::Reportable
    })
}

fn run_staged<T: FetchValue>(
    shared: &Arc<Shared<T>>,
    id: InvocationId,
    update: StagedUpdate<T>,
) -> Option<T> {
    {
        let mut inner = shared.inner.lock();
        let had_error = inner.container.state().has_error();

        if !inner.container.clear_error(id).is_applied() {
            debug!(label = %shared.label(), invocation = %id, "Discarding stale staged update");
            return None;
        }
        inner.phase = InvocationPhase::Completed;
        if had_error {
            shared.publish(&inner);
        }
    }

    let applier = Arc::new(TermApplier {
        shared: Arc::downgrade(shared),
        id,
        landed: AtomicBool::new(false),
    });

    // The callback may call back into the synchronizer, so the lock is released.
    update.run(Apply::new(applier.clone()));

    if !applier.landed.load(Ordering::SeqCst) {
        return None;
    }

    let inner = shared.inner.lock();
    inner
        .container
        .is_current(id)
        .then(|| inner.container.state().value.clone())
}

// =============================================================================
// Term Applier
// =============================================================================

/// [`Applier`] bound to one invocation term.
struct TermApplier<T> {
    shared: Weak<Shared<T>>,
    id: InvocationId,
    landed: AtomicBool,
}

impl<T: FetchValue> Applier<T> for TermApplier<T> {
    fn apply(&self, update: Update<T>) -> bool {
        let Some(shared) = self.shared.upgrade() else {
            return false;
        };
        let mut inner = shared.inner.lock();

        let commit = inner
            .container
            .commit_with(self.id, |prev| update.apply_to(prev));

        if commit.is_applied() {
            shared.publish(&inner);
            self.landed.store(true, Ordering::SeqCst);
            trace!(label = %shared.label(), invocation = %self.id, "Applied staged write");
            true
        } else {
            debug!(label = %shared.label(), invocation = %self.id, "Dropping stale staged write");
            false
        }
    }

    fn is_current(&self) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.inner.lock().container.is_current(self.id))
    }
}
