//! # Producer Results and Staged Updates
//!
//! A producer settles with a [`Resolved`]: either a direct value, a staged
//! update that writes one or more times through an [`Apply`] handle, or
//! nothing at all (a contract violation).
//!
//! ## Staged Update Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Staged Update Flow                               │
//! │                                                                         │
//! │  producer ──► Resolved::Staged(update)                                 │
//! │                        │                                                │
//! │                        ▼                                                │
//! │  engine   ──► update.run(Apply bound to invocation #n)                 │
//! │                        │                                                │
//! │          ┌─────────────┴──────────────┐                                 │
//! │          ▼                            ▼                                 │
//! │   apply.set(initial)          (later, any task)                        │
//! │                               apply.update(|prev| refine(prev))        │
//! │                                                                         │
//! │  Every call re-checks "is #n still current?" and silently drops the    │
//! │  write when it is not. Updaters see the value committed most recently, │
//! │  not a snapshot taken when the producer settled.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

// =============================================================================
// Update
// =============================================================================

/// A single write issued through [`Apply`].
pub enum Update<T> {
    /// Replace the value outright.
    Replace(T),
    /// Derive the next value from the current one.
    With(Box<dyn FnOnce(&T) -> T + Send>),
}

impl<T> Update<T> {
    /// Computes the next value from `prev`.
    pub fn apply_to(self, prev: &T) -> T {
        match self {
            Update::Replace(value) => value,
            Update::With(update) => update(prev),
        }
    }
}

impl<T> fmt::Debug for Update<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Update::Replace(_) => f.write_str("Update::Replace(..)"),
            Update::With(_) => f.write_str("Update::With(..)"),
        }
    }
}

// =============================================================================
// Apply Handle
// =============================================================================

/// Sink behind an [`Apply`] handle, implemented by the engine.
pub trait Applier<T>: Send + Sync {
    /// Applies `update` if the owning invocation is still current.
    ///
    /// Returns true if state changed.
    fn apply(&self, update: Update<T>) -> bool;

    /// Returns true while the owning invocation may still write.
    fn is_current(&self) -> bool;
}

/// Handle given to a [`StagedUpdate`]. Cloneable and `Send`, so it can be
/// moved into follow-up tasks.
pub struct Apply<T> {
    inner: Arc<dyn Applier<T>>,
}

impl<T> Apply<T> {
    /// Wraps an engine-side sink.
    pub fn new(inner: Arc<dyn Applier<T>>) -> Self {
        Apply { inner }
    }

    /// Replaces the value. Returns false if the write was dropped as stale.
    pub fn set(&self, value: T) -> bool {
        self.inner.apply(Update::Replace(value))
    }

    /// Derives the next value from the current one.
    ///
    /// `update` runs while the state is locked and must not call back into
    /// the synchronizer.
    pub fn update<F>(&self, update: F) -> bool
    where
        F: FnOnce(&T) -> T + Send + 'static,
    {
        self.inner.apply(Update::With(Box::new(update)))
    }

    /// Returns true while writes through this handle can still land.
    pub fn is_current(&self) -> bool {
        self.inner.is_current()
    }
}

impl<T> Clone for Apply<T> {
    fn clone(&self) -> Self {
        Apply {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Apply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Apply")
            .field("current", &self.is_current())
            .finish()
    }
}

// =============================================================================
// Staged Update
// =============================================================================

/// Deferred mutation returned by a producer instead of a value.
pub struct StagedUpdate<T> {
    run: Box<dyn FnOnce(Apply<T>) + Send>,
}

impl<T> StagedUpdate<T> {
    /// Wraps the callback that will receive the [`Apply`] handle.
    pub fn new<F>(run: F) -> Self
    where
        F: FnOnce(Apply<T>) + Send + 'static,
    {
        StagedUpdate { run: Box::new(run) }
    }

    /// Hands `apply` to the callback.
    pub fn run(self, apply: Apply<T>) {
        (self.run)(apply)
    }
}

impl<T> fmt::Debug for StagedUpdate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StagedUpdate(..)")
    }
}

// =============================================================================
// Resolved
// =============================================================================

/// What a producer settled with.
#[derive(Debug)]
pub enum Resolved<T> {
    /// Commit this value.
    Value(T),
    /// Run this update against the live state.
    Staged(StagedUpdate<T>),
    /// No value. Never committed.
    Missing,
}

impl<T> Resolved<T> {
    /// Shorthand for [`Resolved::Staged`].
    pub fn staged<F>(run: F) -> Self
    where
        F: FnOnce(Apply<T>) + Send + 'static,
    {
        Resolved::Staged(StagedUpdate::new(run))
    }

    /// Maps `None` to [`Resolved::Missing`].
    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(value) => Resolved::Value(value),
            None => Resolved::Missing,
        }
    }

    /// Short name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Resolved::Value(_) => "value",
            Resolved::Staged(_) => "staged",
            Resolved::Missing => "missing",
        }
    }
}

impl<T> From<T> for Resolved<T> {
    fn from(value: T) -> Self {
        Resolved::Value(value)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Applier writing into a plain mutex, with a switch to go stale.
    struct TestApplier {
        value: Mutex<String>,
        current: AtomicBool,
    }

    impl Applier<String> for TestApplier {
        fn apply(&self, update: Update<String>) -> bool {
            if !self.is_current() {
                return false;
            }
            let mut value = self.value.lock().unwrap();
            *value = update.apply_to(&value);
            true
        }

        fn is_current(&self) -> bool {
            self.current.load(Ordering::SeqCst)
        }
    }

    fn applier() -> Arc<TestApplier> {
        Arc::new(TestApplier {
            value: Mutex::new(String::new()),
            current: AtomicBool::new(true),
        })
    }

    #[test]
    fn test_update_apply_to() {
        assert_eq!(Update::Replace(3).apply_to(&1), 3);
        assert_eq!(Update::With(Box::new(|prev: &i32| prev + 1)).apply_to(&1), 2);
    }

    #[test]
    fn test_staged_update_writes_through_apply() {
        let sink = applier();
        let staged = StagedUpdate::new(|apply: Apply<String>| {
            apply.set("partial".to_string());
            apply.update(|prev| format!("{prev}-final"));
        });

        staged.run(Apply::new(sink.clone()));
        assert_eq!(*sink.value.lock().unwrap(), "partial-final");
    }

    #[test]
    fn test_apply_drops_writes_once_stale() {
        let sink = applier();
        let apply = Apply::new(sink.clone() as Arc<dyn Applier<String>>);

        assert!(apply.set("a".to_string()));
        sink.current.store(false, Ordering::SeqCst);
        assert!(!apply.is_current());
        assert!(!apply.set("b".to_string()));
        assert_eq!(*sink.value.lock().unwrap(), "a");
    }

    #[test]
    fn test_resolved_from_option() {
        assert!(matches!(Resolved::from_option(Some(1)), Resolved::Value(1)));
        assert!(matches!(Resolved::<i32>::from_option(None), Resolved::Missing));
    }

    #[test]
    fn test_resolved_kind() {
        assert_eq!(Resolved::from(1).kind(), "value");
        assert_eq!(Resolved::<i32>::Missing.kind(), "missing");
        assert_eq!(Resolved::staged(|_apply: Apply<i32>| {}).kind(), "staged");
    }
}
