//! # Observable State and Term-Gated Container
//!
//! [`StateContainer`] owns the observable [`FetchState`] and the single
//! "current" invocation term. Every mutation is tagged with the term of the
//! invocation that produced it and is dropped when that term is no longer
//! current.
//!
//! ## Fencing Terms
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Invocation Term Fencing                            │
//! │                                                                         │
//! │  begin() ─► #1 current                                                 │
//! │  begin() ─► #2 current, #1 stale                                       │
//! │                                                                         │
//! │  commit(#1, a)  ─► Stale      (state untouched)                        │
//! │  commit(#2, b)  ─► Applied    value=b, loaded=true, error=None         │
//! │                                                                         │
//! │  revoke(#2)     ─► no current term; every commit is Stale              │
//! │                                                                         │
//! │  reset()        ─► value=default, loaded=false, error=None,            │
//! │                    generation += 1 (terms are NOT affected)            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use crate::error::{ErrorClass, FetchError};

// =============================================================================
// Invocation Id
// =============================================================================

/// Identifies one call to a producer.
///
/// Ids are issued by [`StateContainer::begin`] in strictly increasing order,
/// so a larger id was always started later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InvocationId(u64);

impl InvocationId {
    /// Returns the raw term number.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Fetch State
// =============================================================================

/// Snapshot of the observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchState<T> {
    /// Last committed value, or the default.
    pub value: T,

    /// Whether a value has been committed in this generation.
    pub loaded: bool,

    /// Last reportable failure. Cleared by every successful commit.
    pub error: Option<FetchError>,

    /// Number of resets so far.
    pub generation: u64,
}

impl<T> FetchState<T> {
    /// Creates the initial state around a default value.
    pub fn new(default: T) -> Self {
        FetchState {
            value: default,
            loaded: false,
            error: None,
            generation: 0,
        }
    }

    /// Returns true if a reportable error is currently visible.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }
}

// =============================================================================
// Commit Result
// =============================================================================

/// Outcome of a gated mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commit {
    /// The mutation landed.
    Applied,
    /// The term was not current; nothing changed.
    Stale,
    /// The term was current but the error class is suppressed.
    Suppressed,
}

impl Commit {
    /// Returns true if state changed.
    pub fn is_applied(self) -> bool {
        matches!(self, Commit::Applied)
    }
}

// =============================================================================
// State Container
// =============================================================================

/// Owns the observable state and the current invocation term.
#[derive(Debug)]
pub struct StateContainer<T> {
    default: T,
    state: FetchState<T>,
    current: Option<InvocationId>,
    last_issued: u64,
}

impl<T: Clone> StateContainer<T> {
    /// Creates a container whose value starts at (and resets to) `default`.
    pub fn new(default: T) -> Self {
        StateContainer {
            state: FetchState::new(default.clone()),
            default,
            current: None,
            last_issued: 0,
        }
    }

    /// Borrows the current state.
    pub fn state(&self) -> &FetchState<T> {
        &self.state
    }

    /// Clones the current state.
    pub fn snapshot(&self) -> FetchState<T> {
        self.state.clone()
    }

    /// The term allowed to commit, if any.
    pub fn current(&self) -> Option<InvocationId> {
        self.current
    }

    /// Returns true if `id` may still commit.
    pub fn is_current(&self, id: InvocationId) -> bool {
        self.current == Some(id)
    }

    // =========================================================================
    // Term Management
    // =========================================================================

    /// Issues a fresh term and makes it current, invalidating the previous one.
    pub fn begin(&mut self) -> InvocationId {
        self.last_issued += 1;
        let id = InvocationId(self.last_issued);
        self.current = Some(id);
        id
    }

    /// Revokes `id` if it is current. Returns false if it already was stale.
    pub fn revoke(&mut self, id: InvocationId) -> bool {
        if self.is_current(id) {
            self.current = None;
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Gated Mutations
    // =========================================================================

    /// Commits a value: sets it, marks loaded, clears the error.
    pub fn commit(&mut self, id: InvocationId, value: T) -> Commit {
        if !self.is_current(id) {
            return Commit::Stale;
        }

        self.state.value = value;
        self.state.loaded = true;
        self.state.error = None;
        Commit::Applied
    }

    /// Commits the result of `update` applied to the current value.
    ///
    /// `update` only runs when `id` is current.
    pub fn commit_with<F>(&mut self, id: InvocationId, update: F) -> Commit
    where
        F: FnOnce(&T) -> T,
    {
        if !self.is_current(id) {
            return Commit::Stale;
        }

        let next = update(&self.state.value);
        self.commit(id, next)
    }

    /// Clears the visible error without touching value or loaded.
    pub fn clear_error(&mut self, id: InvocationId) -> Commit {
        if !self.is_current(id) {
            return Commit::Stale;
        }

        self.state.error = None;
        Commit::Applied
    }

    /// Records a failure. Value and loaded are left as last-known-good.
    pub fn commit_error(&mut self, id: InvocationId, error: FetchError, class: ErrorClass) -> Commit {
        if !self.is_current(id) {
            return Commit::Stale;
        }
        if class.is_suppressed() {
            return Commit::Suppressed;
        }

        self.state.error = Some(error);
        Commit::Applied
    }

    /// Restores the default value and starts a new generation.
    pub fn reset(&mut self) {
        self.state.value = self.default.clone();
        self.state.loaded = false;
        self.state.error = None;
        self.state.generation += 1;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let container = StateContainer::new(String::from("default"));
        let state = container.state();
        assert_eq!(state.value, "default");
        assert!(!state.loaded);
        assert!(state.error.is_none());
        assert_eq!(state.generation, 0);
        assert_eq!(container.current(), None);
    }

    #[test]
    fn test_begin_supersedes_previous_term() {
        let mut container = StateContainer::new(0);
        let first = container.begin();
        let second = container.begin();

        assert!(first < second);
        assert!(!container.is_current(first));
        assert!(container.is_current(second));

        assert_eq!(container.commit(first, 1), Commit::Stale);
        assert_eq!(container.commit(second, 2), Commit::Applied);
        assert_eq!(container.state().value, 2);
    }

    #[test]
    fn test_commit_clears_error() {
        let mut container = StateContainer::new(0);
        let id = container.begin();

        let err = FetchError::request("boom");
        assert_eq!(
            container.commit_error(id, err.clone(), err.class()),
            Commit::Applied
        );
        assert_eq!(container.state().error, Some(err));
        assert!(!container.state().loaded);

        container.commit(id, 7);
        assert!(container.state().error.is_none());
        assert!(container.state().loaded);
    }

    #[test]
    fn test_suppressed_error_is_ignored() {
        let mut container = StateContainer::new(0);
        let id = container.begin();
        container.commit(id, 5);

        let err = FetchError::not_ready("no namespace");
        assert_eq!(
            container.commit_error(id, err.clone(), err.class()),
            Commit::Suppressed
        );
        assert_eq!(container.state().value, 5);
        assert!(container.state().loaded);
        assert!(container.state().error.is_none());
    }

    #[test]
    fn test_revoke_is_idempotent() {
        let mut container = StateContainer::new(0);
        let id = container.begin();

        assert!(container.revoke(id));
        assert!(!container.revoke(id));
        assert_eq!(container.commit(id, 1), Commit::Stale);
        assert_eq!(container.state().value, 0);
    }

    #[test]
    fn test_revoke_of_stale_term_keeps_current() {
        let mut container = StateContainer::new(0);
        let old = container.begin();
        let new = container.begin();

        assert!(!container.revoke(old));
        assert!(container.is_current(new));
    }

    #[test]
    fn test_commit_with_sees_latest_value() {
        let mut container = StateContainer::new(String::new());
        let id = container.begin();

        container.commit(id, "partial".to_string());
        container.commit_with(id, |prev| format!("{prev}-final"));
        assert_eq!(container.state().value, "partial-final");
    }

    #[test]
    fn test_commit_with_skips_updater_when_stale() {
        let mut container = StateContainer::new(0);
        let old = container.begin();
        container.begin();

        let mut ran = false;
        let result = container.commit_with(old, |prev| {
            ran = true;
            prev + 1
        });
        assert_eq!(result, Commit::Stale);
        assert!(!ran);
    }

    #[test]
    fn test_reset_restores_default() {
        let mut container = StateContainer::new(vec![0u8]);
        let id = container.begin();
        container.commit(id, vec![1, 2, 3]);

        container.reset();
        let state = container.state();
        assert_eq!(state.value, vec![0]);
        assert!(!state.loaded);
        assert!(state.error.is_none());
        assert_eq!(state.generation, 1);

        // Reset does not revoke the running term.
        assert!(container.is_current(id));
    }

    #[test]
    fn test_invocation_id_display() {
        let mut container = StateContainer::new(());
        let id = container.begin();
        assert_eq!(id.to_string(), "#1");
        assert_eq!(id.get(), 1);
    }
}
