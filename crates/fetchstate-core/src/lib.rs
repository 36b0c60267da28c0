//! # fetchstate-core: Pure State Machine for Fetch Synchronization
//!
//! This crate holds the rules that decide which in-flight request may write
//! the observable result. It has no runtime: no tasks, no timers, no
//! channels. The tokio engine lives in `fetchstate-sync`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        fetchstate Architecture                          │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Caller (UI / business layer)                    │   │
//! │  │        reads FetchState, calls refresh(), swaps producer        │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 fetchstate-sync (Tokio engine)                  │   │
//! │  │     request controller, scheduler, refresh futures, config     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ fetchstate-core (THIS CRATE) ★                   │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────────┐   ┌──────────────────┐   ┌───────────────┐   │   │
//! │  │   │   error     │   │      state       │   │    staged     │   │   │
//! │  │   │ FetchError  │   │ StateContainer   │   │  Resolved     │   │   │
//! │  │   │ ErrorClass  │   │ FetchState       │   │  StagedUpdate │   │   │
//! │  │   └─────────────┘   └──────────────────┘   └───────────────┘   │   │
//! │  │                                                                 │   │
//! │  │   NO TASKS • NO TIMERS • NO I/O                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Fetch error taxonomy and classification
//! - [`state`] - Observable state and the term-gated container
//! - [`staged`] - Producer results, including staged (lazy) updates
//!
//! ## Example Usage
//!
//! ```rust
//! use fetchstate_core::{Commit, StateContainer};
//!
//! let mut container = StateContainer::new(Vec::<u32>::new());
//!
//! let first = container.begin();
//! let second = container.begin(); // supersedes `first`
//!
//! assert_eq!(container.commit(first, vec![1]), Commit::Stale);
//! assert_eq!(container.commit(second, vec![2]), Commit::Applied);
//! assert_eq!(container.state().value, vec![2]);
//! assert!(container.state().loaded);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod staged;
pub mod state;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{default_classifier, ErrorClass, ErrorClassifier, FetchError};
pub use staged::{Applier, Apply, Resolved, StagedUpdate, Update};
pub use state::{Commit, FetchState, InvocationId, StateContainer};
