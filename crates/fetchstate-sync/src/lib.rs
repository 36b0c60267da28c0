//! # fetchstate-sync: Tokio Engine for the Fetch-State Synchronizer
//!
//! Drives a [`fetchstate_core::StateContainer`] from an async producer:
//! one live request at a time, cancel-before-start, optional interval
//! polling, producer swaps and a single teardown path.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Synchronizer Architecture                          │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                  FetchSync<T> (Public Facade)                    │  │
//! │  │   state() · subscribe() · refresh() · set_producer() · teardown │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │   Scheduler    │  │   Controller   │  │   Lazy Update          │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Poll interval  │  │ One live term  │  │ Routes settled results │    │
//! │  │ Activation     │  │ Cancel signal  │  │ Staged Apply handles   │    │
//! │  │ Teardown       │  │ Refresh future │  │ Error classification   │    │
//! │  └────────────────┘  └────────────────┘  └────────────────────────┘    │
//! │                               │                                         │
//! │                               ▼                                         │
//! │            Shared { config, classifier, watch::Sender,                 │
//! │                     Mutex<Inner { container, producer, live, poll }> } │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Polling, reset and contract settings (TOML + env)
//! - [`controller`] - Invocation lifecycle, [`Refresh`] and [`CancelHandle`]
//! - [`error`] - Engine error types
//! - [`producer`] - The producer calling contract
//! - [`synchronizer`] - [`FetchSync`], its builder and handle
//!
//! ## Example
//! ```rust,no_run
//! use fetchstate_sync::{value_producer, FetchConfig, FetchError, FetchSync};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let producer = value_producer(|_opts| async { Ok::<_, FetchError>(vec![1, 2, 3]) });
//! let sync = FetchSync::start(producer, Vec::new(), FetchConfig::polling(5_000))?;
//!
//! if let Some(jobs) = sync.refresh().await {
//!     println!("{} jobs", jobs.len());
//! }
//! sync.teardown();
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod controller;
pub mod error;
pub mod producer;
pub mod synchronizer;

mod lazy;
mod scheduler;
mod shared;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use config::{ContractPolicy, FetchConfig, PollingSettings, StateSettings, MIN_REFRESH_INTERVAL_MS};
pub use controller::{CancelHandle, InvocationPhase, Refresh};
pub use error::{EngineError, EngineResult};
pub use producer::{producer, same_producer, value_producer, Produce, ProducerOptions, ProducerRef, ProducerResult};
pub use shared::FetchValue;
pub use synchronizer::{FetchSync, FetchSyncBuilder, FetchSyncHandle};

pub use fetchstate_core::{
    default_classifier, Apply, ErrorClass, ErrorClassifier, FetchError, FetchState, InvocationId, Resolved,
    StagedUpdate,
};
