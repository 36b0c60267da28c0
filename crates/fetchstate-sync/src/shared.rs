//! Shared engine state.
//!
//! Everything that mutates the observable state goes through [`Inner`] under
//! a single lock, which gives the cancel-then-start and check-then-commit
//! sequences their atomicity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use fetchstate_core::{ErrorClassifier, FetchState, StateContainer};

use crate::config::FetchConfig;
use crate::controller::{InvocationPhase, LiveRequest};
use crate::producer::ProducerRef;
use crate::scheduler::PollTask;

/// Bound shared by every value the synchronizer can hold.
pub trait FetchValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> FetchValue for T {}

pub(crate) struct Shared<T> {
    /// Immutable after build.
    pub(crate) config: Arc<FetchConfig>,

    /// Application hook for error classes.
    pub(crate) classifier: ErrorClassifier,

    /// Runtime that invocation and poll tasks are spawned on.
    pub(crate) runtime: Handle,

    /// Snapshot broadcaster. Written only while `inner` is locked.
    pub(crate) state_tx: watch::Sender<FetchState<T>>,

    /// Set once by teardown.
    pub(crate) torn_down: AtomicBool,

    pub(crate) inner: Mutex<Inner<T>>,
}

pub(crate) struct Inner<T> {
    pub(crate) container: StateContainer<T>,
    pub(crate) producer: ProducerRef<T>,
    pub(crate) live: Option<LiveRequest>,
    pub(crate) phase: InvocationPhase,
    pub(crate) poll: Option<PollTask>,
}

impl<T: FetchValue> Shared<T> {
    pub(crate) fn new(
        config: FetchConfig,
        classifier: ErrorClassifier,
        runtime: Handle,
        producer: ProducerRef<T>,
        default: T,
    ) -> Arc<Self> {
        let container = StateContainer::new(default);
        let (state_tx, _) = watch::channel(container.snapshot());

        Arc::new(Shared {
            config: Arc::new(config),
            classifier,
            runtime,
            state_tx,
            torn_down: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                container,
                producer,
                live: None,
                phase: InvocationPhase::Idle,
                poll: None,
            }),
        })
    }

    pub(crate) fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Pushes the container's state to subscribers. Call with `inner` locked.
    pub(crate) fn publish(&self, inner: &Inner<T>) {
        self.state_tx.send_replace(inner.container.snapshot());
    }

    pub(crate) fn label(&self) -> &str {
        &self.config.label
    }
}
