//! # Fetch Synchronizer
//!
//! Public facade over the request controller and scheduler.
//!
//! ## Usage
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           FetchSync<T>                                  │
//! │                                                                         │
//! │  FetchSync::builder(producer, default)                                 │
//! │      .with_config(config)            polling, reset, contract          │
//! │      .with_classifier(f)             error class hook                  │
//! │      .build()?                       starts the first invocation       │
//! │                                                                         │
//! │  state() / subscribe()               observe                           │
//! │  refresh().await                     cancel live, start, await         │
//! │  set_producer(p)                     reactivate on a new producer      │
//! │  teardown() / drop                   stop polling, cancel live         │
//! │                                                                         │
//! │  FetchSyncHandle: cloneable, Send, for use from other tasks.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, info};

use fetchstate_core::{default_classifier, ErrorClass, ErrorClassifier, FetchError, FetchState, InvocationId};

use crate::config::FetchConfig;
use crate::controller::{self, CancelHandle, InvocationPhase, Refresh};
use crate::error::{EngineError, EngineResult};
use crate::producer::{same_producer, ProducerRef};
use crate::scheduler;
use crate::shared::{FetchValue, Shared};

// =============================================================================
// Fetch Sync
// =============================================================================

/// Keeps a value of type `T` in sync with an async producer.
///
/// Dropping the synchronizer tears it down.
pub struct FetchSync<T: FetchValue> {
    shared: Arc<Shared<T>>,
}

impl<T: FetchValue> FetchSync<T> {
    /// Starts a synchronizer with the given config and the default classifier.
    pub fn start(producer: ProducerRef<T>, default: T, config: FetchConfig) -> EngineResult<Self> {
        Self::builder(producer, default).with_config(config).build()
    }

    /// Creates a builder.
    pub fn builder(producer: ProducerRef<T>, default: T) -> FetchSyncBuilder<T> {
        FetchSyncBuilder::new(producer, default)
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Returns a snapshot of the state.
    pub fn state(&self) -> FetchState<T> {
        snapshot(&self.shared)
    }

    /// Returns the current value.
    pub fn value(&self) -> T {
        self.shared.inner.lock().container.state().value.clone()
    }

    /// Returns true once a value was committed in this generation.
    pub fn is_loaded(&self) -> bool {
        self.shared.inner.lock().container.state().loaded
    }

    /// Returns the visible error, if any.
    pub fn error(&self) -> Option<FetchError> {
        self.shared.inner.lock().container.state().error.clone()
    }

    /// Returns how many resets have happened.
    pub fn generation(&self) -> u64 {
        self.shared.inner.lock().container.state().generation
    }

    /// Returns the phase of the most recent invocation.
    pub fn phase(&self) -> InvocationPhase {
        self.shared.inner.lock().phase
    }

    /// Returns the invocation allowed to commit, if any.
    pub fn current_invocation(&self) -> Option<InvocationId> {
        self.shared.inner.lock().container.current()
    }

    /// Subscribes to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state_tx.subscribe()
    }

    /// Returns the config this synchronizer was built with.
    pub fn config(&self) -> &FetchConfig {
        &self.shared.config
    }

    // =========================================================================
    // Control
    // =========================================================================

    /// Cancels the live invocation and starts a new one.
    ///
    /// Resolves to the committed value, or `None` if the new invocation
    /// did not commit. After teardown it resolves to `None` immediately.
    pub fn refresh(&self) -> Refresh<T> {
        refresh(&self.shared)
    }

    /// Like [`refresh`](Self::refresh), also returning a handle that
    /// cancels this specific invocation.
    ///
    /// Returns `None` after teardown.
    pub fn invoke(&self) -> Option<(Refresh<T>, CancelHandle<T>)> {
        controller::restart(&self.shared, None)
    }

    /// Swaps the producer.
    ///
    /// Returns `Ok(false)` when `producer` is the one already installed.
    /// Otherwise resets the state (if configured), restarts polling and
    /// starts a new invocation.
    pub fn set_producer(&self, producer: ProducerRef<T>) -> EngineResult<bool> {
        set_producer(&self.shared, producer)
    }

    /// Stops polling and cancels the live invocation.
    ///
    /// Returns false if already torn down.
    pub fn teardown(&self) -> bool {
        scheduler::teardown(&self.shared)
    }

    /// Returns true after teardown.
    pub fn is_torn_down(&self) -> bool {
        self.shared.is_torn_down()
    }

    /// Returns a cloneable handle.
    pub fn handle(&self) -> FetchSyncHandle<T> {
        FetchSyncHandle {
            shared: self.shared.clone(),
        }
    }
}

impl<T: FetchValue> Drop for FetchSync<T> {
    fn drop(&mut self) {
        scheduler::teardown(&self.shared);
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable handle to a [`FetchSync`].
///
/// Dropping the owning [`FetchSync`] tears down every handle with it.
#[derive(Clone)]
pub struct FetchSyncHandle<T> {
    shared: Arc<Shared<T>>,
}

impl<T: FetchValue> FetchSyncHandle<T> {
    /// Returns a snapshot of the state.
    pub fn state(&self) -> FetchState<T> {
        snapshot(&self.shared)
    }

    /// Subscribes to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<FetchState<T>> {
        self.shared.state_tx.subscribe()
    }

    /// See [`FetchSync::refresh`].
    pub fn refresh(&self) -> Refresh<T> {
        refresh(&self.shared)
    }

    /// See [`FetchSync::set_producer`].
    pub fn set_producer(&self, producer: ProducerRef<T>) -> EngineResult<bool> {
        set_producer(&self.shared, producer)
    }

    /// See [`FetchSync::teardown`].
    pub fn teardown(&self) -> bool {
        scheduler::teardown(&self.shared)
    }

    /// Returns true after teardown.
    pub fn is_torn_down(&self) -> bool {
        self.shared.is_torn_down()
    }
}

fn snapshot<T: FetchValue>(shared: &Shared<T>) -> FetchState<T> {
    shared.inner.lock().container.snapshot()
}

fn refresh<T: FetchValue>(shared: &Arc<Shared<T>>) -> Refresh<T> {
    match controller::restart(shared, None) {
        Some((refresh, _)) => refresh,
        None => Refresh::settled(),
    }
}

fn set_producer<T: FetchValue>(shared: &Arc<Shared<T>>, producer: ProducerRef<T>) -> EngineResult<bool> {
    let mut inner = shared.inner.lock();

    if shared.is_torn_down() {
        return Err(EngineError::TornDown);
    }
    if same_producer(&inner.producer, &producer) {
        debug!(label = %shared.label(), "Producer unchanged");
        return Ok(false);
    }

    let reset = shared.config.reset_on_producer_change();
    info!(label = %shared.label(), reset, "Producer changed");

    inner.producer = producer;
    let _ = scheduler::activate(shared, &mut inner, reset);
    Ok(true)
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for [`FetchSync`].
pub struct FetchSyncBuilder<T> {
    producer: ProducerRef<T>,
    default: T,
    config: FetchConfig,
    classifier: Option<ErrorClassifier>,
    runtime: Option<Handle>,
}

impl<T: FetchValue> FetchSyncBuilder<T> {
    /// Creates a builder with the default config.
    pub fn new(producer: ProducerRef<T>, default: T) -> Self {
        FetchSyncBuilder {
            producer,
            default,
            config: FetchConfig::default(),
            classifier: None,
            runtime: None,
        }
    }

    /// Sets the config.
    pub fn with_config(mut self, config: FetchConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the error classifier.
    pub fn with_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&FetchError) -> ErrorClass + Send + Sync + 'static,
    {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Sets the runtime tasks are spawned on. Defaults to the current one.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Validates the config and starts the first invocation.
    pub fn build(self) -> EngineResult<FetchSync<T>> {
        self.config.validate()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|_| EngineError::NoRuntime)?,
        };
        let classifier = self.classifier.unwrap_or_else(default_classifier);

        let shared = Shared::new(self.config, classifier, runtime, self.producer, self.default);
        {
            let mut inner = shared.inner.lock();
            let _ = scheduler::activate(&shared, &mut inner, false);
        }

        info!(
            label = %shared.label(),
            refresh_interval_ms = shared.config.polling.refresh_interval_ms,
            reset_on_producer_change = shared.config.reset_on_producer_change(),
            contract = %shared.config.contract(),
            "Synchronizer started"
        );

        Ok(FetchSync { shared })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ContractPolicy;
    use crate::producer::{producer, value_producer, ProducerOptions};
    use fetchstate_core::{Apply, Resolved};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Producer returning its call number after `delay_ms`.
    fn counting(delay_ms: u64) -> (ProducerRef<u32>, Arc<AtomicU32>) {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let p = value_producer(move |_opts| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                sleep(ms(delay_ms)).await;
                Ok::<_, FetchError>(n)
            }
        });
        (p, calls)
    }

    /// Producer that answers with `first` on call 1 and `rest` afterwards.
    fn first_then(first: u32, rest: fn() -> Result<Resolved<u32>, FetchError>) -> ProducerRef<u32> {
        let calls = Arc::new(AtomicU32::new(0));
        producer(move |_opts| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(Resolved::Value(first))
                } else {
                    rest()
                }
            }
        })
    }

    // =========================================================================
    // Build
    // =========================================================================

    #[test]
    fn test_build_requires_runtime() {
        let (p, _) = counting(0);
        let result = FetchSync::start(p, 0, FetchConfig::default());
        assert!(matches!(result, Err(EngineError::NoRuntime)));
    }

    #[test]
    fn test_build_with_explicit_runtime() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (p, calls) = counting(0);

        let sync = FetchSync::builder(p, 0)
            .with_runtime(rt.handle().clone())
            .build()
            .unwrap();

        assert_eq!(rt.block_on(sync.refresh()), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sync.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_refreshes_run_producer_once() {
        let (p, calls) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();

        let pending: Vec<_> = (0..10).map(|_| sync.refresh()).collect();
        let mut results = Vec::new();
        for refresh in pending {
            results.push(refresh.await);
        }

        assert!(results[..9].iter().all(Option::is_none));
        assert_eq!(results[9], Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sync.value(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_producer_surfaces_error() {
        let p = producer(|_opts| async {
            if true {
                panic!("producer bug");
            }
            Ok::<_, FetchError>(Resolved::Value(1u32))
        });
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();

        assert_eq!(sync.refresh().await, None);
        assert_eq!(sync.phase(), InvocationPhase::Completed);
        assert!(matches!(sync.error(), Some(FetchError::Source(_))));
        assert!(!sync.is_loaded());
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let (p, _) = counting(0);
        let result = FetchSync::start(p, 0, FetchConfig::polling(1));
        assert!(matches!(result, Err(EngineError::InvalidConfig(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_invocation_on_build() {
        let (p, calls) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();

        let state = sync.state();
        assert_eq!(state, FetchState::new(0));
        assert_eq!(sync.phase(), InvocationPhase::Running);

        sleep(ms(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sync.value(), 1);
        assert!(sync.is_loaded());
        assert_eq!(sync.phase(), InvocationPhase::Completed);
    }

    // =========================================================================
    // Supersession
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_second_refresh_supersedes_first() {
        let (p, calls) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();

        let first = sync.refresh();
        sleep(ms(5)).await;
        let second = sync.refresh();

        // The build-time invocation was superseded before it ran, so only
        // the two refreshes reach the producer.
        assert_eq!(first.await, None);
        assert_eq!(second.await, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(sync.value(), 2);
        assert!(sync.is_loaded());
        assert!(sync.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_refresh_keeps_last_good_state() {
        let (p, _) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();
        sleep(ms(20)).await;
        let before = sync.state();

        let cancelled = sync.refresh();
        let _live = sync.refresh();
        assert_eq!(cancelled.await, None);

        // Cancellation alone never touches the state.
        assert_eq!(sync.state(), before);
        assert!(sync.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_cancel_handle() {
        let (p, _) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();

        let (refresh, cancel) = sync.invoke().unwrap();
        assert_eq!(sync.current_invocation(), Some(cancel.invocation()));

        cancel.cancel();
        cancel.cancel();
        assert_eq!(refresh.await, None);
        assert_eq!(sync.phase(), InvocationPhase::Cancelled);
        assert_eq!(sync.current_invocation(), None);
        assert!(!sync.is_loaded());
    }

    // =========================================================================
    // Settlement Routing
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_missing_value_leaves_state_untouched() {
        let sync = FetchSync::start(
            first_then(5, || Ok(Resolved::Missing)),
            0,
            FetchConfig::default(),
        )
        .unwrap();
        sleep(ms(1)).await;
        let before = sync.state();
        assert!(before.loaded);

        assert_eq!(sync.refresh().await, None);
        assert_eq!(sync.state(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_value_is_error_when_strict() {
        let config = FetchConfig::default().with_contract(ContractPolicy::Strict);
        let sync = FetchSync::start(first_then(5, || Ok(Resolved::Missing)), 0, config).unwrap();
        sleep(ms(1)).await;

        assert_eq!(sync.refresh().await, None);
        let state = sync.state();
        assert_eq!(state.error, Some(FetchError::ContractViolation));
        assert_eq!(state.value, 5);
        assert!(state.loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_ready_is_suppressed() {
        let sync = FetchSync::start(
            first_then(5, || Err(FetchError::not_ready("no namespace"))),
            0,
            FetchConfig::default(),
        )
        .unwrap();
        sleep(ms(1)).await;

        assert_eq!(sync.refresh().await, None);
        assert_eq!(sync.value(), 5);
        assert!(sync.is_loaded());
        assert!(sync.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reportable_error_keeps_last_good_value() {
        let sync = FetchSync::start(
            first_then(5, || Err(FetchError::request("503 Service Unavailable"))),
            0,
            FetchConfig::default(),
        )
        .unwrap();
        sleep(ms(1)).await;

        assert_eq!(sync.refresh().await, None);
        assert_eq!(sync.value(), 5);
        assert!(sync.is_loaded());
        assert_eq!(sync.error(), Some(FetchError::request("503 Service Unavailable")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_clears_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let p = value_producer(move |_opts| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(FetchError::request("boom")),
                    _ => Ok(n),
                }
            }
        });
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();
        sleep(ms(1)).await;
        assert!(sync.error().is_some());
        assert!(!sync.is_loaded());

        assert_eq!(sync.refresh().await, Some(1));
        assert!(sync.error().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_classifier_suppresses() {
        let p = value_producer(|_opts| async { Err::<u32, _>(FetchError::request("403 Forbidden")) });
        let sync = FetchSync::builder(p, 0)
            .with_classifier(|err: &FetchError| match err {
                FetchError::Request(msg) if msg.starts_with("403") => ErrorClass::NotReady,
                other => other.class(),
            })
            .build()
            .unwrap();

        assert_eq!(sync.refresh().await, None);
        assert!(sync.error().is_none());
    }

    // =========================================================================
    // Staged Updates
    // =========================================================================

    /// Staged producer: sets `partial-<invocation>` now, appends `-final`
    /// after 20ms.
    fn staged_producer() -> ProducerRef<String> {
        producer(|opts: ProducerOptions| {
            let n = opts.invocation.get();
            async move {
                Ok::<_, FetchError>(Resolved::staged(move |apply: Apply<String>| {
                    apply.set(format!("partial-{n}"));
                    tokio::spawn(async move {
                        sleep(ms(20)).await;
                        apply.update(|prev| format!("{prev}-final"));
                    });
                }))
            }
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_update_refines_value() {
        let sync = FetchSync::start(staged_producer(), String::new(), FetchConfig::default()).unwrap();

        assert_eq!(sync.refresh().await.as_deref(), Some("partial-2"));
        assert!(sync.is_loaded());

        sleep(ms(25)).await;
        assert_eq!(sync.value(), "partial-2-final");
    }

    #[tokio::test(start_paused = true)]
    async fn test_staged_update_dropped_after_supersede() {
        let sync = FetchSync::start(staged_producer(), String::new(), FetchConfig::default()).unwrap();
        assert_eq!(sync.refresh().await.as_deref(), Some("partial-2"));

        sleep(ms(10)).await;
        assert_eq!(sync.refresh().await.as_deref(), Some("partial-3"));

        // Call 2's refinement fires at t=20 and is dropped.
        sleep(ms(15)).await;
        assert_eq!(sync.value(), "partial-3");

        sleep(ms(10)).await;
        assert_eq!(sync.value(), "partial-3-final");
    }

    // =========================================================================
    // Polling
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_slow_producer_never_commits_under_polling() {
        let (p, calls) = counting(150);
        let sync = FetchSync::start(p, 0, FetchConfig::polling(100)).unwrap();

        sleep(ms(1050)).await;
        // Initial invocation plus ten ticks, each cancelling the previous.
        assert_eq!(calls.load(Ordering::SeqCst), 11);
        assert!(!sync.is_loaded());
        assert_eq!(sync.phase(), InvocationPhase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_commits_each_tick() {
        let (p, _) = counting(50);
        let sync = FetchSync::start(p, 0, FetchConfig::polling(100)).unwrap();
        let mut rx = sync.subscribe();

        sleep(ms(360)).await;
        // Calls start at 0, 100, 200, 300 and finish 50ms later.
        assert_eq!(sync.value(), 4);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().value, 4);
    }

    // =========================================================================
    // Producer Changes
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_producer_change_with_reset() {
        let config = FetchConfig::default().with_reset_on_producer_change(true);
        let a = value_producer(|_opts| async { Ok::<_, FetchError>(1u32) });
        let (b, _) = counting(100);
        let sync = FetchSync::start(a, 0, config).unwrap();
        sleep(ms(1)).await;
        assert_eq!(sync.value(), 1);

        assert!(sync.set_producer(b).unwrap());
        let state = sync.state();
        assert_eq!(state.value, 0);
        assert!(!state.loaded);
        assert_eq!(state.generation, 1);

        sleep(ms(150)).await;
        assert_eq!(sync.value(), 1);
        assert!(sync.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_change_without_reset() {
        let a = value_producer(|_opts| async { Ok::<_, FetchError>(7u32) });
        let (b, _) = counting(100);
        let sync = FetchSync::start(a, 0, FetchConfig::default()).unwrap();
        sleep(ms(1)).await;

        assert!(sync.set_producer(b).unwrap());
        assert_eq!(sync.value(), 7);
        assert!(sync.is_loaded());
        assert_eq!(sync.generation(), 0);

        sleep(ms(150)).await;
        assert_eq!(sync.value(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_producer_is_noop() {
        let (p, calls) = counting(10);
        let config = FetchConfig::default().with_reset_on_producer_change(true);
        let sync = FetchSync::start(p.clone(), 0, config).unwrap();
        let before = sync.current_invocation();

        assert!(!sync.set_producer(p).unwrap());
        assert_eq!(sync.current_invocation(), before);
        assert_eq!(sync.generation(), 0);

        sleep(ms(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_teardown_resolves_pending_refresh() {
        let (p, _) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();
        let pending = sync.refresh();

        assert!(sync.teardown());
        assert!(!sync.teardown());
        assert_eq!(pending.await, None);
        assert!(!sync.is_loaded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_after_teardown() {
        let (p, calls) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::polling(100)).unwrap();
        sleep(ms(20)).await;
        sync.teardown();
        let seen = calls.load(Ordering::SeqCst);

        assert_eq!(sync.refresh().await, None);
        assert!(sync.invoke().is_none());
        assert!(matches!(
            sync.set_producer(counting(0).0),
            Err(EngineError::TornDown)
        ));

        sleep(ms(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_tears_down_handles() {
        let (p, _) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();
        let handle = sync.handle();
        let pending = handle.refresh();

        drop(sync);
        assert!(handle.is_torn_down());
        assert_eq!(pending.await, None);
        assert_eq!(handle.refresh().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_refresh_from_task() {
        let (p, _) = counting(10);
        let sync = FetchSync::start(p, 0, FetchConfig::default()).unwrap();
        let handle = sync.handle();
        let mut rx = handle.subscribe();

        let value = tokio::spawn(async move { handle.refresh().await }).await.unwrap().unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().value, value);
        assert_eq!(sync.state().value, value);
    }
}
