//! # Request Controller
//!
//! Issues one invocation at a time. Each invocation gets a fresh term from
//! the state container and its own cancellation signal, runs the producer
//! on a spawned task, and hands its result to the lazy update protocol.
//!
//! ## Invocation Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Invocation Lifecycle                              │
//! │                                                                         │
//! │   ┌────────┐   start    ┌─────────┐   producer settles  ┌───────────┐  │
//! │   │  IDLE  │ ─────────► │ RUNNING │ ──────────────────► │ COMPLETED │  │
//! │   └────────┘            └────┬────┘                     └─────┬─────┘  │
//! │        ▲                     │ cancel / superseded /          │        │
//! │        │                     │ teardown                       │        │
//! │        │                     ▼                                │        │
//! │        │               ┌───────────┐                          │        │
//! │        └────────────── │ CANCELLED │ ◄────────────────────────┘        │
//! │          next start    └───────────┘   superseded while staged         │
//! │                                        writes may still land           │
//! │                                                                         │
//! │  ORDERING: the previous term is revoked and its signal fired before    │
//! │  the next term is issued, inside one critical section.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use fetchstate_core::{FetchError, InvocationId};

use crate::lazy;
use crate::producer::{ProducerOptions, ProducerRef};
use crate::shared::{FetchValue, Inner, Shared};

// =============================================================================
// Invocation Phase
// =============================================================================

/// Phase of the most recent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvocationPhase {
    /// Nothing started yet.
    Idle,
    /// Waiting on the producer.
    Running,
    /// Producer settled while the invocation was current.
    Completed,
    /// Revoked before or after settling.
    Cancelled,
}

impl fmt::Display for InvocationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationPhase::Idle => write!(f, "idle"),
            InvocationPhase::Running => write!(f, "running"),
            InvocationPhase::Completed => write!(f, "completed"),
            InvocationPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The invocation currently allowed to commit.
pub(crate) struct LiveRequest {
    pub(crate) id: InvocationId,
    pub(crate) signal: CancellationToken,
}

// =============================================================================
// Refresh Future
// =============================================================================

/// Completion of one invocation.
///
/// Resolves to the committed value, or `None` when the invocation was
/// superseded, cancelled, torn down, not ready, or failed. Never hangs:
/// dropping the invocation task resolves it to `None`.
#[must_use = "a Refresh does nothing to the request when dropped; await it to observe the result"]
pub struct Refresh<T> {
    rx: Option<oneshot::Receiver<Option<T>>>,
}

impl<T> Refresh<T> {
    /// A refresh that is already resolved to `None`.
    pub(crate) fn settled() -> Self {
        Refresh { rx: None }
    }

    fn pending(rx: oneshot::Receiver<Option<T>>) -> Self {
        Refresh { rx: Some(rx) }
    }
}

impl<T> Future for Refresh<T> {
    type Output = Option<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let Some(rx) = this.rx.as_mut() else {
            return Poll::Ready(None);
        };

        match Pin::new(rx).poll(cx) {
            Poll::Ready(result) => {
                this.rx = None;
                Poll::Ready(result.ok().flatten())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<T> fmt::Debug for Refresh<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Refresh")
            .field("pending", &self.rx.is_some())
            .finish()
    }
}

// =============================================================================
// Cancel Handle
// =============================================================================

/// Cancels one specific invocation. Idempotent.
pub struct CancelHandle<T> {
    id: InvocationId,
    signal: CancellationToken,
    shared: Weak<Shared<T>>,
}

impl<T: FetchValue> CancelHandle<T> {
    /// The invocation this handle controls.
    pub fn invocation(&self) -> InvocationId {
        self.id
    }

    /// Returns true once the invocation's signal has fired.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_cancelled()
    }

    /// Revokes the invocation and fires its signal.
    pub fn cancel(&self) {
        match self.shared.upgrade() {
            Some(shared) => {
                let mut inner = shared.inner.lock();
                cancel_locked(&shared, &mut inner, self.id, &self.signal);
            }
            None => self.signal.cancel(),
        }
    }
}

impl<T> Clone for CancelHandle<T> {
    fn clone(&self) -> Self {
        CancelHandle {
            id: self.id,
            signal: self.signal.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<T> fmt::Debug for CancelHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("invocation", &self.id)
            .field("cancelled", &self.signal.is_cancelled())
            .finish()
    }
}

// =============================================================================
// Controller Operations
// =============================================================================

/// Revokes `id` and fires its signal. Call with `inner` locked.
pub(crate) fn cancel_locked<T: FetchValue>(
    shared: &Shared<T>,
    inner: &mut Inner<T>,
    id: InvocationId,
    signal: &CancellationToken,
) {
    if inner.container.revoke(id) {
        inner.phase = InvocationPhase::Cancelled;
    }
    if inner.live.as_ref().is_some_and(|live| live.id == id) {
        inner.live = None;
    }
    if !signal.is_cancelled() {
        debug!(label = %shared.label(), invocation = %id, "Cancelling invocation");
        signal.cancel();
    }
}

/// Cancels whatever invocation is live. Call with `inner` locked.
pub(crate) fn cancel_live<T: FetchValue>(shared: &Shared<T>, inner: &mut Inner<T>) {
    if let Some(live) = inner.live.take() {
        cancel_locked(shared, inner, live.id, &live.signal);
    }
}

/// Issues a new term and spawns its invocation. Call with `inner` locked,
/// after cancelling the previous live invocation.
pub(crate) fn start_locked<T: FetchValue>(
    shared: &Arc<Shared<T>>,
    inner: &mut Inner<T>,
) -> (Refresh<T>, CancelHandle<T>) {
    debug_assert!(inner.live.is_none(), "previous invocation must be cancelled first");

    let id = inner.container.begin();
    let signal = CancellationToken::new();
    inner.live = Some(LiveRequest {
        id,
        signal: signal.clone(),
    });
    inner.phase = InvocationPhase::Running;

    let (tx, rx) = oneshot::channel();
    debug!(label = %shared.label(), invocation = %id, "Starting invocation");
    shared.runtime.spawn(run_invocation(
        shared.clone(),
        id,
        signal.clone(),
        inner.producer.clone(),
        tx,
    ));

    let cancel = CancelHandle {
        id,
        signal,
        shared: Arc::downgrade(shared),
    };
    (Refresh::pending(rx), cancel)
}

/// Cancel-then-start as one step.
///
/// Returns `None` after teardown, or when `guard` has fired (a poll loop
/// that was replaced while it waited for the lock).
pub(crate) fn restart<T: FetchValue>(
    shared: &Arc<Shared<T>>,
    guard: Option<&CancellationToken>,
) -> Option<(Refresh<T>, CancelHandle<T>)> {
    let mut inner = shared.inner.lock();

    if shared.is_torn_down() {
        debug!(label = %shared.label(), "Ignoring start after teardown");
        return None;
    }
    if guard.is_some_and(CancellationToken::is_cancelled) {
        return None;
    }

    cancel_live(shared, &mut inner);
    Some(start_locked(shared, &mut inner))
}

/// Body of one invocation task.
///
/// The producer runs in its own task so a panic inside it surfaces as a
/// rejection instead of unwinding this one.
async fn run_invocation<T: FetchValue>(
    shared: Arc<Shared<T>>,
    id: InvocationId,
    signal: CancellationToken,
    producer: ProducerRef<T>,
    tx: oneshot::Sender<Option<T>>,
) {
    // Superseded before this task was first polled.
    if signal.is_cancelled() {
        debug!(label = %shared.label(), invocation = %id, "Invocation cancelled before producer started");
        let _ = tx.send(None);
        return;
    }

    let opts = ProducerOptions {
        invocation: id,
        signal: signal.clone(),
    };
    let mut task = shared.runtime.spawn(async move { producer.produce(opts).await });

    let joined = tokio::select! {
        biased;
        _ = signal.cancelled() => None,
        joined = &mut task => Some(joined),
    };

    let settled = match joined {
        Some(Ok(result)) => Some(result),
        Some(Err(e)) if e.is_panic() => {
            error!(label = %shared.label(), invocation = %id, error = %e, "Producer panicked");
            Some(Err(FetchError::from_source(e)))
        }
        Some(Err(_)) => None,
        None => {
            task.abort();
            None
        }
    };

    let value = match settled {
        Some(result) => lazy::settle(&shared, id, result),
        None => {
            debug!(label = %shared.label(), invocation = %id, "Invocation cancelled before producer settled");
            None
        }
    };

    // The receiver may have been dropped; nobody is waiting then.
    let _ = tx.send(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::producer::value_producer;
    use fetchstate_core::default_classifier;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn shared_with_delay(delay_ms: u64) -> Arc<Shared<u32>> {
        Shared::new(
            FetchConfig::default(),
            default_classifier(),
            tokio::runtime::Handle::current(),
            value_producer(move |_opts| async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok::<_, FetchError>(7)
            }),
            0,
        )
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(InvocationPhase::Idle.to_string(), "idle");
        assert_eq!(InvocationPhase::Cancelled.to_string(), "cancelled");
    }

    #[tokio::test]
    async fn test_settled_refresh_resolves_none() {
        assert_eq!(Refresh::<u32>::settled().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_commits_when_current() {
        let shared = shared_with_delay(10);
        let (refresh, _cancel) = restart(&shared, None).unwrap();

        assert_eq!(refresh.await, Some(7));
        let inner = shared.inner.lock();
        assert_eq!(inner.phase, InvocationPhase::Completed);
        assert!(inner.container.state().loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let shared = shared_with_delay(10);
        let (refresh, cancel) = restart(&shared, None).unwrap();

        cancel.cancel();
        cancel.cancel();
        assert!(cancel.is_cancelled());
        assert_eq!(refresh.await, None);

        let inner = shared.inner.lock();
        assert_eq!(inner.phase, InvocationPhase::Cancelled);
        assert!(inner.live.is_none());
        assert_eq!(inner.container.current(), None);
        assert!(!inner.container.state().loaded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cancels_previous_signal() {
        let shared = shared_with_delay(10);
        let (first, first_cancel) = restart(&shared, None).unwrap();
        let (second, second_cancel) = restart(&shared, None).unwrap();

        assert!(first_cancel.is_cancelled());
        assert!(!second_cancel.is_cancelled());
        assert!(first_cancel.invocation() < second_cancel.invocation());

        // Cancelling a superseded invocation leaves the live one alone.
        first_cancel.cancel();
        assert_eq!(first.await, None);
        assert_eq!(second.await, Some(7));
    }

    #[tokio::test]
    async fn test_fired_guard_blocks_restart() {
        let shared = shared_with_delay(10);
        let guard = CancellationToken::new();
        guard.cancel();

        assert!(restart(&shared, Some(&guard)).is_none());
        assert!(shared.inner.lock().live.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_before_start_skips_producer() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let shared = Shared::new(
            FetchConfig::default(),
            default_classifier(),
            tokio::runtime::Handle::current(),
            value_producer(move |_opts| {
                let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<_, FetchError>(call)
                }
            }),
            0,
        );

        let mut last = None;
        for _ in 0..10 {
            last = restart(&shared, None);
        }
        let (refresh, _cancel) = last.unwrap();

        assert_eq!(refresh.await, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_producer_completes_with_error() {
        let shared = Shared::new(
            FetchConfig::default(),
            default_classifier(),
            tokio::runtime::Handle::current(),
            value_producer(|_opts| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if true {
                    panic!("producer bug");
                }
                Ok::<u32, FetchError>(7)
            }),
            0,
        );
        let (refresh, _cancel) = restart(&shared, None).unwrap();

        assert_eq!(refresh.await, None);
        let inner = shared.inner.lock();
        assert_eq!(inner.phase, InvocationPhase::Completed);
        assert!(matches!(inner.container.state().error, Some(FetchError::Source(_))));
        assert!(!inner.container.state().loaded);
    }
}
