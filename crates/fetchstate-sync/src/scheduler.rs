//! # Scheduler
//!
//! Owns the poll loop and the activation lifecycle.
//!
//! ## Activation
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Activation Cycle                               │
//! │                                                                         │
//! │  build / producer change                                               │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  [reset state]  (producer change only, when configured)                │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  stop old poll loop ─► cancel live invocation ─► start invocation      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  spawn poll loop (every tick: cancel live, start new)                  │
//! │                                                                         │
//! │  teardown: stop poll loop, cancel live. Runs once.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::controller::{self, Refresh};
use crate::shared::{FetchValue, Inner, Shared};

// =============================================================================
// Poll Task
// =============================================================================

/// A running poll loop.
pub(crate) struct PollTask {
    stop: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Stops the loop. Call with `inner` locked so a tick waiting on the
    /// lock sees the stop before it can start anything.
    pub(crate) fn stop(self) {
        self.stop.cancel();
        self.handle.abort();
    }
}

// =============================================================================
// Activation
// =============================================================================

/// Runs one activation cycle. Call with `inner` locked.
pub(crate) fn activate<T: FetchValue>(
    shared: &Arc<Shared<T>>,
    inner: &mut Inner<T>,
    reset: bool,
) -> Refresh<T> {
    if reset {
        inner.container.reset();
        shared.publish(inner);
        info!(
            label = %shared.label(),
            generation = inner.container.state().generation,
            "State reset for new producer"
        );
    }

    if let Some(poll) = inner.poll.take() {
        poll.stop();
    }
    controller::cancel_live(shared, inner);

    let (refresh, _) = controller::start_locked(shared, inner);
    inner.poll = spawn_poller(shared);
    refresh
}

/// Stops polling and cancels the live invocation.
///
/// Returns false if teardown already ran.
pub(crate) fn teardown<T: FetchValue>(shared: &Shared<T>) -> bool {
    let mut inner = shared.inner.lock();
    if shared.torn_down.swap(true, Ordering::SeqCst) {
        return false;
    }

    if let Some(poll) = inner.poll.take() {
        poll.stop();
    }
    controller::cancel_live(shared, &mut inner);

    info!(label = %shared.label(), "Synchronizer torn down");
    true
}

// =============================================================================
// Poll Loop
// =============================================================================

fn spawn_poller<T: FetchValue>(shared: &Arc<Shared<T>>) -> Option<PollTask> {
    let period = shared.config.refresh_interval()?;
    let stop = CancellationToken::new();
    let first_tick = Instant::now() + period;

    debug!(
        label = %shared.label(),
        period_ms = period.as_millis() as u64,
        "Starting poll loop"
    );
    let handle = shared.runtime.spawn(poll_loop(
        Arc::downgrade(shared),
        first_tick,
        period,
        stop.clone(),
    ));

    Some(PollTask { stop, handle })
}

async fn poll_loop<T: FetchValue>(
    shared: Weak<Shared<T>>,
    first_tick: Instant,
    period: Duration,
    stop: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(first_tick, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = stop.cancelled() => break,

            _ = interval.tick() => {
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                debug!(label = %shared.label(), "Poll tick");

                // The refresh result is observed through the state.
                if controller::restart(&shared, Some(&stop)).is_none() {
                    break;
                }
            }
        }
    }
}
