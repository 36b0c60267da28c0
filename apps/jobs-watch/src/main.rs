//! # jobs-watch
//!
//! Polls a simulated pipelines API through a [`FetchSync`] and prints each
//! state snapshot as one JSON line. Cycles through the namespaces given on
//! the command line, swapping the producer each time.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           jobs-watch                                    │
//! │                                                                         │
//! │  (no namespace) ──► NotReady, nothing shown                            │
//! │        │ switch                                                         │
//! │        ▼                                                                │
//! │  ns-a ──► jobs, then run statuses ──► polled every refresh interval    │
//! │        │ switch (state reset when configured)                          │
//! │        ▼                                                                │
//! │  ns-b ──► ...                                     Ctrl+C ──► teardown  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Config comes from `$JOBS_WATCH_CONFIG`, then the platform default path,
//! then `FETCHSTATE_*` environment overrides.

mod jobs;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use fetchstate_sync::{FetchConfig, FetchState, FetchSync};

use crate::jobs::{jobs_producer, PipelineRunJob, SimulatedApi, SnapshotView};

/// Env var naming an explicit config file.
const CONFIG_ENV: &str = "JOBS_WATCH_CONFIG";

/// Poll period used when the config leaves polling off.
const DEFAULT_POLL_MS: u64 = 2_000;

/// How long each namespace is watched before switching.
const SWITCH_EVERY: Duration = Duration::from_secs(7);

/// Simulated API round trip.
const API_LATENCY: Duration = Duration::from_millis(300);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = FetchConfig::load_or_default(config_path);
    if config.refresh_interval().is_none() {
        config = config.with_refresh_interval_ms(DEFAULT_POLL_MS);
    }
    info!(
        label = %config.label,
        refresh_interval_ms = config.polling.refresh_interval_ms,
        reset_on_producer_change = config.reset_on_producer_change(),
        "Configuration loaded"
    );

    let mut namespaces: Vec<String> = std::env::args().skip(1).collect();
    if namespaces.is_empty() {
        namespaces = vec!["ds-project-a".to_string(), "ds-project-b".to_string()];
    }

    // Start without a namespace, the way a page loads before a project is picked.
    let initial = Arc::new(SimulatedApi::new(None, API_LATENCY));
    let sync = FetchSync::start(jobs_producer(initial), Vec::new(), config)?;
    let printer = tokio::spawn(print_snapshots(sync.subscribe()));

    let mut switch = interval_at(Instant::now() + SWITCH_EVERY, SWITCH_EVERY);
    let mut cycle = namespaces.iter().cycle();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            _ = switch.tick() => {
                let Some(namespace) = cycle.next() else {
                    break;
                };
                info!(%namespace, "Switching namespace");
                let api = Arc::new(SimulatedApi::new(Some(namespace), API_LATENCY));
                sync.set_producer(jobs_producer(api))?;
            }
        }
    }

    sync.teardown();
    drop(sync);

    // The stream ends once the last invocation task lets go of the state.
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        warn!("Snapshot printer did not finish");
    }

    info!("jobs-watch stopped");
    Ok(())
}

/// Prints every snapshot as a JSON line.
async fn print_snapshots(rx: watch::Receiver<FetchState<Vec<PipelineRunJob>>>) {
    let mut snapshots = WatchStream::new(rx);

    while let Some(state) = snapshots.next().await {
        match serde_json::to_string(&SnapshotView::from(&state)) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(%e, "Failed to render snapshot"),
        }
    }
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(%e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }

    info!("Shutdown signal received");
}
