//! # Simulated Pipeline Jobs API
//!
//! Stands in for a pipelines backend. Listing jobs is the producer; a
//! second, slower call fills in each job's last run status afterwards
//! through a staged update.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  list_jobs(ns) ──► apply.set(jobs)            visible immediately      │
//! │                         │                                               │
//! │                         └──► spawn enrich ──► apply.update(statuses)   │
//! │                                               dropped if superseded    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use fetchstate_sync::{producer, Apply, FetchError, FetchState, ProducerOptions, ProducerRef, Resolved};

/// Jobs seeded per namespace.
const JOBS_PER_NAMESPACE: usize = 3;

/// Every Nth list call fails like a flaky backend.
const FAILURE_EVERY: u64 = 5;

// =============================================================================
// Types
// =============================================================================

/// A recurring pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineRunJob {
    pub id: Uuid,
    pub display_name: String,
    pub namespace: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,

    /// Filled in by the enrichment step.
    pub last_run_status: Option<RunStatus>,
}

/// Outcome of a job's most recent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Succeeded,
    Running,
    Failed,
}

// =============================================================================
// Simulated API
// =============================================================================

/// Pipelines API bound to one namespace.
pub struct SimulatedApi {
    namespace: Option<String>,
    latency: Duration,
    jobs: Vec<PipelineRunJob>,
    calls: AtomicU64,
}

impl SimulatedApi {
    /// Creates an API for `namespace`. `None` means no project is selected.
    pub fn new(namespace: Option<&str>, latency: Duration) -> Self {
        SimulatedApi {
            namespace: namespace.map(str::to_string),
            latency,
            jobs: namespace.map(seed_jobs).unwrap_or_default(),
            calls: AtomicU64::new(0),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Lists the namespace's jobs, without run statuses.
    pub async fn list_jobs(&self, opts: &ProducerOptions) -> Result<Vec<PipelineRunJob>, FetchError> {
        let Some(namespace) = self.namespace() else {
            return Err(FetchError::not_ready("No namespace selected"));
        };
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::select! {
            _ = opts.cancelled() => Err(FetchError::Aborted),
            _ = tokio::time::sleep(self.latency) => {
                if call % FAILURE_EVERY == 0 {
                    return Err(FetchError::request(format!(
                        "503 Service Unavailable listing jobs in {namespace}"
                    )));
                }
                Ok(self.jobs.clone())
            }
        }
    }

    /// Looks up the status of a job's last run.
    pub async fn last_run_status(&self, job: &PipelineRunJob) -> RunStatus {
        tokio::time::sleep(self.latency / 2).await;

        let calls = self.calls.load(Ordering::SeqCst) as u128;
        match (job.id.as_u128() + calls) % 3 {
            0 => RunStatus::Succeeded,
            1 => RunStatus::Running,
            _ => RunStatus::Failed,
        }
    }
}

fn seed_jobs(namespace: &str) -> Vec<PipelineRunJob> {
    let now = Utc::now();
    (0..JOBS_PER_NAMESPACE)
        .map(|i| PipelineRunJob {
            id: Uuid::new_v4(),
            display_name: format!("{namespace}-nightly-{i}"),
            namespace: namespace.to_string(),
            enabled: i % 2 == 0,
            created_at: now - chrono::Duration::days(i as i64),
            last_run_status: None,
        })
        .collect()
}

// =============================================================================
// Producer
// =============================================================================

/// Producer listing jobs from `api`, then enriching them with run statuses.
pub fn jobs_producer(api: Arc<SimulatedApi>) -> ProducerRef<Vec<PipelineRunJob>> {
    producer(move |opts: ProducerOptions| {
        let api = api.clone();
        async move {
            let jobs = api.list_jobs(&opts).await?;

            Ok::<_, FetchError>(Resolved::staged(move |apply: Apply<Vec<PipelineRunJob>>| {
                apply.set(jobs.clone());
                tokio::spawn(enrich(api, jobs, apply));
            }))
        }
    })
}

async fn enrich(api: Arc<SimulatedApi>, jobs: Vec<PipelineRunJob>, apply: Apply<Vec<PipelineRunJob>>) {
    let mut statuses = Vec::with_capacity(jobs.len());
    for job in &jobs {
        if !apply.is_current() {
            debug!(namespace = ?api.namespace(), "Enrichment abandoned");
            return;
        }
        statuses.push((job.id, api.last_run_status(job).await));
    }

    apply.update(move |prev| {
        prev.iter()
            .cloned()
            .map(|mut job| {
                job.last_run_status = statuses
                    .iter()
                    .find(|(id, _)| *id == job.id)
                    .map(|(_, status)| *status)
                    .or(job.last_run_status);
                job
            })
            .collect()
    });
}

// =============================================================================
// Snapshot View
// =============================================================================

/// One printed line per state change.
#[derive(Debug, Serialize)]
pub struct SnapshotView<'a> {
    pub generation: u64,
    pub loaded: bool,
    pub error: Option<String>,
    pub jobs: Vec<JobLine<'a>>,
}

#[derive(Debug, Serialize)]
pub struct JobLine<'a> {
    pub name: &'a str,
    pub enabled: bool,
    pub status: Option<RunStatus>,
}

impl<'a> From<&'a FetchState<Vec<PipelineRunJob>>> for SnapshotView<'a> {
    fn from(state: &'a FetchState<Vec<PipelineRunJob>>) -> Self {
        SnapshotView {
            generation: state.generation,
            loaded: state.loaded,
            error: state.error.as_ref().map(ToString::to_string),
            jobs: state
                .value
                .iter()
                .map(|job| JobLine {
                    name: &job.display_name,
                    enabled: job.enabled,
                    status: job.last_run_status,
                })
                .collect(),
        }
    }
}
