//! # Job Store
//!
//! Volatile, process-local registry of research jobs. Each job runs on its
//! own tokio task with its own [`ResearchState`]; readers only ever see
//! snapshots. Nothing is persisted.
//!
//! Lifecycle: `pending -> running -> completed | error`. A failed job keeps
//! only its error message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::JobError;
use crate::export::{render_markdown, CitationStyle};
use crate::state::{ResearchState, Stage};
use crate::workflow::{ResearchPipeline, StageObserver};

pub type JobId = Uuid;

/// Default cadence of [`JobStore::stream`]
pub const DEFAULT_STREAM_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

/// What to research.
#[derive(Debug, Clone, PartialEq)]
pub struct ResearchRequest {
    pub query: String,
    /// Overrides the pipeline's revision bound
    pub max_iterations: Option<u32>,
}

impl ResearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_iterations: None,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }
}

#[derive(Debug, Clone)]
struct Job {
    query: String,
    status: JobStatus,
    progress: f32,
    current_stage: Option<Stage>,
    result: Option<ResearchState>,
    error: Option<String>,
    created_at: DateTime<Local>,
}

/// Point-in-time view of a job.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub query: String,
    pub status: JobStatus,
    pub progress: f32,
    pub current_agent: Option<Stage>,
    pub result: Option<ResearchState>,
    pub error: Option<String>,
    pub created_at: DateTime<Local>,
}

/// One server-sent event carrying a job snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct JobEvent(pub JobSnapshot);

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        self.0.status.is_terminal()
    }

    /// `data: {json}\n\n`
    pub fn to_sse(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(&self.0)?))
    }
}

/// Shared job registry; clones share the same map.
///
/// Jobs are never evicted: the store lives as long as the process.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<JobId, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending job and start it in the background.
    pub async fn submit(&self, pipeline: Arc<ResearchPipeline>, request: ResearchRequest) -> JobId {
        let id = Uuid::new_v4();
        self.jobs.write().await.insert(
            id,
            Job {
                query: request.query.clone(),
                status: JobStatus::Pending,
                progress: 0.0,
                current_stage: None,
                result: None,
                error: None,
                created_at: Local::now(),
            },
        );
        info!(job_id = %id, query = %request.query, "Research job created");

        let store = self.clone();
        tokio::spawn(async move {
            store.execute(id, pipeline, request).await;
        });
        id
    }

    async fn execute(&self, id: JobId, pipeline: Arc<ResearchPipeline>, request: ResearchRequest) {
        self.update(id, |job| job.status = JobStatus::Running).await;

        let mut state = pipeline.initial_state(request.query);
        if let Some(max_iterations) = request.max_iterations {
            state.max_iterations = max_iterations;
        }
        let observer = JobObserver {
            store: self.clone(),
            id,
        };

        // A panicking stage must still leave the job in a terminal status
        let run = tokio::spawn(async move {
            let outcome = pipeline.run(&mut state, &observer).await;
            outcome.map(|()| state)
        });

        let outcome = match run.await {
            Ok(outcome) => outcome.map_err(|e| e.to_string()),
            Err(e) => Err(join_failure(e)),
        };

        match outcome {
            Ok(state) => {
                info!(job_id = %id, "Research job completed");
                self.update(id, move |job| {
                    job.status = JobStatus::Completed;
                    job.progress = 1.0;
                    job.current_stage = None;
                    job.result = Some(state);
                })
                .await;
            }
            Err(message) => {
                error!(job_id = %id, error = %message, "Research job failed");
                self.update(id, move |job| {
                    job.status = JobStatus::Error;
                    job.error = Some(message);
                    job.result = None;
                })
                .await;
            }
        }
    }

    async fn update(&self, id: JobId, apply: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().await.get_mut(&id) {
            apply(job);
        }
    }

    pub async fn snapshot(&self, id: JobId) -> Option<JobSnapshot> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id)?;
        Some(JobSnapshot {
            job_id: id,
            query: job.query.clone(),
            status: job.status,
            progress: job.progress,
            current_agent: job.current_stage,
            result: match job.status {
                JobStatus::Completed => job.result.clone(),
                _ => None,
            },
            error: job.error.clone(),
            created_at: job.created_at,
        })
    }

    /// Snapshots every `interval` until the job reaches a terminal status.
    ///
    /// The first event is emitted immediately; the terminal event is the
    /// last. An unknown id yields an empty stream.
    pub fn stream(&self, id: JobId, interval: Duration) -> impl Stream<Item = JobEvent> + Send + 'static {
        let store = self.clone();
        stream::unfold((true, false), move |(first, finished)| {
            let store = store.clone();
            async move {
                if finished {
                    return None;
                }
                if !first {
                    tokio::time::sleep(interval).await;
                }
                let event = JobEvent(store.snapshot(id).await?);
                debug!(job_id = %id, status = ?event.0.status, progress = event.0.progress, "Job event");
                let done = event.is_terminal();
                Some((event, (false, done)))
            }
        })
    }

    /// Render a completed job as Markdown.
    pub async fn export_markdown(&self, id: JobId, style: CitationStyle) -> Result<String, JobError> {
        let jobs = self.jobs.read().await;
        let job = jobs.get(&id).ok_or_else(|| JobError::NotFound(id.to_string()))?;
        match (&job.status, &job.result) {
            (JobStatus::Completed, Some(state)) => {
                Ok(render_markdown(state, style, Local::now().naive_local()))
            }
            _ => Err(JobError::NotCompleted(id.to_string())),
        }
    }
}

/// Message recorded when the pipeline task dies instead of returning.
fn join_failure(e: tokio::task::JoinError) -> String {
    if !e.is_panic() {
        return "Research task was cancelled".to_string();
    }
    let payload = e.into_panic();
    let detail = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown cause".to_string());
    format!("Research task panicked: {}", detail)
}

/// Mirrors stage transitions into the job record.
struct JobObserver {
    store: JobStore,
    id: JobId,
}

#[async_trait]
impl StageObserver for JobObserver {
    async fn stage_started(&self, stage: Stage) {
        self.store
            .update(self.id, |job| {
                job.current_stage = Some(stage);
                job.progress = stage.progress();
            })
            .await;
    }
}
