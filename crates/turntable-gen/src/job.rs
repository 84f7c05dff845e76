//! Pipeline jobs and the in-process status store
//!
//! A `PipelineJob` is what a caller tracks from submission to a terminal
//! outcome. Only the coordinator mutates a job; everyone else observes
//! snapshots through `JobStore`. Job state lives for the lifetime of the
//! process only.

use crate::multiview::{SavedView, ViewFailure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use turntable_core::{JobId, Result, TurntableError};

/// Where a job currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ImageGeneration,
    ViewGeneration,
    ModelConversion,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::ImageGeneration => write!(f, "image_generation"),
            Stage::ViewGeneration => write!(f, "view_generation"),
            Stage::ModelConversion => write!(f, "model_conversion"),
            Stage::Done => write!(f, "done"),
            Stage::Failed => write!(f, "failed"),
        }
    }
}

/// Which stage sequence a job runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum JobMode {
    /// One render, then one conversion
    Single,
    /// The turntable ring, optionally converting every saved view
    Multiview { convert: bool },
}

/// Where and why a job stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// The stage that was running when the job failed
    pub stage: Stage,
    /// Error tag, see `TurntableError::kind`
    pub kind: String,
    pub reason: String,
}

/// Outcome of converting one multiview image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewConversion {
    pub angle: u16,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// A tracked pipeline job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineJob {
    pub id: JobId,
    pub subject: String,
    pub mode: JobMode,
    pub stage: Stage,
    /// Generated image URLs, in generation order
    #[serde(default)]
    pub image_urls: Vec<String>,
    /// Converted model URLs
    #[serde(default)]
    pub model_urls: Vec<String>,
    #[serde(default)]
    pub views: Vec<SavedView>,
    #[serde(default)]
    pub view_failures: Vec<ViewFailure>,
    #[serde(default)]
    pub conversions: Vec<ViewConversion>,
    #[serde(default)]
    pub failure: Option<JobFailure>,
    pub submitted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PipelineJob {
    pub fn new(id: JobId, subject: &str, mode: JobMode) -> Self {
        let now = Utc::now();
        let stage = match mode {
            JobMode::Single => Stage::ImageGeneration,
            JobMode::Multiview { .. } => Stage::ViewGeneration,
        };
        Self {
            id,
            subject: subject.to_string(),
            mode,
            stage,
            image_urls: Vec::new(),
            model_urls: Vec::new(),
            views: Vec::new(),
            view_failures: Vec::new(),
            conversions: Vec::new(),
            failure: None,
            submitted_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    /// Move to the next non-terminal stage
    pub fn advance(&mut self, stage: Stage) {
        self.stage = stage;
        self.touch();
    }

    pub fn complete(&mut self) {
        self.stage = Stage::Done;
        self.touch();
    }

    /// Fail the job, tagging the stage that was running
    pub fn fail(&mut self, error: &TurntableError) {
        self.fail_with(error.kind(), error.to_string());
    }

    pub fn fail_with(&mut self, kind: &str, reason: impl Into<String>) {
        self.failure = Some(JobFailure {
            stage: self.stage,
            kind: kind.to_string(),
            reason: reason.into(),
        });
        self.stage = Stage::Failed;
        self.touch();
    }

    /// The primary model artifact, if any
    pub fn model_url(&self) -> Option<&str> {
        self.model_urls.first().map(|s| s.as_str())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Receives a snapshot every time a job changes
pub trait JobObserver: Send + Sync {
    fn job_updated(&self, job: &PipelineJob);
}

/// Observer that discards updates
pub struct NoopObserver;

impl JobObserver for NoopObserver {
    fn job_updated(&self, _job: &PipelineJob) {}
}

/// In-memory job store, shared between the submitter and the workers.
///
/// Jobs are never evicted; a long-lived process keeps every job it has
/// seen until it exits.
#[derive(Default)]
pub struct JobStore {
    jobs: Mutex<HashMap<JobId, PipelineJob>>,
    changed: Condvar,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a job snapshot
    pub fn save(&self, job: &PipelineJob) -> Result<()> {
        let mut jobs = self.lock()?;
        jobs.insert(job.id.clone(), job.clone());
        drop(jobs);
        self.changed.notify_all();
        Ok(())
    }

    /// Load a job by ID
    pub fn load(&self, id: &JobId) -> Result<PipelineJob> {
        self.lock()?
            .get(id)
            .cloned()
            .ok_or_else(|| TurntableError::JobNotFound(id.to_string()))
    }

    /// List all tracked jobs, oldest first
    pub fn list(&self) -> Result<Vec<PipelineJob>> {
        let mut jobs: Vec<PipelineJob> = self.lock()?.values().cloned().collect();
        jobs.sort_by_key(|j| j.submitted_at);
        Ok(jobs)
    }

    /// Record a newly submitted job. Fails if the id is already tracked.
    pub fn insert_new(&self, job: &PipelineJob) -> Result<()> {
        let mut jobs = self.lock()?;
        if jobs.contains_key(&job.id) {
            return Err(TurntableError::ValidationError(format!(
                "job id '{}' is already in use",
                job.id
            )));
        }
        jobs.insert(job.id.clone(), job.clone());
        drop(jobs);
        self.changed.notify_all();
        Ok(())
    }

    /// Block until the job is terminal or `timeout` elapses, then return
    /// its latest snapshot. A timeout too large to represent waits without
    /// a deadline.
    pub fn wait_terminal(&self, id: &JobId, timeout: Duration) -> Result<PipelineJob> {
        let deadline = Instant::now().checked_add(timeout);
        let mut jobs = self.lock()?;
        loop {
            let job = jobs
                .get(id)
                .cloned()
                .ok_or_else(|| TurntableError::JobNotFound(id.to_string()))?;
            if job.is_terminal() {
                return Ok(job);
            }
            jobs = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(job);
                    }
                    self.changed
                        .wait_timeout(jobs, deadline - now)
                        .map_err(|_| TurntableError::WorkerError("job store poisoned".to_string()))?
                        .0
                }
                None => self
                    .changed
                    .wait(jobs)
                    .map_err(|_| TurntableError::WorkerError("job store poisoned".to_string()))?,
            };
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<JobId, PipelineJob>>> {
        self.jobs
            .lock()
            .map_err(|_| TurntableError::WorkerError("job store poisoned".to_string()))
    }
}

impl JobObserver for JobStore {
    fn job_updated(&self, job: &PipelineJob) {
        if let Err(e) = self.save(job) {
            tracing::error!(job_id = %job.id, error = %e, "failed to record job update");
        }
    }
}
