//! Background job execution
//!
//! `PipelineWorker` owns a fixed pool of threads that take commands off one
//! shared mpsc queue. `submit_job` returns as soon as the job is recorded
//! and queued; the caller observes progress through the `JobStore`.

use crate::job::{JobMode, JobObserver, JobStore, PipelineJob, Stage};
use crate::pipeline::{validate_subject, PipelineCoordinator};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info};
use turntable_core::{JobId, Result, TurntableError};

/// Work handed to the pool
#[derive(Debug)]
pub enum WorkerCommand {
    Run {
        job_id: JobId,
        subject: String,
    },
    RunViews {
        job_id: JobId,
        subject: String,
        convert: bool,
    },
    Shutdown,
}

/// Result of a synchronous multiview job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewJobSummary {
    pub job_id: JobId,
    pub stage: Stage,
    pub view_count: usize,
    pub saved_locations: Vec<String>,
    #[serde(default)]
    pub model_urls: Vec<String>,
}

impl ViewJobSummary {
    fn from_job(job: &PipelineJob) -> Self {
        Self {
            job_id: job.id.clone(),
            stage: job.stage,
            view_count: job.views.len(),
            saved_locations: job.views.iter().map(|v| v.location.clone()).collect(),
            model_urls: job.model_urls.clone(),
        }
    }
}

/// Fixed-size pool running pipeline jobs in the background
pub struct PipelineWorker {
    command_tx: Option<Sender<WorkerCommand>>,
    coordinator: Arc<PipelineCoordinator>,
    jobs: Arc<JobStore>,
    threads: Vec<JoinHandle<()>>,
}

impl PipelineWorker {
    /// Start `workers` threads (at least one)
    pub fn new(coordinator: PipelineCoordinator, jobs: Arc<JobStore>, workers: usize) -> Self {
        let coordinator = Arc::new(coordinator);
        let (command_tx, command_rx) = channel::<WorkerCommand>();
        let command_rx = Arc::new(Mutex::new(command_rx));

        let threads = (0..workers.max(1))
            .map(|index| {
                let rx = command_rx.clone();
                let coordinator = coordinator.clone();
                let jobs = jobs.clone();
                thread::Builder::new()
                    .name(format!("turntable-worker-{}", index))
                    .spawn(move || worker_loop(index, &rx, &coordinator, &jobs))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    error!(error = %e, "failed to spawn worker thread");
                    None
                }
            })
            .collect::<Vec<_>>();

        info!(workers = threads.len(), "worker pool started");

        Self {
            command_tx: Some(command_tx),
            coordinator,
            jobs,
            threads,
        }
    }

    pub fn jobs(&self) -> &Arc<JobStore> {
        &self.jobs
    }

    /// Validate, record and enqueue a single-image job
    pub fn submit_job(&self, subject: &str) -> Result<JobId> {
        self.submit_job_with_id(JobId::generate(), subject)
    }

    /// Like `submit_job`, with a caller-chosen job id. An id that is
    /// already tracked is rejected.
    pub fn submit_job_with_id(&self, job_id: JobId, subject: &str) -> Result<JobId> {
        let subject = validate_subject(subject)?;
        self.enqueue(
            PipelineJob::new(job_id.clone(), subject, JobMode::Single),
            WorkerCommand::Run {
                job_id: job_id.clone(),
                subject: subject.to_string(),
            },
        )?;
        Ok(job_id)
    }

    /// Validate, record and enqueue a multiview job
    pub fn submit_views_async(&self, subject: &str, convert: bool) -> Result<JobId> {
        let subject = validate_subject(subject)?;
        let job_id = JobId::generate();
        self.enqueue(
            PipelineJob::new(job_id.clone(), subject, JobMode::Multiview { convert }),
            WorkerCommand::RunViews {
                job_id: job_id.clone(),
                subject: subject.to_string(),
                convert,
            },
        )?;
        Ok(job_id)
    }

    /// Run a multiview job on the calling thread and return once every
    /// angle has been attempted.
    pub fn submit_view_job(&self, subject: &str, convert: bool) -> Result<ViewJobSummary> {
        let subject = validate_subject(subject)?;
        let job = self
            .coordinator
            .run_multiview(JobId::generate(), subject, convert, self.jobs.as_ref());
        Ok(ViewJobSummary::from_job(&job))
    }

    /// Stop accepting work, let queued jobs finish and join every thread
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.command_tx.take() {
            for _ in 0..self.threads.len() {
                let _ = tx.send(WorkerCommand::Shutdown);
            }
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }

    /// Stop accepting work without waiting for running jobs.
    ///
    /// Worker threads are detached and keep draining the queue until the
    /// process exits.
    pub fn detach(mut self) {
        self.command_tx.take();
        let detached = self.threads.drain(..).count();
        debug!(detached, "worker threads detached");
    }

    fn enqueue(&self, job: PipelineJob, command: WorkerCommand) -> Result<()> {
        let tx = self
            .command_tx
            .as_ref()
            .ok_or_else(|| TurntableError::WorkerError("worker pool is shut down".to_string()))?;
        self.jobs.insert_new(&job)?;
        tx.send(command).map_err(|e| {
            TurntableError::WorkerError(format!("Failed to queue job {}: {}", job.id, e))
        })?;
        info!(job_id = %job.id, "job queued");
        Ok(())
    }
}

impl Drop for PipelineWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(
    index: usize,
    rx: &Mutex<Receiver<WorkerCommand>>,
    coordinator: &PipelineCoordinator,
    jobs: &JobStore,
) {
    loop {
        let command = match rx.lock() {
            Ok(guard) => guard.recv(),
            Err(_) => break,
        };

        match command {
            Ok(WorkerCommand::Run { job_id, subject }) => {
                debug!(worker = index, %job_id, "picked up job");
                guarded(jobs, &job_id, JobMode::Single, &subject, || {
                    coordinator.run(job_id.clone(), &subject, jobs);
                });
            }
            Ok(WorkerCommand::RunViews {
                job_id,
                subject,
                convert,
            }) => {
                debug!(worker = index, %job_id, "picked up multiview job");
                guarded(jobs, &job_id, JobMode::Multiview { convert }, &subject, || {
                    coordinator.run_multiview(job_id.clone(), &subject, convert, jobs);
                });
            }
            Ok(WorkerCommand::Shutdown) | Err(_) => break,
        }
    }
    debug!(worker = index, "worker stopped");
}

/// Run one job; a panic fails the job instead of leaving it non-terminal
fn guarded(jobs: &JobStore, job_id: &JobId, mode: JobMode, subject: &str, run: impl FnOnce()) {
    if panic::catch_unwind(AssertUnwindSafe(run)).is_ok() {
        return;
    }
    error!(%job_id, "job panicked");
    let mut job = jobs
        .load(job_id)
        .unwrap_or_else(|_| PipelineJob::new(job_id.clone(), subject, mode));
    if !job.is_terminal() {
        job.fail_with("worker", "Job panicked in worker thread");
        jobs.job_updated(&job);
    }
}
