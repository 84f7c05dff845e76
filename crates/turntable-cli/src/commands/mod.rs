//! CLI command implementations

pub mod batch;
pub mod generate;
pub mod init;
pub mod prompt;
pub mod views;

use anyhow::Result;
use std::sync::Arc;
use turntable_gen::{JobStore, PipelineCoordinator, PipelineJob, PipelineWorker, Stage, TurntableConfig, UreqTransport};

/// Load config and start a worker pool over the configured providers
pub(crate) fn start_worker(mock: bool) -> Result<PipelineWorker> {
    let mut config = TurntableConfig::load().map_err(|e| anyhow::anyhow!("{}", e))?;
    if mock {
        config.use_mock_providers();
    }

    let coordinator = PipelineCoordinator::from_config(&config, Arc::new(UreqTransport::new()))
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(PipelineWorker::new(
        coordinator,
        Arc::new(JobStore::new()),
        config.pipeline.workers,
    ))
}

/// Print a job snapshot in the usual layout
pub(crate) fn print_job(job: &PipelineJob) {
    println!("Job: {}", job.id);
    println!("  Subject: {}", job.subject);
    println!("  Stage: {}", job.stage);
    println!("  Submitted: {}", job.submitted_at.to_rfc3339());
    for url in &job.image_urls {
        println!("  Image: {}", url);
    }
    for view in &job.views {
        println!("  View {:>3}: {}", view.angle, view.location);
    }
    for failure in &job.view_failures {
        println!("  View {:>3} failed: {}", failure.angle, failure.reason);
    }
    for conversion in &job.conversions {
        if let Some(ref err) = conversion.error {
            println!("  Conversion {:>3} failed: {}", conversion.angle, err);
        }
    }
    for url in &job.model_urls {
        println!("  Model: {}", url);
    }
    if let Some(ref failure) = job.failure {
        println!("  Failed during {}: {}", failure.stage, failure.reason);
    }
    if !job.is_terminal() {
        println!("  (still running when the wait ended)");
    }
}

/// Map a finished job to the process outcome
pub(crate) fn job_outcome(job: &PipelineJob) -> Result<()> {
    match job.stage {
        Stage::Done => Ok(()),
        Stage::Failed => anyhow::bail!("Job {} failed", job.id),
        _ => anyhow::bail!("Job {} did not finish in time", job.id),
    }
}
