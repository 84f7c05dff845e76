//! Multiview turntable renders

use super::start_worker;
use anyhow::Result;
use turntable_gen::Stage;

pub fn run(subject: &str, convert: bool, mock: bool) -> Result<()> {
    let worker = start_worker(mock)?;
    let summary = worker
        .submit_view_job(subject, convert)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    println!("Job: {}", summary.job_id);
    println!("  Views saved: {}", summary.view_count);
    for location in &summary.saved_locations {
        println!("    {}", location);
    }
    for url in &summary.model_urls {
        println!("  Model: {}", url);
    }

    if summary.stage == Stage::Failed {
        let job = worker
            .jobs()
            .load(&summary.job_id)
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        if let Some(failure) = job.failure {
            anyhow::bail!("Job {} failed during {}: {}", job.id, failure.stage, failure.reason);
        }
        anyhow::bail!("Job {} failed", job.id);
    }
    Ok(())
}
