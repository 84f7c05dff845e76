//! Single-image generation and conversion

use super::{job_outcome, print_job, start_worker};
use anyhow::Result;
use std::time::Duration;

pub fn run(subject: &str, wait_secs: u64, mock: bool) -> Result<()> {
    let worker = start_worker(mock)?;
    let job_id = worker
        .submit_job(subject)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    println!("Submitted job {}", job_id);

    let job = worker
        .jobs()
        .wait_terminal(&job_id, Duration::from_secs(wait_secs))
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    print_job(&job);
    if !job.is_terminal() {
        worker.detach();
    }
    job_outcome(&job)
}
