//! Several single-image jobs on the worker pool

use super::{print_job, start_worker};
use anyhow::Result;
use std::time::Duration;
use turntable_core::JobId;
use turntable_gen::Stage;

pub fn run(subjects: &[String], wait_secs: u64, mock: bool) -> Result<()> {
    let worker = start_worker(mock)?;

    let mut submitted: Vec<JobId> = Vec::new();
    let mut rejected = 0usize;
    for subject in subjects {
        match worker.submit_job(subject) {
            Ok(id) => {
                println!("Submitted {} for '{}'", id, subject);
                submitted.push(id);
            }
            Err(e) => {
                eprintln!("Skipping '{}': {}", subject, e);
                rejected += 1;
            }
        }
    }

    let mut done = 0usize;
    let mut unfinished = false;
    for id in &submitted {
        let job = worker
            .jobs()
            .wait_terminal(id, Duration::from_secs(wait_secs))
            .map_err(|e| anyhow::anyhow!("{}", e))?;
        println!();
        print_job(&job);
        match job.stage {
            Stage::Done => done += 1,
            Stage::Failed => {}
            _ => unfinished = true,
        }
    }
    if unfinished {
        worker.detach();
    }

    println!(
        "\n{} done, {} not done, {} rejected",
        done,
        submitted.len() - done,
        rejected
    );
    if done == submitted.len() && rejected == 0 {
        Ok(())
    } else {
        anyhow::bail!("Some jobs did not complete")
    }
}
