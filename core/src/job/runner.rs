//! Blocking job driver

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::host::ExportHost;

use super::{ExportJob, JobError, JobPhase, JobSummary};

/// Start (if needed) and tick `job` until it finishes, waiting at least
/// `interval` between the starts of consecutive ticks.
pub fn run_to_completion<H: ExportHost + ?Sized>(
    job: &mut ExportJob,
    host: &mut H,
    interval: Duration,
) -> Result<JobSummary, JobError> {
    run_until_cancelled(job, host, interval, &AtomicBool::new(false))
}

/// Like [`run_to_completion`], but checks `cancel` before every tick and
/// cancels the job once it is set.
pub fn run_until_cancelled<H: ExportHost + ?Sized>(
    job: &mut ExportJob,
    host: &mut H,
    interval: Duration,
    cancel: &AtomicBool,
) -> Result<JobSummary, JobError> {
    if job.phase() == JobPhase::Idle {
        job.start(host)?;
    }

    loop {
        if cancel.load(Ordering::Relaxed) && job.cancel(host) {
            return Err(JobError::Cancelled("cancelled by user".to_string()));
        }

        let started = Instant::now();
        match job.tick(host)? {
            JobPhase::Done => return Ok(job.summary().clone()),
            JobPhase::Cancelled => {
                return Err(JobError::Cancelled("job was cancelled".to_string()));
            }
            JobPhase::Idle | JobPhase::Running | JobPhase::Finishing => {}
        }

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }
}
