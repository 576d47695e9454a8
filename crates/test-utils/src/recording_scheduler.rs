use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use backup_supervisor::errors::{Result, SupervisorError};
use backup_supervisor::scheduler::{JobSpec, Scheduler};

/// Scheduler that records every registered job and can be told to fail.
#[derive(Default)]
pub struct RecordingScheduler {
    jobs: Mutex<Vec<JobSpec>>,
    fail: AtomicBool,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let scheduler = Self::default();
        scheduler.fail.store(true, Ordering::SeqCst);
        scheduler
    }

    pub fn jobs(&self) -> Vec<JobSpec> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for RecordingScheduler {
    async fn schedule(&self, job: JobSpec) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SupervisorError::Other(anyhow::anyhow!(
                "scheduler unavailable for job {}",
                job.name
            )));
        }
        self.jobs.lock().unwrap().push(job);
        Ok(())
    }
}
