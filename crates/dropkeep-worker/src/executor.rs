//! Job executor: runs a handler and contains its failures.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;

use dropkeep_core::types::job::{Job, JobOutcome};

/// Message carried by a panic payload.
pub(crate) fn panic_reason(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "worker panicked".to_string())
}

/// Drives one job to a terminal outcome.
///
/// Handlers report every failure through [`JobOutcome`]; they never return
/// errors to the scheduler.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Run `job` to completion.
    async fn run(&self, job: Job) -> JobOutcome;
}

/// Runs jobs through a [`JobHandler`], converting panics into failures.
#[derive(Clone)]
pub struct JobExecutor {
    handler: Arc<dyn JobHandler>,
}

impl fmt::Debug for JobExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobExecutor").finish()
    }
}

impl JobExecutor {
    /// Create an executor for `handler`.
    pub fn new(handler: Arc<dyn JobHandler>) -> Self {
        Self { handler }
    }

    /// Execute `job`; a panic inside the handler becomes [`JobOutcome::Failed`].
    pub async fn execute(&self, job: Job) -> JobOutcome {
        let id = job.id.clone();
        tracing::info!(job_id = %id, filename = %job.target_filename, "Executing job");

        match AssertUnwindSafe(self.handler.run(job)).catch_unwind().await {
            Ok(outcome) => {
                tracing::info!(job_id = %id, outcome = ?outcome, "Job finished");
                outcome
            }
            Err(panic) => {
                let reason = panic_reason(panic.as_ref());
                tracing::error!(job_id = %id, reason = %reason, "Job handler panicked");
                JobOutcome::Failed { reason }
            }
        }
    }
}
