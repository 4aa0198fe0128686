//! Worker runner: the scheduler loop that promotes queued jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use dropkeep_core::config::WorkerConfig;

use crate::executor::JobExecutor;
use crate::store::{ActiveSlot, SchedulerState};

/// How long shutdown waits for in-flight jobs by default.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

/// Polls the job store and starts a worker task per promoted job.
#[derive(Debug, Clone)]
pub struct WorkerRunner {
    /// Shared job store
    state: Arc<SchedulerState>,
    /// Runs promoted jobs
    executor: JobExecutor,
    /// Worker configuration
    config: WorkerConfig,
}

impl WorkerRunner {
    /// Create a new worker runner
    pub fn new(state: Arc<SchedulerState>, executor: JobExecutor, config: WorkerConfig) -> Self {
        Self {
            state,
            executor,
            config,
        }
    }

    /// The shared job store.
    pub fn state(&self) -> &Arc<SchedulerState> {
        &self.state
    }

    /// Run until the cancel signal flips to `true`, then wait for in-flight
    /// jobs for at most [`SHUTDOWN_GRACE`].
    pub async fn run(&self, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            max_concurrency = self.config.max_concurrency,
            poll_interval_ms = self.config.poll_interval_ms,
            "Scheduler loop started"
        );

        let poll_interval = self.config.poll_interval();

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Scheduler loop received shutdown signal");
                        break;
                    }
                }
                _ = time::sleep(poll_interval) => {
                    self.tick();
                }
            }
        }

        let dropped = self.state.pending_len();
        if dropped > 0 {
            tracing::warn!(dropped, "Discarding queued jobs on shutdown");
        }

        tracing::info!(active = self.state.active_count(), "Waiting for in-flight jobs to complete...");
        if self.drain(SHUTDOWN_GRACE).await {
            tracing::info!("Scheduler shut down complete");
        } else {
            tracing::warn!(
                active = self.state.active_count(),
                "Grace period elapsed with jobs still running"
            );
        }
    }

    /// Promote queued jobs into free slots and start their workers.
    ///
    /// Returns how many workers were started.
    pub fn tick(&self) -> usize {
        let promoted = self.state.promote(self.config.max_concurrency);
        let started = promoted.len();

        for job in promoted {
            tracing::info!(
                job_id = %job.id,
                filename = %job.target_filename,
                active = self.state.active_count(),
                "New download initialized"
            );
            let slot = ActiveSlot::new(Arc::clone(&self.state), job.id.clone());
            let executor = self.executor.clone();
            tokio::spawn(async move {
                let _slot = slot;
                executor.execute(job).await;
            });
        }

        if started == 0 {
            tracing::trace!(pending = self.state.pending_len(), "Nothing to promote");
        }
        started
    }

    /// Wait until no job is active or `grace` elapses. `true` when idle.
    pub async fn drain(&self, grace: Duration) -> bool {
        let state = Arc::clone(&self.state);
        time::timeout(grace, async move {
            while state.active_count() > 0 {
                time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .is_ok()
    }
}
