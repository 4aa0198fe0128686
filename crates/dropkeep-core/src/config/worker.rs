//! Scheduler and download worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Scheduler and per-job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Upper bound on simultaneously active transfers.
    #[serde(default = "default_concurrency")]
    pub max_concurrency: usize,
    /// Interval in milliseconds between scheduler ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Base interval in milliseconds between progress updates of one job.
    #[serde(default = "default_progress_interval")]
    pub progress_interval_ms: u64,
    /// Multiply the progress interval by the number of active jobs.
    #[serde(default = "default_true")]
    pub adaptive_progress: bool,
    /// Upper bound in seconds on a single notification send.
    #[serde(default = "default_notify_timeout")]
    pub notify_timeout_secs: u64,
}

impl WorkerConfig {
    /// Scheduler tick as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Base progress throttle as a [`Duration`].
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Notification timeout as a [`Duration`].
    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            progress_interval_ms: default_progress_interval(),
            adaptive_progress: default_true(),
            notify_timeout_secs: default_notify_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    3
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_progress_interval() -> u64 {
    1000
}

fn default_notify_timeout() -> u64 {
    10
}
