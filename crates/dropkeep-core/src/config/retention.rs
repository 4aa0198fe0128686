//! Retention sweeper configuration.

use serde::{Deserialize, Serialize};

/// Age-based retention of stored files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Files at least this many days old are deleted.
    #[serde(default = "default_period")]
    pub period_days: u32,
    /// Length of the warning window before deletion, in days.
    #[serde(default = "default_notice")]
    pub notice_days: u32,
    /// Warn only once per file (tracked with a sidecar marker).
    #[serde(default = "default_true")]
    pub warn_once: bool,
    /// Cron expression (with seconds) for the sweep.
    #[serde(default = "default_cron")]
    pub sweep_cron: String,
}

impl RetentionConfig {
    /// First age (in days) that falls inside the notice window.
    pub fn notice_start(&self) -> u32 {
        self.period_days.saturating_sub(self.notice_days)
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            period_days: default_period(),
            notice_days: default_notice(),
            warn_once: default_true(),
            sweep_cron: default_cron(),
        }
    }
}

fn default_period() -> u32 {
    30
}

fn default_notice() -> u32 {
    2
}

fn default_true() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 3 * * *".to_string()
}
