//! Weekly report configuration.

use serde::{Deserialize, Serialize};

/// Weekly report job settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Whether the report job is scheduled at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Cron expression (with seconds) for the report.
    #[serde(default = "default_cron")]
    pub cron: String,
    /// Weeks averaged for the growth outlook.
    #[serde(default = "default_trailing")]
    pub trailing_weeks: u32,
    /// Rows shown in each top-N table.
    #[serde(default = "default_top_n")]
    pub top_n: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            cron: default_cron(),
            trailing_weeks: default_trailing(),
            top_n: default_top_n(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cron() -> String {
    "0 0 9 * * 1".to_string()
}

fn default_trailing() -> u32 {
    4
}

fn default_top_n() -> usize {
    5
}
