//! Storage root configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where completed files and engine state live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory completed transfers are written to.
    #[serde(default = "default_root")]
    pub root: String,
    /// Directory holding the metrics partitions and the client registry.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Create missing directories at startup.
    #[serde(default = "default_true")]
    pub create_dirs: bool,
}

impl StorageConfig {
    /// Directory holding weekly metric partitions.
    pub fn metrics_dir(&self) -> PathBuf {
        PathBuf::from(&self.state_dir).join("metrics")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            state_dir: default_state_dir(),
            create_dirs: default_true(),
        }
    }
}

fn default_root() -> String {
    "./data".to_string()
}

fn default_state_dir() -> String {
    "./config".to_string()
}

fn default_true() -> bool {
    true
}
