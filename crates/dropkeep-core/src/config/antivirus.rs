//! Antivirus daemon configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the file reaches the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Send the path; the daemon reads the file from a shared volume.
    #[default]
    Path,
    /// Stream the file bytes over the socket.
    Stream,
}

/// ClamAV-compatible daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntivirusConfig {
    /// When false every file is reported as a scan error and kept.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Daemon host name.
    #[serde(default = "default_host")]
    pub host: String,
    /// Daemon TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Hard timeout in seconds for one scan, connection included.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Transfer mode.
    #[serde(default)]
    pub mode: ScanMode,
}

impl AntivirusConfig {
    /// Scan timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// `host:port` address of the daemon.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for AntivirusConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
            mode: ScanMode::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "clamav".to_string()
}

fn default_port() -> u16 {
    3310
}

fn default_timeout() -> u64 {
    30
}
