//! # dropkeep-scanner
//!
//! Antivirus gateway. Every scan ends in a [`ScanVerdict`]; connection
//! failures, timeouts and malformed daemon replies become
//! [`ScanVerdict::Error`] and never escape as errors.

pub mod clamav;
pub mod protocol;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use dropkeep_core::config::AntivirusConfig;

pub use clamav::ClamAvScanner;

/// Three-way scan result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanVerdict {
    /// No threat detected.
    Clean,
    /// Threat detected.
    Infected {
        /// Detection name.
        signature: String,
    },
    /// The scan could not be completed.
    Error {
        /// What went wrong.
        reason: String,
    },
}

impl ScanVerdict {
    /// Short status used in operator notices.
    pub fn status_label(&self) -> String {
        match self {
            Self::Clean => "clean".to_string(),
            Self::Infected { signature } => format!("infected:{signature}"),
            Self::Error { .. } => "error".to_string(),
        }
    }
}

/// Scans a stored file.
#[async_trait]
pub trait VirusScanner: Send + Sync {
    /// Scan the file at `path`. Never fails; see [`ScanVerdict::Error`].
    async fn scan(&self, path: &Path) -> ScanVerdict;

    /// Whether the backend answers.
    async fn health_check(&self) -> bool;
}

/// Scanner used when antivirus is turned off. Files are kept and flagged.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledScanner;

#[async_trait]
impl VirusScanner for DisabledScanner {
    async fn scan(&self, path: &Path) -> ScanVerdict {
        tracing::debug!(path = %path.display(), "Antivirus disabled, skipping scan");
        ScanVerdict::Error {
            reason: "antivirus disabled".to_string(),
        }
    }

    async fn health_check(&self) -> bool {
        true
    }
}

/// Build the scanner described by the configuration.
pub fn create_scanner(config: &AntivirusConfig) -> Arc<dyn VirusScanner> {
    if config.enabled {
        Arc::new(ClamAvScanner::from_config(config))
    } else {
        tracing::warn!("Antivirus disabled; stored files will be flagged as scan errors");
        Arc::new(DisabledScanner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_scanner_flags_error() {
        let verdict = DisabledScanner.scan(Path::new("/tmp/x")).await;
        assert!(matches!(verdict, ScanVerdict::Error { .. }));
        assert!(DisabledScanner.health_check().await);
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(ScanVerdict::Clean.status_label(), "clean");
        assert_eq!(
            ScanVerdict::Infected {
                signature: "Eicar".into()
            }
            .status_label(),
            "infected:Eicar"
        );
    }

    #[tokio::test]
    async fn test_factory_respects_enabled_flag() {
        let config = AntivirusConfig {
            enabled: false,
            ..Default::default()
        };
        let scanner = create_scanner(&config);
        let verdict = scanner.scan(Path::new("/nowhere")).await;
        assert_eq!(
            verdict,
            ScanVerdict::Error {
                reason: "antivirus disabled".into()
            }
        );
    }
}
