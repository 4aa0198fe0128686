//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section. Every field carries a default, so an empty configuration is
//! valid; only `telegram.bot_token` must be provided to run the bot.

pub mod antivirus;
pub mod logging;
pub mod report;
pub mod retention;
pub mod storage;
pub mod telegram;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::antivirus::{AntivirusConfig, ScanMode};
pub use self::logging::LoggingConfig;
pub use self::report::ReportConfig;
pub use self::retention::RetentionConfig;
pub use self::storage::StorageConfig;
pub use self::telegram::TelegramConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay) and
/// `DROPKEEP__*` environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage root and state directory.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Scheduler and download worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Antivirus daemon settings.
    #[serde(default)]
    pub antivirus: AntivirusConfig,
    /// Retention sweeper settings.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Weekly report settings.
    #[serde(default)]
    pub report: ReportConfig,
    /// Telegram Bot API settings.
    #[serde(default)]
    pub telegram: TelegramConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `DROPKEEP_`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        Self::load_from("config", env)
    }

    /// Load configuration from an explicit configuration directory.
    pub fn load_from(dir: &str, env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(&format!("{dir}/default")).required(false))
            .add_source(config::File::with_name(&format!("{dir}/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("DROPKEEP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("telegram.admins")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject combinations that would make the engine misbehave.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.worker.max_concurrency == 0 {
            return Err(AppError::configuration(
                "worker.max_concurrency must be at least 1",
            ));
        }
        if self.retention.period_days == 0 {
            return Err(AppError::configuration(
                "retention.period_days must be at least 1",
            ));
        }
        if self.antivirus.timeout_secs == 0 {
            return Err(AppError::configuration(
                "antivirus.timeout_secs must be at least 1",
            ));
        }
        Ok(())
    }
}
