//! Dropkeep: a Telegram bot that stores uploaded files, scans them and
//! expires them after a retention period.
//!
//! Main entry point: parses the command line, loads configuration,
//! initializes logging and dispatches to the selected command.

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use dropkeep_core::config::AppConfig;
use dropkeep_core::error::AppError;

mod app;
mod commands;

use commands::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_configuration(&cli.config_dir) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = cli.execute(config).await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

/// Load `{dir}/default.toml`, the `DROPKEEP_ENV` overlay and `DROPKEEP__*` variables.
fn load_configuration(dir: &str) -> Result<AppConfig, AppError> {
    let env = std::env::var("DROPKEEP_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load_from(dir, &env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}
