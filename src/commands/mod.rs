//! CLI command definitions and dispatch.

pub mod report;
pub mod serve;
pub mod sweep;

use clap::{Parser, Subcommand};

use dropkeep_core::config::AppConfig;
use dropkeep_core::error::AppError;

/// Dropkeep: file intake bot with antivirus scanning and retention
#[derive(Debug, Parser)]
#[command(name = "dropkeep", version, about, long_about = None)]
pub struct Cli {
    /// Directory holding default.toml and the environment overlays
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,

    /// Subcommand to execute; `serve` when omitted
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the bot, the scheduler and the periodic jobs
    Serve,
    /// Run one retention pass now
    Sweep(sweep::SweepArgs),
    /// Print the weekly report
    Report(report::ReportArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            None | Some(Commands::Serve) => serve::execute(config).await,
            Some(Commands::Sweep(args)) => sweep::execute(args, config).await,
            Some(Commands::Report(args)) => report::execute(args, config).await,
        }
    }
}
