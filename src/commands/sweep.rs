//! `dropkeep sweep`: one retention pass.

use clap::Args;

use dropkeep_core::config::AppConfig;
use dropkeep_core::error::AppError;
use dropkeep_core::types::format::human_size;

use crate::app::App;

/// Arguments for `sweep`
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Sweep the storage root once and print what happened.
pub async fn execute(args: &SweepArgs, config: AppConfig) -> Result<(), AppError> {
    let app = App::build(config).await?;
    let report = app.sweeper().run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Scanned {} files: {} warned, {} deleted ({} freed), {} failed",
            report.scanned,
            report.warned,
            report.deleted,
            human_size(report.bytes_freed as f64),
            report.failed
        );
    }
    Ok(())
}
