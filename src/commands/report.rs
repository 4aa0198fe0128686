//! `dropkeep report`: render a weekly report.

use clap::Args;

use dropkeep_core::config::AppConfig;
use dropkeep_core::error::AppError;
use dropkeep_core::types::week::IsoWeekKey;

use crate::app::App;

/// Arguments for `report`
#[derive(Debug, Args)]
pub struct ReportArgs {
    /// ISO year; defaults to the current week
    #[arg(long, requires = "week")]
    pub year: Option<i32>,

    /// ISO week number (1-53)
    #[arg(long, requires = "year")]
    pub week: Option<u32>,

    /// Also post the report to the operator channel
    #[arg(long)]
    pub send: bool,
}

/// Print the report of the requested week.
pub async fn execute(args: &ReportArgs, config: AppConfig) -> Result<(), AppError> {
    let week = match (args.year, args.week) {
        (Some(year), Some(week)) => IsoWeekKey::checked(year, week).ok_or_else(|| {
            AppError::validation(format!("{}-W{:02} is not an ISO week", year, week))
        })?,
        _ => IsoWeekKey::current(),
    };

    let app = App::build(config).await?;
    let job = app.report_job();
    let report = job.generate_for(week).await?;
    println!("{}", report.text);

    if args.send {
        let delivery = job.send(&report).await;
        tracing::info!(week = %week, delivery = ?delivery, "Report posted");
    }
    Ok(())
}
