//! Built-in job implementations.

pub mod download;
pub mod report;
pub mod retention;

pub use download::DownloadWorker;
pub use report::WeeklyReportJob;
pub use retention::{RetentionSweeper, SweepReport};
