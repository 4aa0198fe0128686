//! # dropkeep-metrics
//!
//! Append-only metrics for Dropkeep. Events go to one JSON-lines file per
//! ISO week; rollups and reports are recomputed from those files on
//! demand and never stored.

pub mod clients;
pub mod recorder;
pub mod report;
pub mod rollup;
pub mod store;

pub use clients::ClientRegistry;
pub use recorder::{EventSink, MetricsRecorder};
pub use report::{ReportBuilder, WeeklyReport};
pub use rollup::{WeekRollup, rollup_week};
pub use store::MetricsStore;
