//! Metric events appended to the weekly event log.
//!
//! Events are immutable facts. They are serialized as one JSON object per
//! line with a `ts` (unix seconds) and a `kind` tag; the remaining fields
//! depend on the kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::week::IsoWeekKey;

/// Final result recorded in an `upload_finished` event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadResult {
    /// Scanned and found clean.
    Clean,
    /// Positive detection; the file was removed.
    Infected,
    /// The scanner could not produce a verdict; the file was kept.
    ScanError,
    /// The transfer failed.
    Error,
}

impl UploadResult {
    /// Wire name of the result.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::ScanError => "scan_error",
            Self::Error => "error",
        }
    }
}

/// Kind-specific payload of a [`MetricEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A worker picked the job up and the transfer began.
    UploadStarted {
        /// Client key (`@username`, `id:N` or `unknown`).
        client: String,
        /// Target filename.
        filename: String,
        /// Whether the requester attached a description.
        #[serde(default, alias = "has_desc")]
        has_description: bool,
    },
    /// A worker reached a terminal state other than cancellation.
    UploadFinished {
        /// Client key.
        client: String,
        /// Target filename.
        filename: String,
        /// Bytes on disk (or expected, when the transfer failed).
        #[serde(default)]
        size_bytes: u64,
        /// Terminal result.
        result: UploadResult,
        /// Wall-clock duration of the transfer.
        #[serde(default)]
        duration_sec: f64,
        /// Average transfer speed in MiB/s.
        #[serde(default)]
        speed_mb_s: f64,
    },
    /// The requester cancelled an active transfer.
    UploadCancelled {
        /// Client key.
        client: String,
        /// Target filename.
        filename: String,
        /// Bytes received before the abort.
        #[serde(default)]
        bytes_received: u64,
    },
    /// The retention sweeper deleted a stored file.
    RetentionDeleted {
        /// Name of the deleted file.
        filename: String,
        /// Size at deletion time.
        #[serde(default)]
        size_bytes: u64,
        /// Age in whole days at deletion time.
        #[serde(default)]
        age_days: u32,
    },
}

impl EventKind {
    /// Wire name of the kind tag.
    pub fn name(&self) -> &'static str {
        match self {
            Self::UploadStarted { .. } => "upload_started",
            Self::UploadFinished { .. } => "upload_finished",
            Self::UploadCancelled { .. } => "upload_cancelled",
            Self::RetentionDeleted { .. } => "retention_deleted",
        }
    }
}

/// One immutable record of the metrics log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    /// When the fact happened, stored as unix seconds.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub ts: DateTime<Utc>,
    /// The payload.
    #[serde(flatten)]
    pub kind: EventKind,
}

impl MetricEvent {
    /// Create an event stamped with the current time.
    pub fn now(kind: EventKind) -> Self {
        Self::at(Utc::now(), kind)
    }

    /// Create an event with an explicit timestamp.
    pub fn at(ts: DateTime<Utc>, kind: EventKind) -> Self {
        Self { ts, kind }
    }

    /// The weekly partition this event belongs to.
    pub fn week(&self) -> IsoWeekKey {
        IsoWeekKey::from_datetime(self.ts)
    }
}
