//! Job model and the per-job state machine.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::events::UploadResult;
use crate::result::AppResult;
use crate::traits::messenger::MessageRef;
use crate::traits::transport::OriginRef;
use crate::types::id::JobId;
use crate::types::media::MediaInfo;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the pending queue.
    Queued,
    /// Bytes are being transferred.
    Downloading,
    /// Requester aborted the transfer.
    Cancelled,
    /// Transfer failed.
    Failed,
    /// Transfer finished, awaiting scan.
    Downloaded,
    /// Antivirus scan in progress.
    Scanning,
    /// Scan reported no threat.
    Clean,
    /// Scan reported a threat; the file is gone.
    Infected,
    /// Scan could not complete; the file is kept.
    ScanError,
    /// The file is kept under retention.
    Retained,
    /// Removed by the retention sweeper.
    Deleted,
}

impl JobState {
    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Queued, Downloading)
                | (Queued, Cancelled)
                | (Downloading, Cancelled)
                | (Downloading, Failed)
                | (Downloading, Downloaded)
                | (Downloaded, Scanning)
                | (Scanning, Clean)
                | (Scanning, Infected)
                | (Scanning, ScanError)
                | (Clean, Retained)
                | (ScanError, Retained)
                | (Retained, Deleted)
        )
    }

    /// States after which the worker drops the job.
    pub fn is_terminal_for_worker(self) -> bool {
        matches!(
            self,
            JobState::Cancelled
                | JobState::Failed
                | JobState::Infected
                | JobState::Retained
                | JobState::Deleted
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::Downloaded => "downloaded",
            Self::Scanning => "scanning",
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::ScanError => "scan_error",
            Self::Retained => "retained",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Ingestion request handed to the engine.
#[derive(Debug, Clone)]
pub struct JobSpec {
    /// Identifier chosen by the ingestion adapter.
    pub id: JobId,
    /// Requested filename before sanitization.
    pub filename: String,
    /// Optional subfolder of the storage root.
    pub subfolder: Option<String>,
    /// Handle the transport uses to fetch the bytes.
    pub origin: OriginRef,
    /// Narrow view of the source message.
    pub media: MediaInfo,
    /// Free-text description for the operator summary.
    pub description: Option<String>,
    /// The message that requested the upload.
    pub requester: MessageRef,
}

/// One in-flight transfer.
#[derive(Debug, Clone)]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// Sanitized filename relative to its folder.
    pub target_filename: String,
    /// Resolved absolute destination.
    pub target_path: PathBuf,
    /// Display path (`subfolder/name`) used in messages.
    pub display_path: String,
    /// Transport handle.
    pub origin: OriginRef,
    /// Source message attributes.
    pub media: MediaInfo,
    /// Optional description.
    pub description: Option<String>,
    /// Message that requested the upload.
    pub requester: MessageRef,
    /// Status message edited with progress, once sent.
    pub progress_message: Option<MessageRef>,
    /// When the job was accepted.
    pub enqueued_at: DateTime<Utc>,
    /// When the transfer started.
    pub started_at: Option<DateTime<Utc>>,
    /// Last emitted progress update.
    pub last_progress_at: Option<DateTime<Utc>>,
    /// Total announced by the transport.
    pub bytes_expected: u64,
    /// Bytes received so far.
    pub bytes_received: u64,
    state: JobState,
    cancel_requested: bool,
}

impl Job {
    /// Create a queued job from an accepted spec and its resolved destination.
    pub fn new(
        spec: JobSpec,
        target_filename: String,
        target_path: PathBuf,
        display_path: String,
    ) -> Self {
        Self {
            id: spec.id,
            target_filename,
            target_path,
            display_path,
            origin: spec.origin,
            bytes_expected: spec.media.file_size.unwrap_or(0),
            media: spec.media,
            description: spec.description,
            requester: spec.requester,
            progress_message: None,
            enqueued_at: Utc::now(),
            started_at: None,
            last_progress_at: None,
            bytes_received: 0,
            state: JobState::Queued,
            cancel_requested: false,
        }
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Move to `next`, rejecting edges outside the lifecycle graph.
    pub fn transition(&mut self, next: JobState) -> AppResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AppError::invalid_state(format!(
                "job {}: illegal transition {} -> {}",
                self.id, self.state, next
            )));
        }
        tracing::debug!(job_id = %self.id, from = %self.state, to = %next, "Job state change");
        self.state = next;
        Ok(())
    }

    /// Flag the job for cancellation. The flag is never cleared.
    pub fn mark_cancel_requested(&mut self) {
        self.cancel_requested = true;
    }

    /// Whether cancellation was requested.
    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }
}

/// How a worker finished a job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The requester stopped the transfer.
    Cancelled,
    /// The transfer failed.
    Failed {
        /// Why.
        reason: String,
    },
    /// Stored and clean.
    Clean,
    /// Detected and removed.
    Infected {
        /// Detection name reported by the scanner.
        signature: String,
    },
    /// Stored without a verdict.
    ScanError {
        /// Why the scan failed.
        reason: String,
    },
}

impl JobOutcome {
    /// Result recorded in `upload_finished`, `None` for cancellations.
    pub fn upload_result(&self) -> Option<UploadResult> {
        match self {
            Self::Cancelled => None,
            Self::Failed { .. } => Some(UploadResult::Error),
            Self::Clean => Some(UploadResult::Clean),
            Self::Infected { .. } => Some(UploadResult::Infected),
            Self::ScanError { .. } => Some(UploadResult::ScanError),
        }
    }

    /// Whether the file stays on disk.
    pub fn keeps_file(&self) -> bool {
        matches!(self, Self::Clean | Self::ScanError { .. })
    }
}
