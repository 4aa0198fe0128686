//! Entry points exposed to the ingestion adapter.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::id::JobId;
use crate::types::job::JobSpec;

/// Result of a cancellation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still queued and has been removed.
    Dequeued,
    /// The job is running; it stops at the next chunk boundary.
    Signalled,
    /// No such job.
    Unknown,
}

/// Accepts new jobs and cancellation requests.
#[async_trait]
pub trait IngestSink: Send + Sync {
    /// Validate and queue a job.
    async fn enqueue(&self, spec: JobSpec) -> AppResult<JobId>;

    /// Ask for a job to stop.
    async fn request_cancel(&self, id: &JobId) -> CancelOutcome;
}
