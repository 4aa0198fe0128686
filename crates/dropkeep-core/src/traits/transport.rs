//! File transport abstraction.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque handle the transport uses to locate the remote file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OriginRef {
    /// Transport-specific file identifier.
    pub file_id: String,
}

impl OriginRef {
    /// Wrap a transport file identifier.
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
        }
    }
}

/// Answer of a progress observer at a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressControl {
    /// Keep transferring.
    Continue,
    /// Stop the transfer; the transport returns [`FetchOutcome::Aborted`].
    Abort,
}

/// Receives `(received, total)` at every chunk boundary.
///
/// Called inline from the transfer loop, so implementations must not block.
pub trait ProgressObserver: Send {
    /// Observe progress and decide whether to continue.
    fn on_progress(&mut self, received: u64, total: u64) -> ProgressControl;
}

/// Result of a fetch that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// All bytes were written to this path.
    Completed(PathBuf),
    /// The observer asked to stop.
    Aborted,
}

/// Transfer failure not caused by the requester.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The remote side refused or failed the request.
    #[error("remote error: {0}")]
    Remote(String),
    /// Network-level failure.
    #[error("network error: {0}")]
    Network(String),
    /// The stream ended before the announced size.
    #[error("incomplete transfer: expected {expected} bytes, got {received}")]
    Incomplete {
        /// Announced size.
        expected: u64,
        /// Bytes written.
        received: u64,
    },
    /// Local filesystem failure while writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Moves bytes from the source to local storage.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Download `origin` into `dest`, reporting progress to `observer`.
    async fn fetch(
        &self,
        origin: &OriginRef,
        dest: &Path,
        observer: &mut dyn ProgressObserver,
    ) -> Result<FetchOutcome, TransferError>;
}
