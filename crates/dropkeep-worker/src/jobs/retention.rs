//! Retention sweep: warn about and delete files past their retention age.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use dropkeep_core::config::RetentionConfig;
use dropkeep_core::events::{EventKind, MetricEvent};
use dropkeep_core::result::AppResult;
use dropkeep_metrics::EventSink;
use dropkeep_storage::{LocalStore, StoredFile};

use crate::messages;
use crate::notify::Notifier;

/// Counters of one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Files inspected.
    pub scanned: usize,
    /// Warnings sent.
    pub warned: usize,
    /// Files deleted.
    pub deleted: usize,
    /// Bytes freed by deletions.
    pub bytes_freed: u64,
    /// Files that could not be processed.
    pub failed: usize,
}

/// Filesystem-age sweep over the storage root.
///
/// Knows nothing about jobs: files are judged by modification time only, so
/// retention keeps working across restarts.
#[derive(Clone)]
pub struct RetentionSweeper {
    files: LocalStore,
    notifier: Notifier,
    events: Arc<dyn EventSink>,
    config: RetentionConfig,
}

impl fmt::Debug for RetentionSweeper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetentionSweeper")
            .field("root", &self.files.root())
            .field("config", &self.config)
            .finish()
    }
}

impl RetentionSweeper {
    /// Create a sweeper.
    pub fn new(
        files: LocalStore,
        notifier: Notifier,
        events: Arc<dyn EventSink>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            files,
            notifier,
            events,
            config,
        }
    }

    /// Sweep as of now.
    pub async fn run(&self) -> AppResult<SweepReport> {
        self.sweep(Utc::now()).await
    }

    /// Sweep the root as if the current time were `now`.
    ///
    /// Only listing the root can fail; per-file problems are counted in
    /// [`SweepReport::failed`] and left for the next sweep.
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let files = self.files.list_files().await?;
        let mut report = SweepReport {
            scanned: files.len(),
            ..SweepReport::default()
        };

        let period = self.config.period_days;
        let notice_start = self.config.notice_start();

        for file in &files {
            let age = file.age_days(now);
            if age >= period {
                match self.delete(file, age).await {
                    Ok(()) => {
                        report.deleted += 1;
                        report.bytes_freed += file.size;
                    }
                    Err(e) => {
                        report.failed += 1;
                        error!(path = %file.path.display(), error = %e, "Retention delete failed");
                    }
                }
            } else if age >= notice_start {
                if self.config.warn_once && file.warned {
                    continue;
                }
                match self.warn(file, age, period - age).await {
                    Ok(true) => report.warned += 1,
                    Ok(false) => report.failed += 1,
                    Err(e) => {
                        report.failed += 1;
                        warn!(path = %file.path.display(), error = %e, "Retention warning failed");
                    }
                }
            }
        }

        info!(
            scanned = report.scanned,
            warned = report.warned,
            deleted = report.deleted,
            bytes_freed = report.bytes_freed,
            failed = report.failed,
            "Retention sweep complete"
        );
        Ok(report)
    }

    async fn warn(&self, file: &StoredFile, age: u32, delete_in: u32) -> AppResult<bool> {
        let text = messages::retention_warning(&file.name, age, delete_in);
        if !self.notifier.operator(&text, None).await.is_settled() {
            return Ok(false);
        }
        self.files.touch_marker(&file.path).await?;
        info!(filename = %file.name, age_days = age, delete_in_days = delete_in, "Retention warning sent");
        Ok(true)
    }

    async fn delete(&self, file: &StoredFile, age: u32) -> AppResult<()> {
        self.files.remove_file(&file.path).await?;
        if let Err(e) = self.files.remove_marker(&file.path).await {
            warn!(path = %file.path.display(), error = %e, "Failed to remove warning marker");
        }
        info!(filename = %file.name, age_days = age, size = file.size, "Retention deleted file");

        self.events
            .emit(MetricEvent::now(EventKind::RetentionDeleted {
                filename: file.name.clone(),
                size_bytes: file.size,
                age_days: age,
            }))
            .await;
        self.notifier
            .operator(&messages::retention_deleted(&file.name, age), None)
            .await;
        Ok(())
    }
}
