//! Weekly JSON-lines partitions.

use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use dropkeep_core::error::{AppError, ErrorKind};
use dropkeep_core::events::MetricEvent;
use dropkeep_core::result::AppResult;
use dropkeep_core::types::week::IsoWeekKey;

/// Append-only event log, one file per ISO week.
///
/// Each event is written as a complete line with a single `write_all` on a
/// file opened in append mode, under an in-process lock, so concurrent
/// writers never interleave partial lines.
#[derive(Debug)]
pub struct MetricsStore {
    dir: PathBuf,
    append_lock: Mutex<()>,
}

impl MetricsStore {
    /// Open the store rooted at `dir`, creating the directory.
    pub async fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create metrics directory: {}", dir.display()),
                e,
            )
        })?;
        Ok(Self {
            dir,
            append_lock: Mutex::new(()),
        })
    }

    /// Directory holding the partitions.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File backing `week`.
    pub fn partition_path(&self, week: IsoWeekKey) -> PathBuf {
        self.dir.join(week.file_name())
    }

    /// Append one event to the partition of its timestamp.
    pub async fn append(&self, event: &MetricEvent) -> AppResult<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        let path = self.partition_path(event.week());

        let _guard = self.append_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(kind = event.kind.name(), path = %path.display(), "Metric event appended");
        Ok(())
    }

    /// All events of `week`. Blank and malformed lines are skipped.
    pub async fn load_week(&self, week: IsoWeekKey) -> AppResult<Vec<MetricEvent>> {
        let path = self.partition_path(week);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for (idx, line) in raw.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<MetricEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => warn!(
                    path = %path.display(),
                    line = idx + 1,
                    error = %e,
                    "Skipping malformed metric record"
                ),
            }
        }
        Ok(events)
    }

    /// Weeks that have a partition file, oldest first.
    pub async fn week_keys(&self) -> AppResult<Vec<IsoWeekKey>> {
        let mut keys = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(key) = IsoWeekKey::parse_file_name(&entry.file_name().to_string_lossy()) {
                keys.push(key);
            }
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    /// Up to `count` partitioned weeks ending at `until` (inclusive).
    pub async fn trailing_weeks(
        &self,
        until: IsoWeekKey,
        count: usize,
    ) -> AppResult<Vec<IsoWeekKey>> {
        let keys: Vec<_> = self
            .week_keys()
            .await?
            .into_iter()
            .filter(|k| *k <= until)
            .collect();
        let skip = keys.len().saturating_sub(count);
        Ok(keys.into_iter().skip(skip).collect())
    }
}
