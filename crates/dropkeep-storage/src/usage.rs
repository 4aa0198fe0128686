//! Capacity of the filesystem holding the storage root.

use std::path::{Path, PathBuf};

use sysinfo::Disks;

use dropkeep_core::error::AppError;
use dropkeep_core::result::AppResult;
use dropkeep_core::types::format::human_size;

/// Disk capacity snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Total bytes.
    pub total: u64,
    /// Bytes available to unprivileged users.
    pub available: u64,
}

impl DiskUsage {
    /// Bytes in use.
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.available)
    }

    /// `"12.0 GiB / 100.0 GiB"`.
    pub fn used_of_total(&self) -> String {
        format!(
            "{} / {}",
            human_size(self.used() as f64),
            human_size(self.total as f64)
        )
    }

    /// Capacity of the disk mounted at the deepest mount point containing `path`.
    pub fn for_path(path: &Path) -> AppResult<Self> {
        let target = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let disks = Disks::new_with_refreshed_list();
        disks
            .list()
            .iter()
            .filter(|disk| target.starts_with(disk.mount_point()))
            .max_by_key(|disk| disk.mount_point().components().count())
            .map(|disk| Self {
                total: disk.total_space(),
                available: disk.available_space(),
            })
            .ok_or_else(|| {
                AppError::storage(format!(
                    "Could not determine disk space for path: {}",
                    path.display()
                ))
            })
    }

    /// Async wrapper running the probe on the blocking pool.
    pub async fn probe(path: PathBuf) -> AppResult<Self> {
        tokio::task::spawn_blocking(move || Self::for_path(&path))
            .await
            .map_err(|e| AppError::internal(format!("disk usage probe panicked: {e}")))?
    }
}
