//! Local storage root.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs;
use tracing::{debug, warn};

use dropkeep_core::error::{AppError, ErrorKind};
use dropkeep_core::result::AppResult;

/// Suffix of the sidecar file recording that a retention warning was sent.
pub const MARKER_SUFFIX: &str = ".warned";

/// A completed file directly under the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    /// Path as listed under the root.
    pub path: PathBuf,
    /// File name.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, the age reference.
    pub modified: DateTime<Utc>,
    /// Whether a warning marker exists.
    pub warned: bool,
}

impl StoredFile {
    /// Age in whole days at `now`, floored, never negative.
    pub fn age_days(&self, now: DateTime<Utc>) -> u32 {
        age_days(self.modified, now)
    }
}

/// Whole days between `modified` and `now`.
pub fn age_days(modified: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let secs = (now - modified).num_seconds().max(0);
    u32::try_from(secs / 86_400).unwrap_or(u32::MAX)
}

/// Flat local storage root holding completed transfers.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open the storage root, creating it when `create` is set.
    pub async fn new(root: impl Into<PathBuf>, create: bool) -> AppResult<Self> {
        let root = root.into();
        if create {
            fs::create_dir_all(&root).await.map_err(|e| {
                AppError::with_source(
                    ErrorKind::Storage,
                    format!("Failed to create storage root: {}", root.display()),
                    e,
                )
            })?;
        }
        Ok(Self { root })
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sidecar marker path for `file`.
    pub fn marker_path(file: &Path) -> PathBuf {
        let mut name = file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(MARKER_SUFFIX);
        file.with_file_name(name)
    }

    /// Whether a regular file exists at `path`.
    pub async fn file_exists(&self, path: &Path) -> bool {
        fs::metadata(path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    /// Create the parent directory of `path` and verify it stays inside the root.
    pub async fn prepare_parent(&self, path: &Path) -> AppResult<()> {
        let Some(parent) = path.parent() else {
            return Ok(());
        };
        fs::create_dir_all(parent).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to create parent directory: {}", parent.display()),
                e,
            )
        })?;
        let root = fs::canonicalize(&self.root).await?;
        let resolved = fs::canonicalize(parent).await?;
        if !resolved.starts_with(&root) {
            return Err(AppError::path_rejected(format!(
                "{} resolves outside the storage root",
                parent.display()
            )));
        }
        Ok(())
    }

    /// List regular files directly under the root.
    ///
    /// Symlinks are followed and kept only when their target is a regular
    /// file whose parent is the root itself. Marker files are skipped.
    /// Entries that cannot be inspected are logged and skipped.
    pub async fn list_files(&self) -> AppResult<Vec<StoredFile>> {
        let root = match fs::canonicalize(&self.root).await {
            Ok(root) => root,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(root = %self.root.display(), "Storage root missing, nothing to list");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut entries = fs::read_dir(&self.root).await?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(MARKER_SUFFIX) {
                continue;
            }

            let resolved = match fs::canonicalize(&path).await {
                Ok(p) => p,
                Err(e) => {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %path.display(), error = %e, "Failed to resolve entry");
                    }
                    continue;
                }
            };
            if resolved.parent() != Some(root.as_path()) {
                debug!(path = %path.display(), "Skipping entry resolving outside the root");
                continue;
            }

            let meta = match fs::metadata(&resolved).await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to stat entry");
                    continue;
                }
            };
            let modified = match meta.modified() {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "No modification time");
                    continue;
                }
            };
            let warned = fs::try_exists(Self::marker_path(&path))
                .await
                .unwrap_or(false);

            files.push(StoredFile {
                path,
                name,
                size: meta.len(),
                modified,
                warned,
            });
        }

        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    /// Record that `file` was warned about.
    pub async fn touch_marker(&self, file: &Path) -> AppResult<()> {
        fs::write(Self::marker_path(file), b"").await?;
        Ok(())
    }

    /// Remove the marker of `file`, if any.
    pub async fn remove_marker(&self, file: &Path) -> AppResult<()> {
        remove_if_exists(&Self::marker_path(file)).await
    }

    /// Delete a stored file.
    pub async fn remove_file(&self, file: &Path) -> AppResult<()> {
        fs::remove_file(file).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Storage,
                format!("Failed to delete {}", file.display()),
                e,
            )
        })?;
        debug!(path = %file.display(), "Deleted file");
        Ok(())
    }

    /// Delete a partially written file; a missing file is not an error.
    pub async fn remove_partial(&self, file: &Path) -> AppResult<()> {
        remove_if_exists(file).await
    }
}

async fn remove_if_exists(path: &Path) -> AppResult<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
