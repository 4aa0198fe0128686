//! Confines requested filenames and subfolders to the storage root.

use std::path::{Path, PathBuf};

use dropkeep_core::error::AppError;
use dropkeep_core::result::AppResult;

use crate::local::MARKER_SUFFIX;

/// A sanitized destination inside the storage root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Final filename, free of separators and dot segments.
    pub filename: String,
    /// Path relative to the root (`subfolder/filename`).
    pub relative: PathBuf,
    /// Absolute destination.
    pub absolute: PathBuf,
}

impl ResolvedTarget {
    /// Relative path with forward slashes, for messages.
    pub fn display_path(&self) -> String {
        self.relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Maps `(subfolder, filename)` pairs to paths under a fixed root.
#[derive(Debug, Clone)]
pub struct PathResolver {
    root: PathBuf,
}

impl PathResolver {
    /// Create a resolver for `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a requested name, optionally inside a subfolder.
    pub fn resolve(&self, subfolder: Option<&str>, filename: &str) -> AppResult<ResolvedTarget> {
        let filename = sanitize_filename(filename)?;
        let folder = match subfolder {
            Some(sub) => sanitize_subfolder(sub)?,
            None => PathBuf::new(),
        };
        let relative = folder.join(&filename);
        let absolute = self.root.join(&relative);
        Ok(ResolvedTarget {
            filename,
            relative,
            absolute,
        })
    }
}

/// Reduce a requested name to its final path component.
///
/// Both `/` and `\` separate components, `.` and empty components are
/// dropped, and `..` removes the previous component. A null byte, a name
/// that reduces to nothing, or a name that would collide with a warning
/// marker is rejected.
pub fn sanitize_filename(raw: &str) -> AppResult<String> {
    let parts = normalize(raw)?;
    let name = parts.last().ok_or_else(|| {
        AppError::path_rejected(format!("empty filename after normalization: {raw:?}"))
    })?;
    if name.ends_with(MARKER_SUFFIX) {
        return Err(AppError::path_rejected(format!(
            "filename may not end with {MARKER_SUFFIX}"
        )));
    }
    Ok(name.to_string())
}

/// Normalize a subfolder into a relative path without dot segments.
pub fn sanitize_subfolder(raw: &str) -> AppResult<PathBuf> {
    Ok(normalize(raw)?.into_iter().collect())
}

fn normalize(raw: &str) -> AppResult<Vec<&str>> {
    if raw.contains('\0') {
        return Err(AppError::path_rejected("null byte in path"));
    }
    let mut parts: Vec<&str> = Vec::new();
    for part in raw.split(['/', '\\']).map(str::trim) {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            _ => parts.push(part),
        }
    }
    Ok(parts)
}
