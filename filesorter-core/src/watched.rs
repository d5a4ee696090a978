//! The path being processed, split into the parts the pipeline matches on.

use std::path::{Path, PathBuf};

/// A discovered file with its name and extension pulled out.
///
/// Lives only for one intake run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPath {
    path: PathBuf,
    file_name: String,
    /// Extension as written on disk, without the dot.
    extension: Option<String>,
}

impl WatchedPath {
    /// Returns None for paths without a file name (`/`, `..`).
    pub fn new(path: impl Into<PathBuf>) -> Option<Self> {
        let path = path.into();
        let file_name = path.file_name()?.to_string_lossy().into_owned();
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .filter(|e| !e.is_empty());
        Some(Self {
            path,
            file_name,
            extension,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Extension with its original casing.
    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    /// Lower-cased extension, used for every lookup.
    pub fn extension_key(&self) -> Option<String> {
        self.extension.as_ref().map(|e| e.to_lowercase())
    }
}
