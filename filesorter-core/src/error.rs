//! Error types for the intake core.
//!
//! Only configuration problems are meant to be fatal. Everything that can
//! go wrong with a single file is reported here so the pipeline can turn
//! it into a logged outcome instead of stopping.

use std::path::PathBuf;
use thiserror::Error;

/// Convenience type for fallible core operations.
pub type Result<T> = std::result::Result<T, SorterError>;

/// Things that can go wrong while loading config or moving a file.
#[derive(Error, Debug)]
pub enum SorterError {
    /// Filesystem access failed for a specific path.
    #[error("i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No `config.json` exists and there is no template to create one from.
    #[error("default config template not found at '{0}'")]
    ConfigTemplateMissing(PathBuf),

    /// The config file exists but is not valid JSON for our schema.
    #[error("failed to parse config '{path}': {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The config parsed but holds values we can't work with.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// The file to relocate is gone. Usually a duplicate notification
    /// for a file that was already moved.
    #[error("source file no longer exists: '{0}'")]
    SourceMissing(PathBuf),

    /// Rename and copy fallback both failed. The source is left in place.
    #[error("failed to move '{from}' to '{to}': {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SorterError {
    /// Creates an IO error with the path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
