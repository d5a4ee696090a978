//! Filesorter Watcher - watching roots and running files through intake
//!
//! This crate handles the moving parts around the per-file stages:
//! - Watching directories for newly created files
//! - Running one independent intake task per discovered file
//! - Rescanning roots for files the watcher never saw

mod error;
mod pipeline;
mod scan;
mod watcher;

pub use error::WatchError;
pub use pipeline::{Clock, IntakePipeline, IntakeSettings, Outcome, SkipReason};
pub use scan::{collect_files, rescan, ScanOptions, ScanSummary};
pub use watcher::{FileEvents, FileWatcher};
