//! Manual rescan of the watched roots.
//!
//! Watching only sees files created while it runs. Files that arrived
//! while the sorter was down, or that were skipped as not yet stable,
//! are picked up by walking the roots and feeding every regular file
//! through the same pipeline.

use crate::pipeline::{IntakePipeline, Outcome};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Options for walking the roots.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Follow symbolic links when walking directories.
    pub follow_symlinks: bool,

    /// Subtree never descended into, normally the destination root.
    pub exclude: Option<PathBuf>,
}

/// Tally of a finished rescan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub discovered: usize,
    pub relocated: usize,
    pub skipped: usize,
    pub failed: usize,

    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

impl ScanSummary {
    fn record(&mut self, outcome: &Outcome) {
        match outcome {
            Outcome::Relocated(_) => self.relocated += 1,
            Outcome::Skipped(_) => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Lists every regular file under the roots.
///
/// Unreadable entries are logged and skipped.
pub fn collect_files(roots: &[PathBuf], options: &ScanOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for root in roots {
        let walker = WalkDir::new(root)
            .follow_links(options.follow_symlinks)
            .into_iter()
            .filter_entry(|entry| !is_excluded(entry.path(), options.exclude.as_deref()));

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
    }

    debug!("Found {} files under {} roots", files.len(), roots.len());
    files
}

fn is_excluded(path: &Path, exclude: Option<&Path>) -> bool {
    exclude.is_some_and(|ex| path.starts_with(ex))
}

/// Walks the roots and runs every file through the pipeline concurrently,
/// waiting for all runs to finish.
pub async fn rescan(
    pipeline: &IntakePipeline,
    roots: &[PathBuf],
    options: &ScanOptions,
) -> ScanSummary {
    let start = Instant::now();
    let files = collect_files(roots, options);
    let mut summary = ScanSummary {
        discovered: files.len(),
        ..ScanSummary::default()
    };

    info!("Rescanning {} files", files.len());

    let handles: Vec<_> = files.into_iter().map(|f| pipeline.spawn(f)).collect();
    for handle in handles {
        match handle.await {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                warn!("Intake task aborted: {}", e);
                summary.failed += 1;
            }
        }
    }

    summary.duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Rescan done: {} relocated, {} skipped, {} failed in {}ms",
        summary.relocated, summary.skipped, summary.failed, summary.duration_ms
    );
    summary
}
