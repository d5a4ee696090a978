//! Stability probing.
//!
//! There is no portable "writer closed the file" event, so we poll size and
//! mtime until they hold still for a number of consecutive samples. An
//! advisory lock check runs first so a writer that does lock is caught
//! immediately.

use crate::config::StabilitySettings;
use fs4::fs_std::FileExt;
use std::fs::{self, File};
use std::path::Path;
use std::thread;
use std::time::{Instant, SystemTime};
use tracing::debug;

/// Why a probe finished the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Size and mtime held still for the required number of polls.
    Ready,
    /// Another process holds an exclusive lock on the file.
    Locked,
    /// The file kept changing past the timeout.
    TimedOut,
    /// The file disappeared or became unreadable while polling.
    Vanished,
}

impl Readiness {
    pub fn is_ready(self) -> bool {
        self == Readiness::Ready
    }
}

impl std::fmt::Display for Readiness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ready => "ready",
            Self::Locked => "locked by another process",
            Self::TimedOut => "still changing at timeout",
            Self::Vanished => "gone or inaccessible",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sample {
    size: u64,
    modified: Option<SystemTime>,
}

/// Decides whether a file has stopped being written.
///
/// Each call is an independent probe. `check` blocks the calling thread
/// for the whole polling period, so async callers should run it on a
/// blocking pool.
#[derive(Debug, Clone, Copy)]
pub struct StabilityProber {
    settings: StabilitySettings,
}

impl StabilityProber {
    pub fn new(settings: StabilitySettings) -> Self {
        Self { settings }
    }

    /// Returns true once the file is judged stable.
    pub fn is_ready(&self, path: &Path) -> bool {
        self.check(path).is_ready()
    }

    /// Runs a full probe and reports why it ended.
    pub fn check(&self, path: &Path) -> Readiness {
        if is_locked_elsewhere(path) {
            debug!("{} is locked by another process", path.display());
            return Readiness::Locked;
        }

        let start = Instant::now();
        let mut last: Option<Sample> = None;
        let mut stable_count: u32 = 0;

        loop {
            if start.elapsed() > self.settings.timeout {
                return Readiness::TimedOut;
            }

            let sample = match sample(path) {
                Some(s) => s,
                None => return Readiness::Vanished,
            };

            if last == Some(sample) {
                stable_count += 1;
            } else {
                stable_count = 0;
                last = Some(sample);
            }

            if stable_count >= self.settings.required_checks {
                debug!(
                    "{} stable after {:?} ({} checks)",
                    path.display(),
                    start.elapsed(),
                    stable_count
                );
                return Readiness::Ready;
            }

            thread::sleep(self.settings.interval);
        }
    }
}

fn sample(path: &Path) -> Option<Sample> {
    let meta = fs::metadata(path).ok()?;
    if !meta.is_file() {
        return None;
    }
    Some(Sample {
        size: meta.len(),
        modified: meta.modified().ok(),
    })
}

/// Best-effort exclusive lock test.
///
/// Only a definite "someone else holds it" counts. Open failures and
/// filesystems without lock support fall through to polling, which
/// reports a missing file on its own.
fn is_locked_elsewhere(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    match FileExt::try_lock_exclusive(&file) {
        Ok(true) => {
            if let Err(e) = FileExt::unlock(&file) {
                debug!("Failed to release probe lock on {}: {}", path.display(), e);
            }
            false
        }
        Ok(false) => true,
        Err(e) => {
            debug!("Lock probe unsupported for {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tempfile::tempdir;

    fn prober(required_checks: u32, interval_ms: u64, timeout_ms: u64) -> StabilityProber {
        StabilityProber::new(StabilitySettings {
            required_checks,
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    #[test]
    fn test_still_file_is_ready() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("done.txt");
        fs::write(&path, "finished").unwrap();

        let start = Instant::now();
        assert_eq!(prober(3, 10, 5_000).check(&path), Readiness::Ready);
        // One sample to start plus three stable ones.
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_missing_file_vanished() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        assert_eq!(prober(2, 10, 1_000).check(&path), Readiness::Vanished);
        assert!(!prober(2, 10, 1_000).is_ready(&path));
    }

    #[test]
    fn test_directory_is_not_ready() {
        let dir = tempdir().unwrap();
        assert_eq!(prober(1, 10, 1_000).check(dir.path()), Readiness::Vanished);
    }

    #[test]
    fn test_growing_file_times_out() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("growing.bin");
        fs::write(&path, b"x").unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let writer = {
            let path = path.clone();
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
                while !stop.load(Ordering::SeqCst) {
                    file.write_all(b"more").unwrap();
                    file.flush().unwrap();
                    thread::sleep(Duration::from_millis(5));
                }
            })
        };

        let start = Instant::now();
        let result = prober(3, 20, 300).check(&path);
        stop.store(true, Ordering::SeqCst);
        writer.join().unwrap();

        assert_eq!(result, Readiness::TimedOut);
        // Timeout is checked before each poll, so overshoot is one interval.
        assert!(start.elapsed() < Duration::from_millis(300 + 200));
    }

    #[test]
    fn test_ready_only_after_writes_stop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        fs::write(&path, b"x").unwrap();

        let last_write = Arc::new(Mutex::new(Instant::now()));
        let writer = {
            let path = path.clone();
            let last_write = Arc::clone(&last_write);
            thread::spawn(move || {
                let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
                for _ in 0..6 {
                    thread::sleep(Duration::from_millis(10));
                    // Stamped before the write so any sample seeing it comes later.
                    *last_write.lock().unwrap() = Instant::now();
                    file.write_all(b"chunk").unwrap();
                    file.flush().unwrap();
                }
            })
        };

        let required_checks = 3;
        let interval = Duration::from_millis(20);
        let result = prober(required_checks, 20, 5_000).check(&path);
        let ready_at = Instant::now();
        writer.join().unwrap();

        assert_eq!(result, Readiness::Ready);
        let quiet = ready_at.saturating_duration_since(*last_write.lock().unwrap());
        // The first sample after the last write resets the count, then
        // `required_checks` more polls must agree.
        assert!(quiet >= interval * required_checks, "ready after only {:?}", quiet);
        assert!(
            quiet < interval * (required_checks + 1) + Duration::from_millis(500),
            "ready too late: {:?}",
            quiet
        );
    }

    #[test]
    fn test_locked_file_not_ready() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("locked.db");
        fs::write(&path, "data").unwrap();

        let holder = File::open(&path).unwrap();
        if !FileExt::try_lock_exclusive(&holder).unwrap_or(false) {
            // No advisory lock support on this filesystem.
            return;
        }

        assert_eq!(prober(1, 10, 1_000).check(&path), Readiness::Locked);

        FileExt::unlock(&holder).unwrap();
        assert_eq!(prober(1, 10, 1_000).check(&path), Readiness::Ready);
    }

    #[test]
    fn test_each_probe_is_independent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("again.txt");
        fs::write(&path, "v1").unwrap();
        let p = prober(2, 10, 1_000);
        assert!(p.is_ready(&path));

        fs::remove_file(&path).unwrap();
        assert!(!p.is_ready(&path));

        fs::write(&path, "v2").unwrap();
        assert!(p.is_ready(&path));
    }
}
