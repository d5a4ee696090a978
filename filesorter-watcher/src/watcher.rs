//! Directory watcher for newly created files.
//!
//! Uses the notify crate for OS notifications. A dedicated thread owns the
//! notify handle, filters its events down to regular-file creations and
//! forwards the paths into a tokio channel. Stopping the watcher raises a
//! flag the thread checks before every forward, so a queued backlog is
//! dropped rather than delivered, then joins the thread and the channel
//! closes.

use crate::error::WatchError;
use notify::event::CreateKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Stream of absolute paths, one per observed file creation.
///
/// The same path may show up more than once.
pub type FileEvents = UnboundedReceiver<PathBuf>;

enum Signal {
    Event(notify::Result<Event>),
    Stop,
}

/// Watches a set of roots recursively until stopped.
pub struct FileWatcher {
    control: Sender<Signal>,
    stopping: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Starts watching every root and returns the watcher plus its events.
    ///
    /// Fails without starting anything if any root is missing or can't be
    /// watched.
    pub fn start(roots: &[PathBuf]) -> Result<(Self, FileEvents), WatchError> {
        let (control_tx, control_rx) = channel();
        let (events_tx, events_rx) = unbounded_channel();

        let callback_tx = control_tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // The receiver only goes away after a stop, when nobody cares.
            let _ = callback_tx.send(Signal::Event(res));
        })
        .map_err(|source| WatchError::Notify {
            root: roots.first().cloned().unwrap_or_default(),
            source,
        })?;

        for root in roots {
            if !root.is_dir() {
                return Err(WatchError::MissingRoot(root.clone()));
            }
            watcher
                .watch(root, RecursiveMode::Recursive)
                .map_err(|source| WatchError::Notify {
                    root: root.clone(),
                    source,
                })?;
            info!("Watching {} for new files", root.display());
        }

        let stopping = Arc::new(AtomicBool::new(false));
        let thread_stopping = Arc::clone(&stopping);
        let worker = thread::Builder::new()
            .name("filesorter-watcher".into())
            .spawn(move || {
                // Keep the notify handle alive for as long as we forward.
                let _watcher = watcher;
                pump(control_rx, events_tx, &thread_stopping);
                debug!("Watcher thread exiting");
            })
            .map_err(|e| WatchError::Notify {
                root: roots.first().cloned().unwrap_or_default(),
                source: notify::Error::io(e),
            })?;

        Ok((
            Self {
                control: control_tx,
                stopping,
                worker: Some(worker),
            },
            events_rx,
        ))
    }

    /// Stops delivery and waits for the watcher thread to finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.stopping.store(true, Ordering::SeqCst);
            // Wakes the thread if the queue is empty.
            let _ = self.control.send(Signal::Stop);
            if worker.join().is_err() {
                warn!("Watcher thread panicked");
            }
            info!("Watcher stopped");
        }
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Forwards creations until stopped or the receiving side goes away.
fn pump(
    control_rx: Receiver<Signal>,
    events_tx: UnboundedSender<PathBuf>,
    stopping: &AtomicBool,
) {
    for signal in control_rx {
        if stopping.load(Ordering::SeqCst) {
            break;
        }
        match signal {
            Signal::Stop => break,
            Signal::Event(Ok(event)) => {
                if !forward_created(&event, &events_tx) {
                    break;
                }
            }
            Signal::Event(Err(e)) => warn!("Watch error: {}", e),
        }
    }
}

/// Sends the file paths created by `event`. Returns false once the
/// receiving side is gone.
fn forward_created(event: &Event, tx: &UnboundedSender<PathBuf>) -> bool {
    for path in created_files(event) {
        debug!("File created: {}", path.display());
        if tx.send(path).is_err() {
            return false;
        }
    }
    true
}

/// Regular-file paths created by this event.
///
/// Some backends only report `CreateKind::Any`, so anything that is a
/// directory on disk is dropped as well.
fn created_files(event: &Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(CreateKind::Folder) => Vec::new(),
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .cloned()
            .collect(),
        _ => Vec::new(),
    }
}
