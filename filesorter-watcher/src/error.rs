//! Errors from setting up directory watches.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WatchError {
    /// A configured watch root doesn't exist or isn't a directory.
    #[error("watch root '{0}' is not a directory")]
    MissingRoot(PathBuf),

    /// The OS notification backend refused the watch.
    #[error("failed to watch '{root}': {source}")]
    Notify {
        root: PathBuf,
        #[source]
        source: notify::Error,
    },
}
