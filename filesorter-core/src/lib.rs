//! Filesorter Core - the per-file building blocks of the intake pipeline
//!
//! Each stage here works on a single file and knows nothing about
//! watching or scheduling:
//! - `stability` decides when a file has stopped being written
//! - `namer` optionally proposes a descriptive name
//! - `classifier` maps an extension to a category
//! - `relocator` moves the file into its category without overwriting
//!
//! # Example
//!
//! ```no_run
//! use filesorter_core::{Classifier, Relocator};
//! use std::path::Path;
//!
//! let classifier = Classifier::from_table([("pdf", "DOCUMENTS")]);
//! let category = classifier.classify(Some("pdf"));
//! let relocator = Relocator::new("/srv/sorted");
//! let dest = relocator
//!     .relocate(Path::new("/home/me/Downloads/report.pdf"), &category, "report.pdf")
//!     .unwrap();
//! println!("moved to {}", dest.display());
//! ```

pub mod classifier;
pub mod config;
pub mod error;
pub mod filter;
pub mod namer;
pub mod relocator;
pub mod stability;
pub mod watched;

pub use classifier::{Classifier, UNKNOWN_CATEGORY};
pub use config::{Config, ConfigLoader, NamingBackend, NamingSettings, StabilitySettings};
pub use error::{Result, SorterError};
pub use filter::{is_ignored, is_transient};
pub use namer::{sanitize_suggestion, CommandRunner, Describer, Namer, ShellCommandRunner};
pub use relocator::{free_destination, Relocator};
pub use stability::{Readiness, StabilityProber};
pub use watched::WatchedPath;
