//! The intake pipeline.
//!
//! Every discovered path gets its own tokio task that walks a linear
//! state machine:
//!
//! ```text
//! DISCOVERED -> DEBOUNCED -> filtered -> STABILITY-CHECKED -> (NAMED)
//!            -> CLASSIFIED -> RELOCATED | SKIPPED | FAILED
//! ```
//!
//! Blocking work (stability polling, the move itself) runs on tokio's
//! blocking pool, so a slow file never holds up the others. The only state
//! shared between runs is the relocator's per-directory locking.
//!
//! Errors never leave a run. They end up as an [`Outcome`] and a log line.

use crate::watcher::FileEvents;
use chrono::NaiveDate;
use filesorter_core::{
    is_ignored, is_transient, Classifier, Config, Describer, Namer, Readiness, Relocator,
    SorterError, StabilityProber, WatchedPath,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Supplies the date used for `[YYYY-MM-DD] ` prefixes.
pub type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Pipeline knobs that aren't owned by one of the stages.
#[derive(Debug, Clone)]
pub struct IntakeSettings {
    /// Debounce before a new file is inspected at all.
    pub action_delay: Duration,

    /// Lower-cased extensions that are never relocated.
    pub ignored_extensions: Vec<String>,

    /// Prefix destination names with the processing date.
    pub include_date: bool,
}

impl IntakeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            action_delay: config.action_delay(),
            ignored_extensions: config.ignored_extensions(),
            include_date: config.include_date,
        }
    }
}

/// Why a file was left where it was without it being an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Extension is on the ignore list.
    Ignored,
    /// Name looks like a partial download, temp or lock file.
    Transient,
    /// The file already lives under the destination root.
    InsideDestination,
    /// Still being written, or locked, when the probe gave up.
    NotStable,
    /// Gone before we got to it, usually a duplicate notification.
    Vanished,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Ignored => "ignored extension",
            Self::Transient => "transient file",
            Self::InsideDestination => "inside destination",
            Self::NotStable => "not stable",
            Self::Vanished => "vanished",
        };
        write!(f, "{}", s)
    }
}

/// How one intake run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Relocated(PathBuf),
    Skipped(SkipReason),
    Failed(String),
}

struct Stages {
    settings: IntakeSettings,
    prober: StabilityProber,
    namer: Namer,
    classifier: Classifier,
    relocator: Relocator,
}

/// Cheap-to-clone handle to the pipeline. One per process.
#[derive(Clone)]
pub struct IntakePipeline {
    stages: Arc<Stages>,
    clock: Clock,
}

impl IntakePipeline {
    pub fn new(
        settings: IntakeSettings,
        prober: StabilityProber,
        namer: Namer,
        classifier: Classifier,
        relocator: Relocator,
    ) -> Self {
        Self {
            stages: Arc::new(Stages {
                settings,
                prober,
                namer,
                classifier,
                relocator,
            }),
            clock: Arc::new(|| chrono::Local::now().date_naive()),
        }
    }

    /// Builds every stage from the loaded config.
    ///
    /// `describer` is the on-device naming backend, if this host has one.
    /// The category table is read once here; if it can't be read, files
    /// fall back to their extension as category.
    pub fn from_config(config: &Config, describer: Option<Arc<dyn Describer>>) -> Self {
        Self::new(
            IntakeSettings::from_config(config),
            StabilityProber::new(config.stability_settings()),
            Namer::new(config.naming_settings(), describer),
            Classifier::load_or_empty(&config.data_types),
            Relocator::new(config.database.clone()),
        )
    }

    /// Replaces the date source used for prefixes.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Destination root of the relocator.
    pub fn destination_root(&self) -> &Path {
        self.stages.relocator.root()
    }

    /// Consumes watcher events until the stream ends, one task per event.
    ///
    /// Tasks are detached. Nothing waits for them when the stream closes.
    pub async fn run(&self, mut events: FileEvents) {
        while let Some(path) = events.recv().await {
            self.spawn(path);
        }
        debug!("Event stream closed");
    }

    /// Starts an independent intake run for one path.
    pub fn spawn(&self, path: PathBuf) -> JoinHandle<Outcome> {
        let pipeline = self.clone();
        tokio::spawn(async move { pipeline.process(path).await })
    }

    /// Runs the whole state machine for one path.
    pub async fn process(&self, path: PathBuf) -> Outcome {
        debug!("Discovered {}", path.display());
        let stages = &self.stages;

        let watched = match WatchedPath::new(&path) {
            Some(w) => w,
            None => return skip(&path, SkipReason::Vanished),
        };

        if !stages.settings.action_delay.is_zero() {
            tokio::time::sleep(stages.settings.action_delay).await;
        }

        if path.starts_with(stages.relocator.root()) {
            return skip(&path, SkipReason::InsideDestination);
        }
        if is_ignored(&watched, &stages.settings.ignored_extensions) {
            return skip(&path, SkipReason::Ignored);
        }
        if is_transient(watched.file_name()) {
            return skip(&path, SkipReason::Transient);
        }

        match self.probe(&path).await {
            Readiness::Ready => {}
            Readiness::Vanished => return skip(&path, SkipReason::Vanished),
            other => {
                info!("Skipping {}: {}", path.display(), other);
                return Outcome::Skipped(SkipReason::NotStable);
            }
        }

        let working_name = self.working_name(&watched).await;
        let category = stages.classifier.classify(watched.extension());
        let final_name = if stages.settings.include_date {
            date_prefixed(&working_name, (self.clock)())
        } else {
            working_name
        };

        self.relocate(path, category, final_name).await
    }

    async fn probe(&self, path: &Path) -> Readiness {
        let prober = self.stages.prober;
        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || prober.check(&owned)).await {
            Ok(readiness) => readiness,
            Err(e) => {
                error!("Stability probe crashed for {}: {}", path.display(), e);
                Readiness::TimedOut
            }
        }
    }

    /// Original file name, or the namer's suggestion with the extension kept.
    async fn working_name(&self, watched: &WatchedPath) -> String {
        let (Some(ext), Some(key)) = (watched.extension(), watched.extension_key()) else {
            return watched.file_name().to_string();
        };
        if !self.stages.namer.applies_to(&key) {
            return watched.file_name().to_string();
        }

        match self.stages.namer.suggest(watched.path(), &key).await {
            Some(suggestion) => {
                let name = with_extension(&suggestion, ext);
                info!("Suggested name for {}: {}", watched.path().display(), name);
                name
            }
            None => watched.file_name().to_string(),
        }
    }

    async fn relocate(&self, path: PathBuf, category: String, file_name: String) -> Outcome {
        let stages = Arc::clone(&self.stages);
        let source = path.clone();
        let result = tokio::task::spawn_blocking(move || {
            stages.relocator.relocate(&source, &category, &file_name)
        })
        .await;

        match result {
            Ok(Ok(destination)) => Outcome::Relocated(destination),
            Ok(Err(SorterError::SourceMissing(_))) => skip(&path, SkipReason::Vanished),
            Ok(Err(e)) => {
                error!("Move failed for {}: {}", path.display(), e);
                Outcome::Failed(e.to_string())
            }
            Err(e) => {
                error!("Move task crashed for {}: {}", path.display(), e);
                Outcome::Failed(e.to_string())
            }
        }
    }
}

fn skip(path: &Path, reason: SkipReason) -> Outcome {
    debug!("Skipping {}: {}", path.display(), reason);
    Outcome::Skipped(reason)
}

/// Appends `.ext` unless the name already ends with it (any case).
fn with_extension(name: &str, ext: &str) -> String {
    let suffix = format!(".{}", ext.to_lowercase());
    if name.to_lowercase().ends_with(&suffix) {
        name.to_string()
    } else {
        format!("{}.{}", name, ext)
    }
}

fn date_prefixed(file_name: &str, date: NaiveDate) -> String {
    format!("[{}] {}", date.format("%Y-%m-%d"), file_name)
}
