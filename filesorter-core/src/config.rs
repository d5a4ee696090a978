//! Configuration model and first-run bootstrap.
//!
//! The config lives as `config.json` inside a config directory. On first
//! run it is created from `default_config.json` sitting next to it. A
//! missing template is the one startup error we can't recover from.

use crate::error::{Result, SorterError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// File name of the live config inside the config directory.
pub const CONFIG_FILE: &str = "config.json";

/// File name of the bundled template used on first run.
pub const DEFAULT_CONFIG_FILE: &str = "default_config.json";

/// Value of `ai_command` that selects the on-device describer.
pub const NATIVE_BACKEND: &str = "native";

/// Placeholder substituted with the file path in a naming command.
pub const FILE_PATH_PLACEHOLDER: &str = "{file_path}";

/// Everything the sorter needs to know, as persisted in `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Roots watched recursively for new files.
    pub directories: Vec<PathBuf>,

    /// Extensions (without the dot) that are never relocated.
    #[serde(default)]
    pub ignore_filetypes: Vec<String>,

    /// Prefix destination names with `[YYYY-MM-DD] `.
    #[serde(default = "default_true")]
    pub include_date: bool,

    /// Destination root. Categories become its child directories.
    pub database: PathBuf,

    /// Debounce delay in seconds before a new file is looked at.
    #[serde(default = "default_action_delay")]
    pub file_action_delay: f64,

    /// Part of the persisted schema; naming is driven by `ai_enabled`.
    #[serde(default)]
    pub rename_files: bool,

    #[serde(default = "default_stability_checks")]
    pub file_stability_checks: u32,

    /// Seconds.
    #[serde(default = "default_stability_timeout")]
    pub file_stability_timeout: u64,

    /// Seconds between stability polls.
    #[serde(default = "default_check_interval")]
    pub file_check_interval: f64,

    #[serde(default)]
    pub ai_enabled: bool,

    #[serde(default)]
    pub ai_enabled_extensions: Vec<String>,

    /// Either `"native"` or a shell template containing `{file_path}`.
    #[serde(default = "default_ai_command")]
    pub ai_command: String,

    /// Upper bound in seconds for a naming command run.
    #[serde(default = "default_ai_command_timeout")]
    pub ai_command_timeout: u64,

    /// Path to the extension -> category JSON table.
    #[serde(default = "default_data_types")]
    pub data_types: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_action_delay() -> f64 {
    1.0
}

fn default_stability_checks() -> u32 {
    5
}

fn default_stability_timeout() -> u64 {
    300
}

fn default_check_interval() -> f64 {
    2.0
}

fn default_ai_command() -> String {
    NATIVE_BACKEND.to_string()
}

fn default_ai_command_timeout() -> u64 {
    30
}

fn default_data_types() -> PathBuf {
    PathBuf::from("config/data_types.json")
}

/// Which naming backend `ai_command` selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamingBackend {
    /// Ask the on-device describer, if this host has one.
    Native,
    /// Run a shell command built from this template.
    Command(String),
}

/// Parameters for the stability prober, in real units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilitySettings {
    pub required_checks: u32,
    pub interval: Duration,
    pub timeout: Duration,
}

/// Parameters for the naming step.
#[derive(Debug, Clone)]
pub struct NamingSettings {
    pub enabled: bool,
    /// Lower-cased extensions eligible for naming.
    pub extensions: Vec<String>,
    pub backend: NamingBackend,
    pub command_timeout: Duration,
}

impl Config {
    /// Parses a config from a JSON string and validates it.
    ///
    /// `~` at the start of any path is expanded to the home directory, and
    /// relative paths are resolved against the working directory so watch
    /// roots and the destination compare as absolute paths.
    pub fn from_json(source: &str, origin: &Path) -> Result<Self> {
        let mut config: Config =
            serde_json::from_str(source).map_err(|e| SorterError::ConfigParse {
                path: origin.to_path_buf(),
                source: e,
            })?;

        config.directories = config.directories.iter().map(|d| expand_home(d)).collect();
        config.database = expand_home(&config.database);
        config.data_types = expand_home(&config.data_types);

        config.validate()?;
        match std::env::current_dir() {
            Ok(cwd) => config.resolve_against(&cwd),
            Err(e) => warn!("Working directory unavailable, paths left relative: {}", e),
        }
        Ok(config)
    }

    /// Joins every relative path onto `base`.
    pub fn resolve_against(&mut self, base: &Path) {
        for dir in &mut self.directories {
            *dir = absolutize(dir, base);
        }
        self.database = absolutize(&self.database, base);
        self.data_types = absolutize(&self.data_types, base);
    }

    /// Reads and validates the config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| SorterError::io(path, e))?;
        Self::from_json(&source, path)
    }

    fn validate(&self) -> Result<()> {
        if self.directories.is_empty() {
            return Err(SorterError::InvalidConfig(
                "at least one watch directory is required".into(),
            ));
        }
        if self.database.as_os_str().is_empty() {
            return Err(SorterError::InvalidConfig("database path is empty".into()));
        }
        for (name, value) in [
            ("file_action_delay", self.file_action_delay),
            ("file_check_interval", self.file_check_interval),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SorterError::InvalidConfig(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
        }
        if self.naming_backend() != NamingBackend::Native
            && !self.ai_command.contains(FILE_PATH_PLACEHOLDER)
        {
            return Err(SorterError::InvalidConfig(format!(
                "ai_command must be \"{}\" or contain {}",
                NATIVE_BACKEND, FILE_PATH_PLACEHOLDER
            )));
        }
        Ok(())
    }

    /// Which naming backend `ai_command` selects.
    pub fn naming_backend(&self) -> NamingBackend {
        if self.ai_command.trim() == NATIVE_BACKEND {
            NamingBackend::Native
        } else {
            NamingBackend::Command(self.ai_command.clone())
        }
    }

    /// Debounce delay as a `Duration`.
    pub fn action_delay(&self) -> Duration {
        Duration::from_secs_f64(self.file_action_delay)
    }

    pub fn stability_settings(&self) -> StabilitySettings {
        StabilitySettings {
            required_checks: self.file_stability_checks,
            interval: Duration::from_secs_f64(self.file_check_interval),
            timeout: Duration::from_secs(self.file_stability_timeout),
        }
    }

    pub fn naming_settings(&self) -> NamingSettings {
        NamingSettings {
            enabled: self.ai_enabled,
            extensions: normalize_extensions(&self.ai_enabled_extensions),
            backend: self.naming_backend(),
            command_timeout: Duration::from_secs(self.ai_command_timeout),
        }
    }

    /// Lower-cased ignore list with any leading dots stripped.
    pub fn ignored_extensions(&self) -> Vec<String> {
        normalize_extensions(&self.ignore_filetypes)
    }
}

fn normalize_extensions(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Expands a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match dirs::home_dir() {
        Some(home) => home.join(rest),
        None => path.to_path_buf(),
    }
}

fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// Locates, bootstraps and loads the config inside a config directory.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE)
    }

    pub fn template_path(&self) -> PathBuf {
        self.config_dir.join(DEFAULT_CONFIG_FILE)
    }

    /// Creates `config.json` from the template if it doesn't exist yet.
    ///
    /// Returns `true` when a new config was written.
    pub fn ensure_config(&self) -> Result<bool> {
        let config_path = self.config_path();
        if config_path.exists() {
            return Ok(false);
        }

        fs::create_dir_all(&self.config_dir).map_err(|e| SorterError::io(&self.config_dir, e))?;

        let template_path = self.template_path();
        let template = match fs::read_to_string(&template_path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SorterError::ConfigTemplateMissing(template_path));
            }
            Err(e) => return Err(SorterError::io(&template_path, e)),
        };

        // Round-trip through serde_json so a malformed template fails here
        // rather than on every later start.
        let value: serde_json::Value =
            serde_json::from_str(&template).map_err(|e| SorterError::ConfigParse {
                path: template_path.clone(),
                source: e,
            })?;
        let pretty = serde_json::to_string_pretty(&value).map_err(|e| SorterError::ConfigParse {
            path: template_path,
            source: e,
        })?;
        fs::write(&config_path, pretty).map_err(|e| SorterError::io(&config_path, e))?;

        info!("Created config {} from template", config_path.display());
        Ok(true)
    }

    /// Bootstraps if needed, then loads the config.
    pub fn load(&self) -> Result<Config> {
        self.ensure_config()?;
        let path = self.config_path();
        info!("Using config {}", path.display());
        Config::load(&path)
    }
}
