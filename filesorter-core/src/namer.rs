//! Descriptive renaming.
//!
//! A name suggestion comes from one of two places: an on-device describer
//! (image or text analysis), or an external command that prints a name on
//! stdout. Both are capabilities behind traits so the pipeline never
//! depends on a concrete backend. Any failure means "no suggestion".

use crate::config::{NamingBackend, NamingSettings, FILE_PATH_PLACEHOLDER};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Longest name a suggestion may produce, in characters.
pub const MAX_SUGGESTION_LEN: usize = 50;

/// On-device analysis that can describe a file in a few words.
///
/// Implementations may block; the namer calls them on a blocking thread.
pub trait Describer: Send + Sync {
    /// Short text describing the file, or None if nothing useful came out.
    fn describe(&self, path: &Path) -> Option<String>;
}

/// Runs a naming command line and captures its output.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` through the shell and returns trimmed stdout.
    ///
    /// Errors carry a human-readable reason for the log.
    async fn run(&self, command: &str, timeout: Duration) -> Result<String, String>;
}

/// Runs commands through the platform shell with tokio.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellCommandRunner;

#[async_trait]
impl CommandRunner for ShellCommandRunner {
    async fn run(&self, command: &str, timeout: Duration) -> Result<String, String> {
        let mut cmd = shell_command(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| format!("spawn failed: {}", e))?;
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("wait failed: {}", e)),
            Err(_) => return Err(format!("timed out after {:?}", timeout)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("exited with {}: {}", output.status, stderr.trim()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Keeps only characters that are safe in a file name and trims the result.
///
/// Allowed: alphanumerics, spaces, periods, underscores and hyphens.
/// Path separators are dropped, so a suggestion can never escape its
/// category directory.
pub fn sanitize_suggestion(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-'))
        .collect();
    kept.trim().chars().take(MAX_SUGGESTION_LEN).collect()
}

/// Proposes replacement base names for incoming files.
pub struct Namer {
    settings: NamingSettings,
    describer: Option<Arc<dyn Describer>>,
    runner: Arc<dyn CommandRunner>,
}

impl Namer {
    /// Builds a namer using the shell for command templates.
    ///
    /// `describer` is None on hosts without an on-device backend; native
    /// naming then silently yields nothing.
    pub fn new(settings: NamingSettings, describer: Option<Arc<dyn Describer>>) -> Self {
        Self::with_runner(settings, describer, Arc::new(ShellCommandRunner))
    }

    pub fn with_runner(
        settings: NamingSettings,
        describer: Option<Arc<dyn Describer>>,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            settings,
            describer,
            runner,
        }
    }

    /// Checks whether files with this lower-cased extension get named.
    pub fn applies_to(&self, extension: &str) -> bool {
        self.settings.enabled && self.settings.extensions.iter().any(|e| e == extension)
    }

    /// Returns a sanitized, extension-less name suggestion, if any.
    pub async fn suggest(&self, path: &Path, extension: &str) -> Option<String> {
        if !self.applies_to(extension) {
            return None;
        }

        let raw = match &self.settings.backend {
            NamingBackend::Native => self.describe(path).await?,
            NamingBackend::Command(template) => self.run_command(template, path).await?,
        };

        let name = sanitize_suggestion(&raw);
        if name.is_empty() {
            debug!("Naming output for {} was empty after sanitizing", path.display());
            return None;
        }
        Some(name)
    }

    async fn describe(&self, path: &Path) -> Option<String> {
        let describer = match &self.describer {
            Some(d) => Arc::clone(d),
            None => {
                debug!("No on-device describer available, keeping original name");
                return None;
            }
        };

        let owned = path.to_path_buf();
        match tokio::task::spawn_blocking(move || describer.describe(&owned)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Describer failed for {}: {}", path.display(), e);
                None
            }
        }
    }

    async fn run_command(&self, template: &str, path: &Path) -> Option<String> {
        let path_str = path.to_string_lossy();
        let command = template.replace(FILE_PATH_PLACEHOLDER, &path_str);

        match self.runner.run(&command, self.settings.command_timeout).await {
            Ok(output) if output.is_empty() || output == path_str => None,
            Ok(output) => Some(output),
            Err(e) => {
                warn!("Naming command failed for {}: {}", path.display(), e);
                None
            }
        }
    }
}
