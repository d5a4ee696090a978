//! CLI command implementations.

use colored::Colorize;
use filesorter_core::{Config, ConfigLoader, Describer, NamingBackend};
use filesorter_watcher::{rescan, FileWatcher, IntakePipeline, ScanOptions};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

/// Create `config.json` from the template in the config directory.
pub fn init(config_dir: &Path) -> Result<()> {
    let loader = ConfigLoader::new(config_dir);

    if loader.ensure_config()? {
        println!(
            "{} Created {}",
            "✓".green(),
            loader.config_path().display()
        );
        println!("  Edit it, then run {} to start sorting", "filesorter run".cyan());
    } else {
        println!(
            "{} Already initialized ({})",
            "✓".green(),
            loader.config_path().display()
        );
    }

    Ok(())
}

/// Watch the configured folders until SIGINT or SIGTERM.
pub async fn run(config_dir: &Path) -> Result<()> {
    let config = ConfigLoader::new(config_dir).load()?;
    let pipeline = build_pipeline(&config)?;

    let (watcher, events) = FileWatcher::start(&config.directories)?;
    let intake = {
        let pipeline = pipeline.clone();
        tokio::spawn(async move { pipeline.run(events).await })
    };

    info!("File sorter running. Ctrl+C to stop");
    println!("  Press {} to stop", "Ctrl+C".cyan());

    wait_for_shutdown().await?;

    info!("Shutting down");
    watcher.stop();
    // In-flight files are abandoned, not awaited.
    intake.abort();

    Ok(())
}

/// Sort whatever already sits in the watched folders, then return.
pub async fn scan(config_dir: &Path, follow_symlinks: bool) -> Result<()> {
    let config = ConfigLoader::new(config_dir).load()?;
    let pipeline = build_pipeline(&config)?;

    let options = ScanOptions {
        follow_symlinks,
        exclude: Some(pipeline.destination_root().to_path_buf()),
    };
    let summary = rescan(&pipeline, &config.directories, &options).await;

    println!(
        "{} {} files: {} moved, {} skipped, {} failed in {}ms",
        "✓".green(),
        summary.discovered.to_string().cyan(),
        summary.relocated.to_string().green(),
        summary.skipped.to_string().yellow(),
        summary.failed.to_string().red(),
        summary.duration_ms
    );

    Ok(())
}

fn build_pipeline(config: &Config) -> Result<IntakePipeline> {
    std::fs::create_dir_all(&config.database)?;

    let describer = native_describer();
    if config.ai_enabled
        && describer.is_none()
        && config.naming_backend() == NamingBackend::Native
    {
        warn!("No on-device describer on this host; files keep their names");
    }

    Ok(IntakePipeline::from_config(config, describer))
}

/// The on-device image/text describer for this platform.
///
/// No backend ships with this build, so native naming degrades to
/// keeping the original name.
fn native_describer() -> Option<Arc<dyn Describer>> {
    None
}

#[cfg(unix)]
async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res,
        _ = terminate.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
