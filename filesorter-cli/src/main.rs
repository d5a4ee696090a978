//! Filesorter CLI - watch folders and sort new files into categories
//!
//! This is the main entry point. It sets up logging, then hands off to
//! the command implementations.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;
mod logging;

#[derive(Parser)]
#[command(name = "filesorter")]
#[command(author = "Filesorter Contributors")]
#[command(version)]
#[command(about = "Sorts newly created files into category folders", long_about = None)]
struct Cli {
    /// Directory holding config.json and default_config.json
    #[arg(long, global = true, default_value = "config")]
    config_dir: PathBuf,

    /// Directory for the log file
    #[arg(long, global = true, default_value = "logs")]
    log_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create config.json from the bundled template
    Init,

    /// Watch the configured folders until interrupted (default)
    Run,

    /// Sort files already sitting in the watched folders, then exit
    Scan {
        /// Follow symbolic links while walking
        #[arg(long)]
        follow_symlinks: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logging::init(&cli.log_dir, cli.verbose) {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }

    let result = match cli.command.unwrap_or(Commands::Run) {
        Commands::Init => commands::init(&cli.config_dir),
        Commands::Run => commands::run(&cli.config_dir).await,
        Commands::Scan { follow_symlinks } => commands::scan(&cli.config_dir, follow_symlinks).await,
    };

    // Exit directly: returning would make the runtime wait for in-flight
    // stability probes, and shutdown abandons those on purpose.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            tracing::error!("Fatal error: {}", e);
            eprintln!("{} {}", "error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}
