//! # tablesync
//!
//! Sync a remote table with a local directory.
//!
//! ## Commands
//!
//! - `upload-images`: Attach local images to the records they are named after
//! - `upload-text`: Write local text files into a text field
//! - `download`: Write record text (and first attachment) into a directory
//! - `check-config`: Show the resolved configuration
//!
//! ## Example
//!
//! ```bash
//! # Check what will be used
//! tablesync --config tablesync.toml check-config
//!
//! # See which records would be touched
//! tablesync upload-images --dir ./images --dry-run
//!
//! # Upload for real with fewer workers
//! tablesync upload-images --dir ./images --workers 4
//!
//! # Download captions and sample images
//! tablesync download --dir ./out
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::{check, sync};
use config::{Config, Mode, Overrides};

/// Sync a remote table with a local directory.
#[derive(Parser, Debug)]
#[command(name = "tablesync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (default: tablesync.toml in the config directory)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload images to the attachment field of matching records
    UploadImages(TransferArgs),

    /// Upload text files to the text field of matching records
    UploadText(TransferArgs),

    /// Download record text and attachments into a directory
    Download(TransferArgs),

    /// Show the resolved configuration without contacting the remote
    CheckConfig,
}

#[derive(Args, Debug)]
struct TransferArgs {
    /// Local directory (overrides the config file)
    #[arg(long, short)]
    dir: Option<PathBuf>,

    /// Number of concurrent transfers
    #[arg(long, short)]
    workers: Option<usize>,

    /// Attempts per record before giving up
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Fetch, index and match only; transfer nothing
    #[arg(long)]
    dry_run: bool,
}

impl TransferArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            dir: self.dir.clone(),
            workers: self.workers,
            max_attempts: self.max_attempts,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    tracing::debug!("Loading configuration from {}", config_path.display());
    let config = Config::from_file(&config_path)?;

    match cli.command {
        Commands::UploadImages(args) => {
            sync::run(&config, Mode::UploadImages, &args.overrides(), args.dry_run).await?;
        }
        Commands::UploadText(args) => {
            sync::run(&config, Mode::UploadText, &args.overrides(), args.dry_run).await?;
        }
        Commands::Download(args) => {
            sync::run(&config, Mode::Download, &args.overrides(), args.dry_run).await?;
        }
        Commands::CheckConfig => {
            check::run(&config_path, &config)?;
        }
    }

    Ok(())
}

/// Get the default configuration file path.
fn default_config_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("io", "ydun", "tablesync")
        .context("Could not determine home directory")?;
    Ok(dirs.config_dir().join("tablesync.toml"))
}
