//! Show the resolved configuration without contacting the remote.

use anyhow::{Context, Result};
use std::path::Path;
use tablesync_client::Direction;

use crate::config::{Config, Mode, Overrides};

/// Run the check-config command.
pub fn run(path: &Path, config: &Config) -> Result<()> {
    let table = config.table().context("Invalid configuration")?;
    let separator = config.key_separator().context("Invalid configuration")?;

    println!("Configuration: {}", path.display());
    println!();
    println!("  Base URL:   {}", config.remote.base_url);
    println!("  App token:  {}", table.app_token);
    println!("  Table:      {}", table.table_id);
    println!(
        "  View:       {}",
        table.view_id.as_deref().unwrap_or("(none)")
    );
    println!(
        "  App ID:     {}",
        config.remote.app_id.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  Separator:  {}",
        separator.map_or_else(|| "(disabled)".to_string(), |c| c.to_string())
    );
    println!();

    for (name, mode) in [
        ("upload-images", Mode::UploadImages),
        ("upload-text", Mode::UploadText),
        ("download", Mode::Download),
    ] {
        match config.sync_config(mode, &Overrides::default()) {
            Ok(sync) => {
                let field = match &sync.direction {
                    Direction::UploadImages { field, .. } | Direction::UploadText { field, .. } => {
                        field.clone()
                    }
                    Direction::Download { content_field, .. } => content_field.clone(),
                };
                println!(
                    "  {:<14} {} (key {}, field {}, {} workers, {} attempts)",
                    name,
                    sync.direction.directory().display(),
                    sync.key_field,
                    field,
                    sync.worker_limit,
                    sync.retry.max_attempts()
                );
            }
            Err(e) => println!("  {:<14} unavailable: {}", name, e),
        }
    }

    Ok(())
}
