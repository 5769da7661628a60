//! Run one transfer: upload images, upload text, or download.

use anyhow::{Context, Result};
use std::sync::Arc;
use tablesync_client::{
    AppCredentials, HttpRemote, HttpRemoteConfig, SyncPlan, SyncReport, SyncRunner,
};
use tablesync_core::PairPayload;

use crate::config::{Config, Mode, Overrides};

/// Environment variable consulted when the config file has no app secret.
pub const SECRET_ENV: &str = "TABLESYNC_APP_SECRET";

/// Run the transfer command for `mode`.
pub async fn run(config: &Config, mode: Mode, overrides: &Overrides, dry_run: bool) -> Result<()> {
    // Validate everything local before asking for the secret.
    let sync_config = config
        .sync_config(mode, overrides)
        .context("Invalid configuration")?;

    let remote = connect(config).await?;
    let runner = SyncRunner::new(Arc::new(remote), sync_config);

    println!(
        "Syncing table {} ({})...",
        runner.config().table.table_id,
        runner.config().direction.name()
    );

    let plan = runner.plan().await.context("Failed to prepare sync")?;

    if dry_run {
        print_plan(&plan);
        return Ok(());
    }

    let report = runner.execute(plan).await.context("Sync failed")?;
    print_report(&report);

    if !report.summary.is_clean() {
        anyhow::bail!("{} transfer(s) failed", report.summary.failed);
    }
    Ok(())
}

async fn connect(config: &Config) -> Result<HttpRemote> {
    let app_id = config
        .remote
        .app_id
        .as_deref()
        .context("remote.app_id is not set")?;
    let secret = app_secret(config)?;
    let credentials = AppCredentials::new(app_id, &secret)?;

    let remote_config = HttpRemoteConfig {
        base_url: config.remote.base_url.clone(),
        timeout: config.request_timeout(),
    };
    HttpRemote::connect(remote_config, &credentials)
        .await
        .context("Failed to obtain access token")
}

fn app_secret(config: &Config) -> Result<String> {
    if let Some(secret) = config.remote.app_secret.as_ref().filter(|s| !s.is_empty()) {
        return Ok(secret.clone());
    }
    if let Ok(secret) = std::env::var(SECRET_ENV) {
        if !secret.is_empty() {
            return Ok(secret);
        }
    }
    let secret = rpassword::prompt_password("App secret: ").context("Failed to read app secret")?;
    if secret.trim().is_empty() {
        anyhow::bail!("App secret must not be empty");
    }
    Ok(secret.trim().to_string())
}

fn print_plan(plan: &SyncPlan) {
    println!("Dry run: nothing was transferred.");
    println!();
    println!("  Records fetched: {}", plan.fetched);
    if let Some(index) = &plan.index {
        println!(
            "  Local files:     {} ({} keys)",
            index.file_count(),
            index.len()
        );
    }
    println!("  Matched:         {}", plan.pairs.len());
    println!();

    if let Some(index) = &plan.index {
        let unmatched: Vec<&str> = index
            .keys()
            .filter(|key| !plan.pairs.iter().any(|pair| pair.key == *key))
            .collect();
        if !unmatched.is_empty() {
            println!("  No record for: {}", unmatched.join(", "));
            println!();
        }
    }

    for pair in &plan.pairs {
        match &pair.payload {
            PairPayload::Files(paths) => {
                println!("  {} -> {} ({} files)", pair.key, pair.record_id, paths.len());
            }
            PairPayload::Content { attachment, .. } => {
                let extra = if attachment.is_some() {
                    " + attachment"
                } else {
                    ""
                };
                println!("  {} <- {}{}", pair.key, pair.record_id, extra);
            }
        }
    }
}

fn print_report(report: &SyncReport) {
    let summary = &report.summary;
    println!("Sync complete!");
    println!();
    println!("  Fetched:   {}", summary.fetched);
    println!("  Matched:   {}", summary.matched);
    println!("  Succeeded: {}", summary.succeeded);
    println!("  Failed:    {}", summary.failed);
    println!("  Attempts:  {}", summary.attempts);

    if !summary.failures.is_empty() {
        println!();
        println!("Failed records:");
        for failure in &summary.failures {
            println!(
                "  {} ({}): {}",
                failure.record_id, failure.key, failure.reason
            );
        }
    }
}
