//! Sync orchestration: index, fetch, match, transfer.
//!
//! One [`SyncRunner`] performs one run in one direction. A run always
//! recomputes everything from scratch; nothing is carried over between
//! runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tablesync_core::{
    match_content, match_records, IndexRules, MatchedPair, PairPayload, ResourceIndex,
    RetryPolicy, SyncSummary,
};
use tablesync_types::{TableLocator, TransferResult, MAX_PAGE_SIZE};
use thiserror::Error;

use crate::engine::TransferEngine;
use crate::fetch::{fetch_all, FetchError};
use crate::remote::RemoteTable;
use crate::scan::{index_directory, IndexError};
use crate::tasks::{DownloadTask, ImageUploadTask, TextUploadTask};

/// Default key field.
pub const DEFAULT_KEY_FIELD: &str = "文本";

/// Default worker limit for uploads.
pub const DEFAULT_UPLOAD_WORKERS: usize = 10;

/// Default worker limit for downloads.
pub const DEFAULT_DOWNLOAD_WORKERS: usize = 5;

/// Default attempts per download task.
pub const DEFAULT_DOWNLOAD_ATTEMPTS: u32 = 5;

/// Default wait between sub-uploads of one image group.
pub const DEFAULT_UPLOAD_PACING: Duration = Duration::from_secs(1);

/// Sync errors that stop a run before any transfer starts.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The run could not be prepared.
    #[error("setup failed: {0}")]
    Setup(String),

    /// Fetching records failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Indexing the local directory failed.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// What a run moves, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Direction {
    /// Upload image groups into an attachment field.
    UploadImages {
        /// Directory holding the images.
        directory: PathBuf,
        /// Attachment field to overwrite.
        field: String,
    },
    /// Upload text groups into a text field.
    UploadText {
        /// Directory holding the text files.
        directory: PathBuf,
        /// Text field to overwrite.
        field: String,
    },
    /// Write record text (and first attachment) into a directory.
    Download {
        /// Output directory, created if absent.
        directory: PathBuf,
        /// Field holding the text.
        content_field: String,
        /// Field holding attachments, if any should be fetched.
        attachment_field: Option<String>,
        /// Extension for downloaded attachments.
        attachment_extension: String,
    },
}

impl Direction {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Direction::UploadImages { .. } => "upload-images",
            Direction::UploadText { .. } => "upload-text",
            Direction::Download { .. } => "download",
        }
    }

    /// The local directory of this run.
    pub fn directory(&self) -> &Path {
        match self {
            Direction::UploadImages { directory, .. }
            | Direction::UploadText { directory, .. }
            | Direction::Download { directory, .. } => directory,
        }
    }

    /// Whether the run reads a local directory index.
    pub fn is_upload(&self) -> bool {
        !matches!(self, Direction::Download { .. })
    }
}

/// Everything one run needs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Table to sync with.
    pub table: TableLocator,
    /// Listing page size.
    pub page_size: u32,
    /// Field holding the join key.
    pub key_field: String,
    /// Direction and its parameters.
    pub direction: Direction,
    /// Which local files are indexed and how they are keyed.
    pub index_rules: IndexRules,
    /// Concurrent transfer tasks.
    pub worker_limit: usize,
    /// Attempts and delay per task.
    pub retry: RetryPolicy,
    /// Wait between sub-uploads of one image group.
    pub upload_pacing: Duration,
}

impl SyncConfig {
    /// Create a configuration with the defaults of `direction`.
    pub fn new(table: TableLocator, direction: Direction) -> Self {
        let (index_rules, worker_limit, retry, upload_pacing) = match &direction {
            Direction::UploadImages { .. } => (
                IndexRules::images(),
                DEFAULT_UPLOAD_WORKERS,
                RetryPolicy::default(),
                DEFAULT_UPLOAD_PACING,
            ),
            Direction::UploadText { .. } => (
                IndexRules::text(),
                DEFAULT_UPLOAD_WORKERS,
                RetryPolicy::default(),
                Duration::ZERO,
            ),
            Direction::Download { .. } => (
                IndexRules::images(),
                DEFAULT_DOWNLOAD_WORKERS,
                RetryPolicy::new(DEFAULT_DOWNLOAD_ATTEMPTS, RetryPolicy::default().delay()),
                Duration::ZERO,
            ),
        };
        Self {
            table,
            page_size: MAX_PAGE_SIZE,
            key_field: DEFAULT_KEY_FIELD.to_string(),
            direction,
            index_rules,
            worker_limit,
            retry,
            upload_pacing,
        }
    }

    /// Set the key field.
    pub fn with_key_field(mut self, key_field: &str) -> Self {
        self.key_field = key_field.to_string();
        self
    }

    /// Set the listing page size.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the index rules.
    pub fn with_index_rules(mut self, rules: IndexRules) -> Self {
        self.index_rules = rules;
        self
    }

    /// Set the worker limit.
    pub fn with_worker_limit(mut self, worker_limit: usize) -> Self {
        self.worker_limit = worker_limit;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the pacing between sub-uploads.
    pub fn with_upload_pacing(mut self, pacing: Duration) -> Self {
        self.upload_pacing = pacing;
        self
    }
}

/// The matched work of a run, before any transfer.
#[derive(Debug, Clone, Default)]
pub struct SyncPlan {
    /// Records fetched.
    pub fetched: usize,
    /// Local index (upload directions only).
    pub index: Option<ResourceIndex>,
    /// Pairs to transfer, in record order.
    pub pairs: Vec<MatchedPair>,
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Aggregate counts.
    pub summary: SyncSummary,
    /// One result per pair, in pair order.
    pub results: Vec<TransferResult>,
}

/// Runs one sync against a remote.
pub struct SyncRunner<R: RemoteTable + 'static> {
    remote: Arc<R>,
    config: SyncConfig,
}

impl<R: RemoteTable + 'static> SyncRunner<R> {
    /// Create a runner.
    pub fn new(remote: Arc<R>, config: SyncConfig) -> Self {
        Self { remote, config }
    }

    /// The run configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Index, fetch and match without transferring anything.
    ///
    /// The directory is indexed before fetching so a bad path fails the run
    /// without touching the remote.
    pub async fn plan(&self) -> Result<SyncPlan, SyncError> {
        let config = &self.config;
        tracing::info!(
            "Planning {} for table {} (key field {})",
            config.direction.name(),
            config.table.table_id,
            config.key_field
        );

        let index = if config.direction.is_upload() {
            Some(index_directory(config.direction.directory(), &config.index_rules).await?)
        } else {
            None
        };

        let records = fetch_all(self.remote.as_ref(), &config.table, config.page_size).await?;

        let pairs = match &config.direction {
            Direction::Download {
                content_field,
                attachment_field,
                ..
            } => match_content(
                &records,
                &config.key_field,
                content_field,
                attachment_field.as_deref(),
            ),
            _ => index
                .as_ref()
                .map(|index| match_records(&records, index, &config.key_field))
                .unwrap_or_default(),
        };

        tracing::info!("Matched {} of {} records", pairs.len(), records.len());
        Ok(SyncPlan {
            fetched: records.len(),
            index,
            pairs,
        })
    }

    /// Transfer every pair of `plan`.
    pub async fn execute(&self, plan: SyncPlan) -> Result<SyncReport, SyncError> {
        let config = &self.config;
        let engine = TransferEngine::new(config.worker_limit, config.retry);
        let matched = plan.pairs.len();

        let results = match &config.direction {
            Direction::UploadImages { field, .. } => {
                let tasks = files_of(plan.pairs)
                    .map(|(pair, paths)| {
                        ImageUploadTask::new(
                            Arc::clone(&self.remote),
                            config.table.clone(),
                            pair.record_id,
                            pair.key,
                            field,
                            paths,
                        )
                        .with_pacing(config.upload_pacing)
                    })
                    .collect();
                engine.run(tasks).await
            }
            Direction::UploadText { field, .. } => {
                let tasks = files_of(plan.pairs)
                    .map(|(pair, paths)| {
                        TextUploadTask::new(
                            Arc::clone(&self.remote),
                            config.table.clone(),
                            pair.record_id,
                            pair.key,
                            field,
                            paths,
                        )
                    })
                    .collect();
                engine.run(tasks).await
            }
            Direction::Download {
                directory,
                attachment_extension,
                ..
            } => {
                tokio::fs::create_dir_all(directory).await.map_err(|e| {
                    SyncError::Setup(format!("cannot create {}: {}", directory.display(), e))
                })?;
                let tasks = plan
                    .pairs
                    .into_iter()
                    .filter_map(|pair| match pair.payload {
                        PairPayload::Content { text, attachment } => Some(DownloadTask::new(
                            Arc::clone(&self.remote),
                            pair.record_id,
                            pair.key,
                            text,
                            attachment,
                            directory,
                            attachment_extension,
                        )),
                        PairPayload::Files(_) => None,
                    })
                    .collect();
                engine.run(tasks).await
            }
        };

        let summary = SyncSummary::from_results(plan.fetched, matched, &results);
        tracing::info!("{} finished: {}", config.direction.name(), summary);
        Ok(SyncReport { summary, results })
    }

    /// Plan and execute in one go.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        let plan = self.plan().await?;
        self.execute(plan).await
    }
}

fn files_of(pairs: Vec<MatchedPair>) -> impl Iterator<Item = (MatchedPair, Vec<PathBuf>)> {
    pairs.into_iter().filter_map(|mut pair| {
        match std::mem::replace(&mut pair.payload, PairPayload::Files(Vec::new())) {
            PairPayload::Files(paths) => Some((pair, paths)),
            PairPayload::Content { .. } => None,
        }
    })
}
