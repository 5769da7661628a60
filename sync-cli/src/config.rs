//! Configuration loading for tablesync.
//!
//! Configuration is loaded from a TOML file (default: `tablesync.toml` in the
//! platform config directory). Every key has a default, so a file holding
//! only `[remote] table_url = "..."` is enough to run.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tablesync_client::{parse_table_url, Direction, SyncConfig, DEFAULT_BASE_URL};
use tablesync_core::{IndexRules, RetryPolicy, IMAGE_EXTENSIONS, TEXT_EXTENSIONS};
use tablesync_types::{TableLocator, MAX_PAGE_SIZE};

/// Root configuration for tablesync.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Remote table configuration.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Settings shared by every direction.
    #[serde(default)]
    pub sync: SyncSection,
    /// Image upload configuration.
    #[serde(default)]
    pub upload_images: ImageUploadConfig,
    /// Text upload configuration.
    #[serde(default)]
    pub upload_text: TextUploadConfig,
    /// Download configuration.
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Remote table configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// API base URL (default: https://open.feishu.cn).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Browser link of the table (`.../<app>?table=<id>&view=<id>`).
    pub table_url: Option<String>,
    /// App id used to obtain access tokens.
    pub app_id: Option<String>,
    /// App secret (falls back to TABLESYNC_APP_SECRET, then a prompt).
    pub app_secret: Option<String>,
    /// Listing page size (default: 500, the maximum).
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Per-request timeout in seconds (default: 60).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Settings shared by every direction.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    /// Field holding the join key for uploads (default: 文本).
    #[serde(default = "default_key_field")]
    pub key_field: String,
    /// Separator between key and part number in file names (default: `_`).
    /// An empty string keys every file by its full stem.
    #[serde(default = "default_key_separator")]
    pub key_separator: String,
    /// Delay between attempts of one task in milliseconds (default: 2000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Delay between sub-uploads of one image group in milliseconds
    /// (default: 1000).
    #[serde(default = "default_upload_pacing_ms")]
    pub upload_pacing_ms: u64,
}

/// Image upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageUploadConfig {
    /// Directory holding the images.
    pub directory: Option<PathBuf>,
    /// Attachment field to overwrite (default: 图片).
    #[serde(default = "default_image_field")]
    pub field: String,
    /// Concurrent tasks (default: 10).
    #[serde(default = "default_upload_workers")]
    pub worker_limit: usize,
    /// Attempts per task (default: 3).
    #[serde(default = "default_upload_attempts")]
    pub max_attempts: u32,
    /// Accepted extensions.
    #[serde(default = "default_image_extensions")]
    pub extensions: Vec<String>,
}

/// Text upload configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TextUploadConfig {
    /// Directory holding the text files.
    pub directory: Option<PathBuf>,
    /// Text field to overwrite (default: 计算_json).
    #[serde(default = "default_text_field")]
    pub field: String,
    /// Concurrent tasks (default: 10).
    #[serde(default = "default_upload_workers")]
    pub worker_limit: usize,
    /// Attempts per task (default: 3).
    #[serde(default = "default_upload_attempts")]
    pub max_attempts: u32,
    /// Accepted extensions.
    #[serde(default = "default_text_extensions")]
    pub extensions: Vec<String>,
}

/// Download configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    /// Output directory.
    pub directory: Option<PathBuf>,
    /// Field naming the output files (default: 图片名称).
    #[serde(default = "default_download_key_field")]
    pub key_field: String,
    /// Field holding the text (default: txt).
    #[serde(default = "default_content_field")]
    pub content_field: String,
    /// Field holding attachments (default: 示例图). Empty disables
    /// attachment downloads.
    #[serde(default = "default_attachment_field")]
    pub attachment_field: String,
    /// Extension of downloaded attachments (default: png).
    #[serde(default = "default_attachment_extension")]
    pub attachment_extension: String,
    /// Concurrent tasks (default: 5).
    #[serde(default = "default_download_workers")]
    pub worker_limit: usize,
    /// Attempts per task (default: 5).
    #[serde(default = "default_download_attempts")]
    pub max_attempts: u32,
}

// Default value functions
fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_key_field() -> String {
    "文本".to_string()
}

fn default_key_separator() -> String {
    "_".to_string()
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_upload_pacing_ms() -> u64 {
    1000
}

fn default_image_field() -> String {
    "图片".to_string()
}

fn default_text_field() -> String {
    "计算_json".to_string()
}

fn default_upload_workers() -> usize {
    10
}

fn default_upload_attempts() -> u32 {
    3
}

fn default_image_extensions() -> Vec<String> {
    IMAGE_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_text_extensions() -> Vec<String> {
    TEXT_EXTENSIONS.iter().map(|e| e.to_string()).collect()
}

fn default_download_key_field() -> String {
    "图片名称".to_string()
}

fn default_content_field() -> String {
    "txt".to_string()
}

fn default_attachment_field() -> String {
    "示例图".to_string()
}

fn default_attachment_extension() -> String {
    "png".to_string()
}

fn default_download_workers() -> usize {
    5
}

fn default_download_attempts() -> u32 {
    5
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            table_url: None,
            app_id: None,
            app_secret: None,
            page_size: default_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            key_field: default_key_field(),
            key_separator: default_key_separator(),
            retry_delay_ms: default_retry_delay_ms(),
            upload_pacing_ms: default_upload_pacing_ms(),
        }
    }
}

impl Default for ImageUploadConfig {
    fn default() -> Self {
        Self {
            directory: None,
            field: default_image_field(),
            worker_limit: default_upload_workers(),
            max_attempts: default_upload_attempts(),
            extensions: default_image_extensions(),
        }
    }
}

impl Default for TextUploadConfig {
    fn default() -> Self {
        Self {
            directory: None,
            field: default_text_field(),
            worker_limit: default_upload_workers(),
            max_attempts: default_upload_attempts(),
            extensions: default_text_extensions(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: None,
            key_field: default_download_key_field(),
            content_field: default_content_field(),
            attachment_field: default_attachment_field(),
            attachment_extension: default_attachment_extension(),
            worker_limit: default_download_workers(),
            max_attempts: default_download_attempts(),
        }
    }
}

/// Which transfer a command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Local images into an attachment field.
    UploadImages,
    /// Local text files into a text field.
    UploadText,
    /// Record text and attachments into a local directory.
    Download,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    /// Local directory.
    pub dir: Option<PathBuf>,
    /// Worker limit.
    pub workers: Option<usize>,
    /// Attempts per task.
    pub max_attempts: Option<u32>,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// The configured table.
    pub fn table(&self) -> Result<TableLocator, ConfigError> {
        let url = self
            .remote
            .table_url
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::Invalid("remote.table_url is not set".into()))?;
        parse_table_url(url).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// The key separator, or `None` when splitting is disabled.
    pub fn key_separator(&self) -> Result<Option<char>, ConfigError> {
        let mut chars = self.sync.key_separator.chars();
        match (chars.next(), chars.next()) {
            (None, _) => Ok(None),
            (Some(c), None) => Ok(Some(c)),
            _ => Err(ConfigError::Invalid(format!(
                "sync.key_separator must be a single character, got {:?}",
                self.sync.key_separator
            ))),
        }
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.remote.request_timeout_secs)
    }

    /// Build the run configuration for `mode`.
    pub fn sync_config(&self, mode: Mode, overrides: &Overrides) -> Result<SyncConfig, ConfigError> {
        let table = self.table()?;
        let separator = self.key_separator()?;
        let retry_delay = Duration::from_millis(self.sync.retry_delay_ms);

        let missing_dir = |section: &str| {
            ConfigError::Invalid(format!(
                "{}.directory is not set (use --dir or the config file)",
                section
            ))
        };

        let (direction, key_field, extensions, workers, attempts) = match mode {
            Mode::UploadImages => {
                let section = &self.upload_images;
                let directory = overrides
                    .dir
                    .clone()
                    .or_else(|| section.directory.clone())
                    .ok_or_else(|| missing_dir("upload_images"))?;
                (
                    Direction::UploadImages {
                        directory,
                        field: section.field.clone(),
                    },
                    self.sync.key_field.clone(),
                    section.extensions.clone(),
                    section.worker_limit,
                    section.max_attempts,
                )
            }
            Mode::UploadText => {
                let section = &self.upload_text;
                let directory = overrides
                    .dir
                    .clone()
                    .or_else(|| section.directory.clone())
                    .ok_or_else(|| missing_dir("upload_text"))?;
                (
                    Direction::UploadText {
                        directory,
                        field: section.field.clone(),
                    },
                    self.sync.key_field.clone(),
                    section.extensions.clone(),
                    section.worker_limit,
                    section.max_attempts,
                )
            }
            Mode::Download => {
                let section = &self.download;
                let directory = overrides
                    .dir
                    .clone()
                    .or_else(|| section.directory.clone())
                    .ok_or_else(|| missing_dir("download"))?;
                let attachment_field = Some(section.attachment_field.trim())
                    .filter(|f| !f.is_empty())
                    .map(str::to_string);
                (
                    Direction::Download {
                        directory,
                        content_field: section.content_field.clone(),
                        attachment_field,
                        attachment_extension: section.attachment_extension.clone(),
                    },
                    section.key_field.clone(),
                    Vec::new(),
                    section.worker_limit,
                    section.max_attempts,
                )
            }
        };

        let workers = overrides.workers.unwrap_or(workers);
        let attempts = overrides.max_attempts.unwrap_or(attempts);
        if workers == 0 {
            return Err(ConfigError::Invalid("worker limit must be at least 1".into()));
        }
        if attempts == 0 {
            return Err(ConfigError::Invalid("max attempts must be at least 1".into()));
        }

        let mut config = SyncConfig::new(table, direction)
            .with_key_field(&key_field)
            .with_page_size(self.remote.page_size)
            .with_worker_limit(workers)
            .with_retry(RetryPolicy::new(attempts, retry_delay));
        if mode == Mode::UploadImages {
            config = config.with_upload_pacing(Duration::from_millis(self.sync.upload_pacing_ms));
        }
        if mode != Mode::Download {
            config = config.with_index_rules(IndexRules::new(&extensions).with_separator(separator));
        }
        Ok(config)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// A value is missing or out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
