//! # sync-client
//!
//! I/O side of tablesync: talks to the remote table, reads and writes the
//! local directory, and runs transfers.
//!
//! ## Features
//!
//! - **Remote Abstraction**: Pluggable remote layer (HTTP, mock)
//! - **Exhaustive Paging**: Follows continuation cursors until the table is exhausted
//! - **Bounded Transfers**: Fixed worker pool with task-level retry
//! - **Pure Rules**: Uses sync-core for normalization, grouping and matching
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tablesync_client::{Direction, HttpRemote, SyncConfig, SyncRunner};
//!
//! let remote = HttpRemote::connect(HttpRemoteConfig::default(), &credentials).await?;
//! let config = SyncConfig::new(table, Direction::UploadImages {
//!     directory: "./images".into(),
//!     field: "图片".into(),
//! });
//!
//! let report = SyncRunner::new(Arc::new(remote), config).run().await?;
//! println!("{}", report.summary);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod engine;
pub mod fetch;
pub mod locator;
pub mod remote;
pub mod scan;
pub mod sync;
pub mod tasks;

pub use auth::{fetch_app_access_token, AccessToken, AppCredentials, AuthError};
pub use engine::{TransferEngine, TransferTask};
pub use fetch::{fetch_all, FetchError};
pub use locator::{parse_table_url, LocatorError};
pub use remote::{
    HttpRemote, HttpRemoteConfig, MediaUpload, MockRemote, RemoteError, RemoteTable,
    DEFAULT_BASE_URL,
};
pub use scan::{index_directory, IndexError};
pub use sync::{Direction, SyncConfig, SyncError, SyncPlan, SyncReport, SyncRunner};
pub use tasks::{DownloadTask, ImageUploadTask, TextUploadTask, TransferError};
