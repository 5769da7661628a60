//! Remote table abstraction for tablesync.
//!
//! This module provides a pluggable remote layer that abstracts the
//! table service (HTTP API, mock for testing).
//!
//! # Design
//!
//! The remote trait is async and stateless per call:
//! - `list_records()` fetches one page of rows
//! - `upload_media()` stores a file and returns its content handle
//! - `update_record()` overwrites one field of one row
//! - `download_attachment()` fetches the bytes behind an attachment
//!
//! # Example
//!
//! ```ignore
//! let remote = MockRemote::new();
//! remote.serve_records(records);
//! let page = remote.list_records(&PageRequest::first(table, 500)).await?;
//! ```

mod http;
mod mock;

pub use http::{HttpRemote, HttpRemoteConfig, DEFAULT_BASE_URL};
pub use mock::MockRemote;

use async_trait::async_trait;
use tablesync_types::{
    AttachmentRef, ContentHandle, FieldUpdate, PageRequest, RecordId, RecordPage, TableLocator,
};
use thiserror::Error;

/// Remote errors.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Transport-level failure (connect, timeout, non-success status).
    #[error("http error: {0}")]
    Http(String),

    /// The remote answered with a non-zero status code.
    #[error("remote error {code}: {msg}")]
    Api {
        /// Remote status code.
        code: i64,
        /// Remote message.
        msg: String,
    },

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// A referenced object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            RemoteError::Decode(e.to_string())
        } else {
            RemoteError::Http(e.to_string())
        }
    }
}

/// A file to store in the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaUpload {
    /// File name shown in the remote.
    pub file_name: String,
    /// Declared MIME type.
    pub mime: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

/// Remote table operations used by the sync engine.
///
/// Implementations handle the underlying API
/// (HTTP, mock, etc).
#[async_trait]
pub trait RemoteTable: Send + Sync {
    /// Fetch one page of records.
    async fn list_records(&self, request: &PageRequest) -> Result<RecordPage, RemoteError>;

    /// Store a file under `table`'s app and return its content handle.
    async fn upload_media(
        &self,
        table: &TableLocator,
        upload: MediaUpload,
    ) -> Result<ContentHandle, RemoteError>;

    /// Overwrite one field of one record.
    async fn update_record(
        &self,
        table: &TableLocator,
        record_id: &RecordId,
        update: &FieldUpdate,
    ) -> Result<(), RemoteError>;

    /// Fetch the content of an attachment.
    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, RemoteError>;
}
