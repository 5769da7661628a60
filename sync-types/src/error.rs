//! Error types for tablesync data types.

use thiserror::Error;

/// Errors raised while constructing or decoding tablesync types.
#[derive(Debug, Error)]
pub enum TypesError {
    /// JSON decoding failed
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// An identifier was empty or malformed
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}
