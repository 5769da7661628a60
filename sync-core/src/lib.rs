//! # sync-core
//!
//! Pure logic for tablesync (no I/O, instant tests).
//!
//! This crate implements the normalization, grouping and matching rules of a
//! table ⇄ directory sync without any network or disk I/O, enabling fast
//! unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//!
//! The actual I/O (remote API calls, directory walks, file writes) is
//! performed by `sync-client`, which feeds its inputs through these modules.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod index;
pub mod matcher;
pub mod normalize;
pub mod retry;
pub mod summary;

pub use index::{
    derive_key, IndexRules, ResourceIndex, DEFAULT_SEPARATOR, IMAGE_EXTENSIONS,
    TEXT_EXTENSIONS,
};
pub use matcher::{match_content, match_records, MatchedPair, PairPayload};
pub use normalize::{field_text, normalize};
pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY};
pub use summary::{FailedItem, SyncSummary};
