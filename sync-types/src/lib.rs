//! # sync-types
//!
//! Data types shared by every tablesync crate.
//!
//! This crate provides the foundational types for a table ⇄ directory sync:
//! - [`Record`], [`FieldValue`] - Remote rows and the shapes their fields arrive in
//! - [`RecordId`], [`ContentHandle`], [`PageToken`] - Opaque identifiers issued by the remote
//! - [`TableLocator`], [`PageRequest`], [`RecordPage`] - Paginated listing
//! - [`FieldUpdate`], [`UploadedAttachment`] - Record mutation payloads
//! - [`TransferResult`], [`TransferOutcome`] - Per-task results
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod ids;
mod record;
mod table;
mod transfer;

pub use error::TypesError;
pub use ids::{ContentHandle, PageToken, RecordId};
pub use record::{AttachmentRef, FieldValue, Fragment, ListItem, Record, Wrapped};
pub use table::{PageRequest, RecordPage, TableLocator, MAX_PAGE_SIZE};
pub use transfer::{FieldUpdate, TransferOutcome, TransferResult, UpdateValue, UploadedAttachment};
