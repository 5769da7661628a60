//! Joining remote records to local resources.
//!
//! Two directions share one pair type:
//! - upload: a record's key field is looked up in the [`ResourceIndex`]
//!   and the pair carries the group's file paths
//! - download: a record's key and content fields are read directly and the
//!   pair carries the text (plus the first attachment, if any)
//!
//! Records with an empty key, or no matching group, are skipped silently.
//! Duplicate keys are not deduplicated: two records with the same key each
//! produce a pair against the same group.

use std::path::PathBuf;
use tablesync_types::{AttachmentRef, Record, RecordId};

use crate::index::ResourceIndex;
use crate::normalize::field_text;

/// What a matched pair moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairPayload {
    /// Local files to push to the record.
    Files(Vec<PathBuf>),
    /// Record content to write locally.
    Content {
        /// Normalized text of the content field.
        text: String,
        /// First attachment of the attachment field, if any.
        attachment: Option<AttachmentRef>,
    },
}

/// One joined (record, resource) unit, consumed once by the transfer engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedPair {
    /// The record being synced.
    pub record_id: RecordId,
    /// Join key (normalized key field).
    pub key: String,
    /// Files or content.
    pub payload: PairPayload,
}

impl MatchedPair {
    /// Local files of an upload pair (empty for download pairs).
    pub fn paths(&self) -> &[PathBuf] {
        match &self.payload {
            PairPayload::Files(paths) => paths,
            PairPayload::Content { .. } => &[],
        }
    }
}

/// Join records to resource groups by the normalized `key_field`.
///
/// Output order follows record order.
pub fn match_records(records: &[Record], index: &ResourceIndex, key_field: &str) -> Vec<MatchedPair> {
    records
        .iter()
        .filter_map(|record| {
            let key = field_text(record, key_field);
            if key.is_empty() {
                return None;
            }
            let paths = index.get(&key)?;
            Some(MatchedPair {
                record_id: record.id.clone(),
                key,
                payload: PairPayload::Files(paths.to_vec()),
            })
        })
        .collect()
}

/// Select records whose content should be written locally.
///
/// A record qualifies when both its key and content fields normalize to
/// non-empty text.
pub fn match_content(
    records: &[Record],
    key_field: &str,
    content_field: &str,
    attachment_field: Option<&str>,
) -> Vec<MatchedPair> {
    records
        .iter()
        .filter_map(|record| {
            let key = field_text(record, key_field);
            if key.is_empty() {
                return None;
            }
            let text = field_text(record, content_field);
            if text.is_empty() {
                return None;
            }
            let attachment = attachment_field
                .and_then(|f| record.field(f))
                .and_then(|v| v.attachments().first().map(|a| (*a).clone()));
            Some(MatchedPair {
                record_id: record.id.clone(),
                key,
                payload: PairPayload::Content { text, attachment },
            })
        })
        .collect()
}
