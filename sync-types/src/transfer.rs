//! Record mutation payloads and per-task transfer results.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{ContentHandle, RecordId};

/// An uploaded file as referenced from an attachment field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedAttachment {
    /// Handle returned by the upload.
    pub file_token: ContentHandle,
    /// Display name (the local file name).
    pub name: String,
    /// Attachment kind understood by the remote (`"image"`).
    #[serde(rename = "type")]
    pub kind: String,
}

impl UploadedAttachment {
    /// Reference an uploaded image.
    pub fn image(file_token: ContentHandle, name: &str) -> Self {
        Self {
            file_token,
            name: name.to_string(),
            kind: "image".to_string(),
        }
    }
}

/// New value for a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateValue {
    /// Plain text.
    Text(String),
    /// Ordered attachment list; replaces the field's previous attachments.
    Attachments(Vec<UploadedAttachment>),
}

/// A single-field update applied to one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldUpdate {
    /// Field to overwrite.
    pub field: String,
    /// The new value.
    pub value: UpdateValue,
}

impl FieldUpdate {
    /// Overwrite a text field.
    pub fn text(field: &str, text: String) -> Self {
        Self {
            field: field.to_string(),
            value: UpdateValue::Text(text),
        }
    }

    /// Overwrite an attachment field.
    pub fn attachments(field: &str, attachments: Vec<UploadedAttachment>) -> Self {
        Self {
            field: field.to_string(),
            value: UpdateValue::Attachments(attachments),
        }
    }

    /// Request body for the record update call: `{"fields": {field: value}}`.
    pub fn to_body(&self) -> serde_json::Value {
        let mut fields = serde_json::Map::new();
        fields.insert(
            self.field.clone(),
            serde_json::to_value(&self.value).unwrap_or(serde_json::Value::Null),
        );
        serde_json::json!({ "fields": fields })
    }

    /// Content handles carried by this update, in order.
    pub fn handles(&self) -> Vec<&ContentHandle> {
        match &self.value {
            UpdateValue::Text(_) => Vec::new(),
            UpdateValue::Attachments(list) => list.iter().map(|a| &a.file_token).collect(),
        }
    }
}

/// Terminal state of one transfer task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferOutcome {
    /// The task completed.
    Success,
    /// Every attempt failed; carries the last failure reason.
    Failure(String),
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferOutcome::Success => f.write_str("success"),
            TransferOutcome::Failure(reason) => write!(f, "failure: {}", reason),
        }
    }
}

/// Result of one transfer task, produced once and never retried afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferResult {
    /// Record the task was for.
    pub record_id: RecordId,
    /// Join key of the task.
    pub key: String,
    /// How the task ended.
    pub outcome: TransferOutcome,
    /// Attempts made, including the final one.
    pub attempts: u32,
}

impl TransferResult {
    /// Whether the task succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, TransferOutcome::Success)
    }
}
