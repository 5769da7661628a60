//! Remote records and the shapes their field values arrive in.
//!
//! The remote API does not give a field one fixed JSON shape. Depending on
//! the column type (plain text, rich text, formula, lookup, attachment) the
//! same logical "text" can arrive as a bare string, a list of text fragments,
//! or an object wrapping such a list. [`FieldValue`] names each of these
//! shapes explicitly so downstream code can match on them instead of probing
//! JSON by hand.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

use crate::{RecordId, TypesError};

/// One row of the remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Opaque row identifier.
    #[serde(rename = "record_id")]
    pub id: RecordId,
    /// Field name → value. Fields with no value are usually omitted.
    #[serde(default)]
    pub fields: HashMap<String, FieldValue>,
}

impl Record {
    /// Create a record with no fields.
    pub fn new(id: RecordId) -> Self {
        Self {
            id,
            fields: HashMap::new(),
        }
    }

    /// Add a field value (builder style).
    pub fn with_field(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Decode a record from its JSON representation.
    pub fn from_json(value: serde_json::Value) -> Result<Self, TypesError> {
        serde_json::from_value(value).map_err(TypesError::Decode)
    }
}

/// The polymorphic value of a single field.
///
/// Variant order matters: deserialization tries them top to bottom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A bare string.
    Scalar(String),
    /// An ordered list: text fragments, plain strings or attachments.
    List(Vec<ListItem>),
    /// An object wrapping a fragment list and/or a text value.
    Wrapped(Wrapped),
    /// Anything else (numbers, booleans, null).
    Other(serde_json::Value),
}

impl FieldValue {
    /// Shorthand for a scalar text value.
    pub fn text(s: &str) -> Self {
        FieldValue::Scalar(s.to_string())
    }

    /// Shorthand for a list of text fragments.
    pub fn fragments<'a>(texts: impl IntoIterator<Item = &'a str>) -> Self {
        FieldValue::List(
            texts
                .into_iter()
                .map(|t| ListItem::Fragment(Fragment::new(t)))
                .collect(),
        )
    }

    /// Attachments held by this value, in order.
    ///
    /// Returns an empty list for every non-list shape.
    pub fn attachments(&self) -> Vec<&AttachmentRef> {
        match self {
            FieldValue::List(items) => items
                .iter()
                .filter_map(|item| match item {
                    ListItem::Attachment(a) => Some(a),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Render the whole value as compact JSON.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One element of a [`FieldValue::List`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListItem {
    /// A bare string element.
    Plain(String),
    /// A rich-text fragment (`{"text": ..., "type": ...}`).
    Fragment(Fragment),
    /// An attachment descriptor.
    Attachment(AttachmentRef),
    /// Any other element.
    Other(serde_json::Value),
}

/// A rich-text fragment. Only the text is retained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Fragment text. Non-string JSON is rendered to its JSON text.
    #[serde(deserialize_with = "lossy_text")]
    pub text: String,
}

impl Fragment {
    /// Create a fragment.
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }
}

/// Object-shaped field value produced by formula and lookup columns.
///
/// Keys holding an unexpected JSON type are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Wrapped {
    /// Nested fragment list.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub value: Option<Vec<ListItem>>,
    /// Direct text value.
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// An attachment stored in the remote (image, file).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Content handle of the stored file.
    pub file_token: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Declared MIME type.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
    /// Size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    /// Short-lived URL that resolves to a download link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tmp_url: Option<String>,
}

fn lossy_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}
