//! Field normalization.
//!
//! Reduces any [`FieldValue`] shape to one trimmed string. The first rule
//! that applies wins:
//!
//! 1. scalar string
//! 2. wrapped object whose `value` list starts with a text fragment
//! 3. wrapped object with a `text` string
//! 4. list starting with a text fragment
//! 5. list starting with a plain string
//! 6. anything else is rendered to JSON text
//!
//! A missing field, an explicit null and a wrapped object matching neither
//! rule 2 nor rule 3 all normalize to the empty string. Nothing here can
//! fail: a malformed shape degrades to rule 6 instead of aborting the run.

use tablesync_types::{FieldValue, ListItem, Record};

/// Normalize a field value to a trimmed string.
pub fn normalize(value: Option<&FieldValue>) -> String {
    let Some(value) = value else {
        return String::new();
    };

    match value {
        FieldValue::Scalar(s) => s.trim().to_string(),
        FieldValue::Wrapped(wrapped) => {
            if let Some(ListItem::Fragment(first)) =
                wrapped.value.as_ref().and_then(|items| items.first())
            {
                return first.text.trim().to_string();
            }
            wrapped
                .text
                .as_deref()
                .map(|t| t.trim().to_string())
                .unwrap_or_default()
        }
        FieldValue::List(items) => match items.first() {
            Some(ListItem::Fragment(first)) => first.text.trim().to_string(),
            Some(ListItem::Plain(first)) => first.trim().to_string(),
            _ => value.to_json_string().trim().to_string(),
        },
        FieldValue::Other(serde_json::Value::Null) => String::new(),
        FieldValue::Other(serde_json::Value::String(s)) => s.trim().to_string(),
        FieldValue::Other(other) => other.to_string().trim().to_string(),
    }
}

/// Normalize the named field of a record.
pub fn field_text(record: &Record, field: &str) -> String {
    normalize(record.field(field))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablesync_types::{Fragment, Wrapped};

    fn from_json(v: serde_json::Value) -> FieldValue {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn missing_value_is_empty() {
        assert_eq!(normalize(None), "");
    }

    #[test]
    fn scalar_is_trimmed() {
        assert_eq!(normalize(Some(&FieldValue::text("  K1 \n"))), "K1");
    }

    #[test]
    fn wrapped_value_fragment_wins_over_text() {
        let v = FieldValue::Wrapped(Wrapped {
            value: Some(vec![ListItem::Fragment(Fragment::new(" inner "))]),
            text: Some("outer".into()),
        });
        assert_eq!(normalize(Some(&v)), "inner");
    }

    #[test]
    fn wrapped_text_used_when_value_empty() {
        let v = from_json(json!({"value": [], "text": "  outer "}));
        assert_eq!(normalize(Some(&v)), "outer");
    }

    #[test]
    fn wrapped_without_known_keys_is_empty() {
        let v = from_json(json!({"type": 2, "link": "x"}));
        assert_eq!(normalize(Some(&v)), "");
    }

    #[test]
    fn wrapped_value_with_plain_first_falls_back_to_text() {
        let v = from_json(json!({"value": ["plain"], "text": "t"}));
        assert_eq!(normalize(Some(&v)), "t");
    }

    #[test]
    fn fragment_list_uses_first_fragment() {
        let v = from_json(json!([{"text": " first ", "type": "text"}, {"text": "second"}]));
        assert_eq!(normalize(Some(&v)), "first");
    }

    #[test]
    fn plain_list_uses_first_string() {
        let v = from_json(json!(["  a ", "b"]));
        assert_eq!(normalize(Some(&v)), "a");
    }

    #[test]
    fn number_is_stringified() {
        assert_eq!(normalize(Some(&from_json(json!(42)))), "42");
        assert_eq!(normalize(Some(&from_json(json!(1.5)))), "1.5");
    }

    #[test]
    fn null_is_empty() {
        assert_eq!(normalize(Some(&from_json(json!(null)))), "");
    }

    #[test]
    fn empty_list_is_stringified() {
        assert_eq!(normalize(Some(&from_json(json!([])))), "[]");
    }

    #[test]
    fn attachment_list_is_stringified_not_panicking() {
        let v = from_json(json!([{"file_token": "t1"}]));
        let out = normalize(Some(&v));
        assert!(out.contains("t1"), "got: {}", out);
    }

    #[test]
    fn field_text_reads_named_field() {
        let record = tablesync_types::Record::new(tablesync_types::RecordId::new("r1").unwrap())
            .with_field("文本", FieldValue::fragments([" B "]));
        assert_eq!(field_text(&record, "文本"), "B");
        assert_eq!(field_text(&record, "other"), "");
    }
}
