//! Table addressing and paginated listing.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{PageToken, Record, TypesError};

/// Largest page the remote will serve in one listing request.
pub const MAX_PAGE_SIZE: u32 = 500;

/// Identifies one table (and optionally one view of it) in the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLocator {
    /// Token of the base/app that owns the table.
    pub app_token: String,
    /// Table identifier within the app.
    pub table_id: String,
    /// Optional view that filters and orders the table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_id: Option<String>,
}

impl TableLocator {
    /// Create a locator, rejecting empty app or table identifiers.
    pub fn new(app_token: &str, table_id: &str) -> Result<Self, TypesError> {
        if app_token.is_empty() {
            return Err(TypesError::InvalidId("app token is empty".into()));
        }
        if table_id.is_empty() {
            return Err(TypesError::InvalidId("table id is empty".into()));
        }
        Ok(Self {
            app_token: app_token.to_string(),
            table_id: table_id.to_string(),
            view_id: None,
        })
    }

    /// Restrict listing to a view.
    ///
    /// Blank view ids are ignored.
    pub fn with_view(mut self, view_id: &str) -> Self {
        if !view_id.trim().is_empty() {
            self.view_id = Some(view_id.to_string());
        }
        self
    }
}

/// One listing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Table to list.
    pub table: TableLocator,
    /// Page size ceiling, at most [`MAX_PAGE_SIZE`].
    pub page_size: u32,
    /// Continuation cursor from the previous page (absent for the first).
    pub page_token: Option<PageToken>,
}

impl PageRequest {
    /// Request for the first page.
    ///
    /// The page size is clamped to `1..=MAX_PAGE_SIZE`.
    pub fn first(table: TableLocator, page_size: u32) -> Self {
        Self {
            table,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            page_token: None,
        }
    }

    /// Request for the page following `token`.
    pub fn next(&self, token: PageToken) -> Self {
        Self {
            table: self.table.clone(),
            page_size: self.page_size,
            page_token: Some(token),
        }
    }
}

/// One page of records as returned by the remote.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records on this page, in remote order.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub items: Vec<Record>,
    /// Whether another page follows.
    #[serde(default)]
    pub has_more: bool,
    /// Cursor for the next page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_token: Option<PageToken>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Record>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Record>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn locator_requires_ids() {
        assert!(TableLocator::new("", "tbl1").is_err());
        assert!(TableLocator::new("app1", "").is_err());
        let loc = TableLocator::new("app1", "tbl1").unwrap().with_view("  ");
        assert!(loc.view_id.is_none());
    }

    #[test]
    fn first_page_request_clamps_size() {
        let loc = TableLocator::new("app1", "tbl1").unwrap();
        assert_eq!(PageRequest::first(loc.clone(), 10_000).page_size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::first(loc, 0).page_size, 1);
    }

    #[test]
    fn next_request_carries_token() {
        let loc = TableLocator::new("app1", "tbl1").unwrap();
        let first = PageRequest::first(loc, 100);
        let next = first.next(PageToken::new("p2"));
        assert_eq!(next.page_size, 100);
        assert_eq!(next.page_token, Some(PageToken::new("p2")));
        assert!(first.page_token.is_none());
    }

    #[test]
    fn page_with_null_items_decodes_empty() {
        let page: RecordPage =
            serde_json::from_value(json!({"items": null, "has_more": false, "total": 0})).unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
        assert!(page.page_token.is_none());
    }

    #[test]
    fn page_decodes_items_and_cursor() {
        let page: RecordPage = serde_json::from_value(json!({
            "items": [{"record_id": "r1", "fields": {}}],
            "has_more": true,
            "page_token": "tok"
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert!(page.has_more);
        assert_eq!(page.page_token.unwrap().as_str(), "tok");
    }
}
