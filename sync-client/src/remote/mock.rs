//! Mock remote for testing.
//!
//! Serves an in-memory table, records every call, and can be scripted to
//! fail specific pages, uploads, updates and downloads.

use super::{MediaUpload, RemoteError, RemoteTable};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tablesync_types::{
    AttachmentRef, ContentHandle, FieldUpdate, PageRequest, PageToken, Record, RecordId,
    RecordPage, TableLocator,
};

/// Mock remote table for testing.
///
/// Clones share state, so a test can hand one clone to the code under test
/// and inspect the other afterwards.
#[derive(Debug, Default)]
pub struct MockRemote {
    inner: Arc<Mutex<MockRemoteInner>>,
}

#[derive(Debug, Default)]
struct MockRemoteInner {
    records: Vec<Record>,
    page_requests: Vec<PageRequest>,
    failing_pages: HashMap<usize, (i64, String)>,
    uploads: Vec<MediaUpload>,
    failing_uploads: HashSet<String>,
    next_handle: u64,
    updates: Vec<(RecordId, FieldUpdate)>,
    fail_next_updates: u32,
    downloads: HashMap<String, Vec<u8>>,
    download_requests: Vec<String>,
    fail_next_downloads: u32,
    latency: Option<Duration>,
    in_flight: usize,
    peak_in_flight: usize,
}

impl MockRemote {
    /// Create an empty mock remote.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockRemoteInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the table contents. Pages are cut by each request's page size.
    pub fn serve_records(&self, records: Vec<Record>) {
        self.state().records = records;
    }

    /// Make the given page (1-based) fail with a remote error.
    pub fn fail_page(&self, page: usize, code: i64, msg: &str) {
        self.state().failing_pages.insert(page, (code, msg.to_string()));
    }

    /// Make every upload of `file_name` fail.
    pub fn fail_uploads_for(&self, file_name: &str) {
        self.state().failing_uploads.insert(file_name.to_string());
    }

    /// Make the next `count` record updates fail.
    pub fn fail_next_updates(&self, count: u32) {
        self.state().fail_next_updates = count;
    }

    /// Make the next `count` downloads fail.
    pub fn fail_next_downloads(&self, count: u32) {
        self.state().fail_next_downloads = count;
    }

    /// Register downloadable content for an attachment token.
    pub fn add_download(&self, file_token: &str, bytes: Vec<u8>) {
        self.state().downloads.insert(file_token.to_string(), bytes);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    /// Listing requests received, in order.
    pub fn page_requests(&self) -> Vec<PageRequest> {
        self.state().page_requests.clone()
    }

    /// Upload calls received (including failed ones), in order.
    pub fn uploads(&self) -> Vec<MediaUpload> {
        self.state().uploads.clone()
    }

    /// Updates that were applied.
    pub fn updates(&self) -> Vec<(RecordId, FieldUpdate)> {
        self.state().updates.clone()
    }

    /// Attachment tokens requested for download (including failed ones).
    pub fn download_requests(&self) -> Vec<String> {
        self.state().download_requests.clone()
    }

    /// Most calls that were waiting out the latency at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.state().peak_in_flight
    }

    async fn simulate_latency(&self) {
        let latency = {
            let mut state = self.state();
            state.in_flight += 1;
            state.peak_in_flight = state.peak_in_flight.max(state.in_flight);
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.state().in_flight -= 1;
    }
}

impl Clone for MockRemote {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn parse_offset(token: &PageToken) -> Option<usize> {
    token.as_str().strip_prefix("offset:")?.parse().ok()
}

#[async_trait]
impl RemoteTable for MockRemote {
    async fn list_records(&self, request: &PageRequest) -> Result<RecordPage, RemoteError> {
        self.simulate_latency().await;
        let mut inner = self.state();
        inner.page_requests.push(request.clone());

        let offset = match &request.page_token {
            None => 0,
            Some(token) => parse_offset(token).ok_or_else(|| RemoteError::Api {
                code: 1254004,
                msg: format!("invalid page token: {}", token.as_str()),
            })?,
        };
        let size = request.page_size.max(1) as usize;
        let page = offset / size + 1;

        if let Some((code, msg)) = inner.failing_pages.get(&page) {
            return Err(RemoteError::Api {
                code: *code,
                msg: msg.clone(),
            });
        }

        let end = (offset + size).min(inner.records.len());
        let items = inner.records.get(offset..end).unwrap_or_default().to_vec();
        let has_more = end < inner.records.len();

        Ok(RecordPage {
            items,
            has_more,
            page_token: has_more.then(|| PageToken::new(format!("offset:{}", end))),
        })
    }

    async fn upload_media(
        &self,
        _table: &TableLocator,
        upload: MediaUpload,
    ) -> Result<ContentHandle, RemoteError> {
        self.simulate_latency().await;
        let mut inner = self.state();
        let file_name = upload.file_name.clone();
        inner.uploads.push(upload);

        if inner.failing_uploads.contains(&file_name) {
            return Err(RemoteError::Api {
                code: 1061045,
                msg: format!("upload rejected: {}", file_name),
            });
        }

        inner.next_handle += 1;
        ContentHandle::new(format!("mock-handle-{}", inner.next_handle))
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn update_record(
        &self,
        _table: &TableLocator,
        record_id: &RecordId,
        update: &FieldUpdate,
    ) -> Result<(), RemoteError> {
        self.simulate_latency().await;
        let mut inner = self.state();

        if inner.fail_next_updates > 0 {
            inner.fail_next_updates -= 1;
            return Err(RemoteError::Http("503 Service Unavailable".into()));
        }

        inner.updates.push((record_id.clone(), update.clone()));
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, RemoteError> {
        self.simulate_latency().await;
        let mut inner = self.state();
        inner.download_requests.push(attachment.file_token.clone());

        if inner.fail_next_downloads > 0 {
            inner.fail_next_downloads -= 1;
            return Err(RemoteError::Http("connection reset".into()));
        }

        inner
            .downloads
            .get(&attachment.file_token)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(attachment.file_token.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tablesync_types::FieldValue;

    fn table() -> TableLocator {
        TableLocator::new("app1", "tbl1").unwrap()
    }

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                Record::new(RecordId::new(format!("rec{}", i)).unwrap())
                    .with_field("文本", FieldValue::text(&format!("K{}", i)))
            })
            .collect()
    }

    fn attachment(token: &str) -> AttachmentRef {
        serde_json::from_value(serde_json::json!({ "file_token": token })).unwrap()
    }

    #[tokio::test]
    async fn pages_are_cut_by_request_size() {
        let remote = MockRemote::new();
        remote.serve_records(records(5));

        let first = remote
            .list_records(&PageRequest::first(table(), 2))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);

        let token = first.page_token.clone().unwrap();
        let last = remote
            .list_records(&PageRequest::first(table(), 2).next(PageToken::new("offset:4")))
            .await
            .unwrap();
        assert_eq!(last.items.len(), 1);
        assert!(!last.has_more);
        assert!(last.page_token.is_none());
        assert_eq!(token.as_str(), "offset:2");
    }

    #[tokio::test]
    async fn empty_table_serves_one_empty_page() {
        let remote = MockRemote::new();
        let page = remote
            .list_records(&PageRequest::first(table(), 500))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let remote = MockRemote::new();
        let request = PageRequest::first(table(), 10).next(PageToken::new("bogus"));
        let result = remote.list_records(&request).await;
        assert!(matches!(result, Err(RemoteError::Api { .. })));
    }

    #[tokio::test]
    async fn scripted_page_failure() {
        let remote = MockRemote::new();
        remote.serve_records(records(4));
        remote.fail_page(2, 99991400, "rate limited");

        let request = PageRequest::first(table(), 2);
        assert!(remote.list_records(&request).await.is_ok());
        let result = remote
            .list_records(&request.next(PageToken::new("offset:2")))
            .await;
        assert!(matches!(result, Err(RemoteError::Api { code: 99991400, .. })));
        assert_eq!(remote.page_requests().len(), 2);
    }

    #[tokio::test]
    async fn uploads_return_distinct_handles() {
        let remote = MockRemote::new();
        let upload = |name: &str| MediaUpload {
            file_name: name.into(),
            mime: "image/png".into(),
            bytes: vec![1, 2, 3],
        };

        let h1 = remote.upload_media(&table(), upload("a.png")).await.unwrap();
        let h2 = remote.upload_media(&table(), upload("b.png")).await.unwrap();
        assert_ne!(h1, h2);

        remote.fail_uploads_for("c.png");
        assert!(remote.upload_media(&table(), upload("c.png")).await.is_err());
        assert_eq!(remote.uploads().len(), 3);
    }

    #[tokio::test]
    async fn forced_update_failure_then_success() {
        let remote = MockRemote::new();
        let id = RecordId::new("rec1").unwrap();
        let update = FieldUpdate::text("f", "v".into());
        remote.fail_next_updates(1);

        assert!(remote.update_record(&table(), &id, &update).await.is_err());
        remote.update_record(&table(), &id, &update).await.unwrap();
        assert_eq!(remote.updates().len(), 1);
    }

    #[tokio::test]
    async fn downloads_serve_registered_content() {
        let remote = MockRemote::new();
        remote.add_download("t1", b"png".to_vec());

        assert_eq!(
            remote.download_attachment(&attachment("t1")).await.unwrap(),
            b"png"
        );
        assert!(matches!(
            remote.download_attachment(&attachment("t2")).await,
            Err(RemoteError::NotFound(_))
        ));
        assert_eq!(remote.download_requests(), vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let remote1 = MockRemote::new();
        let remote2 = remote1.clone();
        remote1.serve_records(records(3));

        let page = remote2
            .list_records(&PageRequest::first(table(), 10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert_eq!(remote1.page_requests().len(), 1);
    }
}
