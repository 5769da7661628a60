//! Paginated retrieval of every record in a table.
//!
//! Pages are requested strictly one after another: each request carries
//! the cursor from the previous response, so there is nothing to
//! parallelize. A failed page aborts the whole fetch; partial results are
//! never returned.

use crate::remote::{RemoteError, RemoteTable};
use tablesync_types::{PageRequest, Record, TableLocator};
use thiserror::Error;

/// Fetch errors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// A page request failed.
    #[error("failed to fetch page {page}: {source}")]
    RemoteQuery {
        /// 1-based page number.
        page: usize,
        /// Underlying remote error.
        #[source]
        source: RemoteError,
    },

    /// The remote announced more pages without a cursor to reach them.
    #[error("page {page} reported more records but no page token")]
    MissingPageToken {
        /// 1-based page number.
        page: usize,
    },
}

/// Retrieve all records of `table`, in remote order.
pub async fn fetch_all<R>(
    remote: &R,
    table: &TableLocator,
    page_size: u32,
) -> Result<Vec<Record>, FetchError>
where
    R: RemoteTable + ?Sized,
{
    let mut request = PageRequest::first(table.clone(), page_size);
    let mut records = Vec::new();
    let mut page = 1;

    loop {
        let response = remote
            .list_records(&request)
            .await
            .map_err(|source| FetchError::RemoteQuery { page, source })?;

        tracing::debug!(
            "Fetched page {} ({} records, has_more={})",
            page,
            response.items.len(),
            response.has_more
        );
        records.extend(response.items);

        if !response.has_more {
            break;
        }
        let token = response
            .page_token
            .ok_or(FetchError::MissingPageToken { page })?;
        request = request.next(token);
        page += 1;
    }

    tracing::info!("Fetched {} records in {} pages", records.len(), page);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use async_trait::async_trait;
    use tablesync_types::{
        AttachmentRef, ContentHandle, FieldUpdate, FieldValue, RecordId, RecordPage,
    };

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

    #[tokio::test]
    async fn fetches_every_page_in_order() {
        let remote = MockRemote::new();
        remote.serve_records(records(1037));

        let fetched = fetch_all(&remote, &table(), 500).await.unwrap();

        assert_eq!(fetched.len(), 1037);
        assert_eq!(fetched[0].id.as_str(), "rec0");
        assert_eq!(fetched[1036].id.as_str(), "rec1036");
        assert_eq!(remote.page_requests().len(), 3);
    }

    #[tokio::test]
    async fn requests_carry_previous_cursor() {
        let remote = MockRemote::new();
        remote.serve_records(records(5));

        fetch_all(&remote, &table(), 2).await.unwrap();

        let tokens: Vec<Option<String>> = remote
            .page_requests()
            .iter()
            .map(|r| r.page_token.as_ref().map(|t| t.as_str().to_string()))
            .collect();
        assert_eq!(
            tokens,
            vec![None, Some("offset:2".into()), Some("offset:4".into())]
        );
    }

    #[tokio::test]
    async fn empty_table_is_one_request() {
        let remote = MockRemote::new();
        let fetched = fetch_all(&remote, &table(), 500).await.unwrap();
        assert!(fetched.is_empty());
        assert_eq!(remote.page_requests().len(), 1);
    }

    #[tokio::test]
    async fn page_failure_aborts_fetch() {
        let remote = MockRemote::new();
        remote.serve_records(records(1200));
        remote.fail_page(2, 99991400, "request trigger frequency limit");

        let result = fetch_all(&remote, &table(), 500).await;

        assert!(matches!(
            result,
            Err(FetchError::RemoteQuery { page: 2, .. })
        ));
        assert_eq!(remote.page_requests().len(), 2);
    }

    #[tokio::test]
    async fn page_size_is_clamped() {
        let remote = MockRemote::new();
        remote.serve_records(records(3));
        fetch_all(&remote, &table(), 10_000).await.unwrap();
        assert_eq!(remote.page_requests()[0].page_size, 500);
    }

    struct TokenlessRemote;

    #[async_trait]
    impl RemoteTable for TokenlessRemote {
        async fn list_records(&self, _request: &PageRequest) -> Result<RecordPage, RemoteError> {
            Ok(RecordPage {
                items: Vec::new(),
                has_more: true,
                page_token: None,
            })
        }

        async fn upload_media(
            &self,
            _table: &TableLocator,
            _upload: crate::remote::MediaUpload,
        ) -> Result<ContentHandle, RemoteError> {
            unreachable!()
        }

        async fn update_record(
            &self,
            _table: &TableLocator,
            _record_id: &RecordId,
            _update: &FieldUpdate,
        ) -> Result<(), RemoteError> {
            unreachable!()
        }

        async fn download_attachment(
            &self,
            _attachment: &AttachmentRef,
        ) -> Result<Vec<u8>, RemoteError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn more_pages_without_token_is_an_error() {
        let result = fetch_all(&TokenlessRemote, &table(), 500).await;
        assert!(matches!(
            result,
            Err(FetchError::MissingPageToken { page: 1 })
        ));
    }
}
