//! HTTP remote for the hosted table API.
//!
//! Every response is wrapped in a `{code, msg, data}` envelope; a non-zero
//! code is surfaced as [`RemoteError::Api`] even when the HTTP status is 200.

use super::{MediaUpload, RemoteError, RemoteTable};
use crate::auth::{fetch_app_access_token, AccessToken, AppCredentials, AuthError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tablesync_types::{
    AttachmentRef, ContentHandle, FieldUpdate, PageRequest, RecordId, RecordPage, TableLocator,
};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://open.feishu.cn";

/// Only view ids with this prefix are passed to the listing call.
const VIEW_PREFIX: &str = "vew";

/// Upload target kind for pictures stored in a table.
const PARENT_TYPE: &str = "bitable_image";

/// HTTP remote configuration.
#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    /// API base URL.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl Default for HttpRemoteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    fn into_data(self) -> Result<T, RemoteError> {
        if self.code != 0 {
            return Err(RemoteError::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        self.data
            .ok_or_else(|| RemoteError::Decode("response carried no data".into()))
    }

    fn check(self) -> Result<(), RemoteError> {
        if self.code != 0 {
            return Err(RemoteError::Api {
                code: self.code,
                msg: self.msg,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct UploadData {
    file_token: String,
}

#[derive(Debug, Deserialize)]
struct TmpUrlData {
    #[serde(default)]
    tmp_download_urls: Vec<TmpUrl>,
}

#[derive(Debug, Deserialize)]
struct TmpUrl {
    tmp_download_url: String,
}

/// Remote table backed by the hosted HTTP API.
pub struct HttpRemote {
    config: HttpRemoteConfig,
    http: reqwest::Client,
    token: AccessToken,
}

impl HttpRemote {
    /// Obtain an access token and build a ready-to-use remote.
    pub async fn connect(
        config: HttpRemoteConfig,
        credentials: &AppCredentials,
    ) -> Result<Self, AuthError> {
        let http = build_client(config.timeout).map_err(|e| AuthError::Request(e.to_string()))?;
        let token = fetch_app_access_token(&http, &config.base_url, credentials).await?;
        tracing::info!("Authenticated against {}", config.base_url);
        Ok(Self {
            config,
            http,
            token,
        })
    }

    /// Build a remote around an existing token.
    pub fn with_token(config: HttpRemoteConfig, token: AccessToken) -> Result<Self, RemoteError> {
        let http = build_client(config.timeout)?;
        Ok(Self {
            config,
            http,
            token,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Build the URL for a table's records collection.
    pub fn records_url(&self, table: &TableLocator) -> String {
        format!(
            "{}/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.base_url(),
            table.app_token,
            table.table_id
        )
    }

    /// Build the URL for a single record.
    pub fn record_url(&self, table: &TableLocator, record_id: &RecordId) -> String {
        format!("{}/{}", self.records_url(table), record_id)
    }

    /// Build the URL for media uploads.
    pub fn upload_url(&self) -> String {
        format!("{}/open-apis/drive/v1/medias/upload_all", self.base_url())
    }

    /// Build the URL that resolves attachment tokens to download links.
    pub fn tmp_download_url(&self) -> String {
        format!(
            "{}/open-apis/drive/v1/medias/batch_get_tmp_download_url",
            self.base_url()
        )
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<ApiEnvelope<T>, RemoteError> {
        let status = response.status();
        let body = response.bytes().await?;
        match serde_json::from_slice::<ApiEnvelope<T>>(&body) {
            Ok(envelope) => Ok(envelope),
            Err(_) if !status.is_success() => Err(RemoteError::Http(format!(
                "{}: {}",
                status,
                String::from_utf8_lossy(&body)
            ))),
            Err(e) => Err(RemoteError::Decode(e.to_string())),
        }
    }

    async fn resolve_download_link(&self, attachment: &AttachmentRef) -> Result<String, RemoteError> {
        let request = match &attachment.tmp_url {
            Some(tmp_url) if !tmp_url.is_empty() => self.http.get(tmp_url),
            _ => self
                .http
                .get(self.tmp_download_url())
                .query(&[("file_tokens", attachment.file_token.as_str())]),
        };
        let response = request.bearer_auth(self.token.as_str()).send().await?;
        let data: TmpUrlData = Self::decode(response).await?.into_data()?;
        data.tmp_download_urls
            .into_iter()
            .next()
            .map(|u| u.tmp_download_url)
            .ok_or_else(|| RemoteError::NotFound(attachment.file_token.clone()))
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, RemoteError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Query parameters for one listing request.
pub(crate) fn list_query(request: &PageRequest) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("page_size", request.page_size.to_string()),
        ("display_formula_ref", "true".to_string()),
        ("automatic_fields", "true".to_string()),
    ];
    if let Some(view) = &request.table.view_id {
        if view.starts_with(VIEW_PREFIX) {
            query.push(("view_id", view.clone()));
        }
    }
    if let Some(token) = &request.page_token {
        query.push(("page_token", token.as_str().to_string()));
    }
    query
}

#[async_trait]
impl RemoteTable for HttpRemote {
    async fn list_records(&self, request: &PageRequest) -> Result<RecordPage, RemoteError> {
        let response = self
            .http
            .get(self.records_url(&request.table))
            .query(&list_query(request))
            .bearer_auth(self.token.as_str())
            .send()
            .await?;

        // An empty table may come back without a data object.
        let envelope = Self::decode::<RecordPage>(response).await?;
        match envelope.data {
            None if envelope.code == 0 => Ok(RecordPage::default()),
            _ => envelope.into_data(),
        }
    }

    async fn upload_media(
        &self,
        table: &TableLocator,
        upload: MediaUpload,
    ) -> Result<ContentHandle, RemoteError> {
        let size = upload.bytes.len();
        let part = reqwest::multipart::Part::bytes(upload.bytes)
            .file_name(upload.file_name.clone())
            .mime_str(&upload.mime)?;
        let form = reqwest::multipart::Form::new()
            .text("file_name", upload.file_name.clone())
            .text("parent_type", PARENT_TYPE)
            .text("parent_node", table.app_token.clone())
            .text("size", size.to_string())
            .part("file", part);

        tracing::debug!("Uploading {} ({} bytes)", upload.file_name, size);
        let response = self
            .http
            .post(self.upload_url())
            .bearer_auth(self.token.as_str())
            .multipart(form)
            .send()
            .await?;

        let data: UploadData = Self::decode(response).await?.into_data()?;
        ContentHandle::new(data.file_token).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn update_record(
        &self,
        table: &TableLocator,
        record_id: &RecordId,
        update: &FieldUpdate,
    ) -> Result<(), RemoteError> {
        let response = self
            .http
            .put(self.record_url(table, record_id))
            .bearer_auth(self.token.as_str())
            .json(&update.to_body())
            .send()
            .await?;

        Self::decode::<serde_json::Value>(response).await?.check()
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, RemoteError> {
        let link = self.resolve_download_link(attachment).await?;
        let response = self
            .http
            .get(&link)
            .bearer_auth(self.token.as_str())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(RemoteError::Http(format!(
                "download returned {}",
                response.status()
            )));
        }
        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tablesync_types::PageToken;

    fn remote(base_url: &str) -> HttpRemote {
        HttpRemote::with_token(
            HttpRemoteConfig {
                base_url: base_url.into(),
                ..Default::default()
            },
            AccessToken::new("t-test"),
        )
        .unwrap()
    }

    fn table() -> TableLocator {
        TableLocator::new("bascnApp", "tblX").unwrap()
    }

    #[test]
    fn default_config() {
        let config = HttpRemoteConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn records_url_format() {
        let remote = remote("https://api.example.com/");
        assert_eq!(
            remote.records_url(&table()),
            "https://api.example.com/open-apis/bitable/v1/apps/bascnApp/tables/tblX/records"
        );
        assert_eq!(
            remote.record_url(&table(), &RecordId::new("rec1").unwrap()),
            "https://api.example.com/open-apis/bitable/v1/apps/bascnApp/tables/tblX/records/rec1"
        );
    }

    #[test]
    fn media_url_format() {
        let remote = remote("https://api.example.com");
        assert_eq!(
            remote.upload_url(),
            "https://api.example.com/open-apis/drive/v1/medias/upload_all"
        );
        assert_eq!(
            remote.tmp_download_url(),
            "https://api.example.com/open-apis/drive/v1/medias/batch_get_tmp_download_url"
        );
    }

    #[test]
    fn list_query_first_page() {
        let query = list_query(&PageRequest::first(table(), 500));
        assert!(query.contains(&("page_size", "500".to_string())));
        assert!(query.contains(&("display_formula_ref", "true".to_string())));
        assert!(query.contains(&("automatic_fields", "true".to_string())));
        assert!(!query.iter().any(|(k, _)| *k == "page_token"));
        assert!(!query.iter().any(|(k, _)| *k == "view_id"));
    }

    #[test]
    fn list_query_carries_token_and_view() {
        let request =
            PageRequest::first(table().with_view("vewAbc"), 100).next(PageToken::new("p2"));
        let query = list_query(&request);
        assert!(query.contains(&("view_id", "vewAbc".to_string())));
        assert!(query.contains(&("page_token", "p2".to_string())));
    }

    #[test]
    fn list_query_drops_foreign_view_ids() {
        let query = list_query(&PageRequest::first(table().with_view("grid1"), 100));
        assert!(!query.iter().any(|(k, _)| *k == "view_id"));
    }

    #[test]
    fn envelope_error_code_is_api_error() {
        let envelope: ApiEnvelope<UploadData> =
            serde_json::from_value(json!({"code": 1254043, "msg": "RecordIdNotFound"})).unwrap();
        assert!(matches!(
            envelope.into_data(),
            Err(RemoteError::Api { code: 1254043, .. })
        ));
    }

    #[test]
    fn envelope_decodes_page() {
        let envelope: ApiEnvelope<RecordPage> = serde_json::from_value(json!({
            "code": 0,
            "msg": "success",
            "data": {
                "has_more": true,
                "page_token": "next",
                "total": 2,
                "items": [
                    {"record_id": "rec1", "fields": {"文本": "A"}},
                    {"record_id": "rec2", "fields": {}}
                ]
            }
        }))
        .unwrap();
        let page = envelope.into_data().unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.has_more);
        assert_eq!(page.page_token.unwrap().as_str(), "next");
    }

    #[test]
    fn envelope_decodes_tmp_urls() {
        let envelope: ApiEnvelope<TmpUrlData> = serde_json::from_value(json!({
            "code": 0,
            "data": {"tmp_download_urls": [
                {"file_token": "t1", "tmp_download_url": "https://dl/1"}
            ]}
        }))
        .unwrap();
        let data = envelope.into_data().unwrap();
        assert_eq!(data.tmp_download_urls[0].tmp_download_url, "https://dl/1");
    }
}
