//! The three transfer tasks run by the engine.
//!
//! - [`ImageUploadTask`]: upload every file of a group, then attach all
//!   handles to the record in one update
//! - [`TextUploadTask`]: join a group's text files and write them to a
//!   text field
//! - [`DownloadTask`]: write a record's text to `{key}.txt` and its first
//!   attachment next to it
//!
//! Each `execute` is one attempt. Retrying is the engine's job.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tablesync_types::{AttachmentRef, FieldUpdate, RecordId, TableLocator, UploadedAttachment};
use thiserror::Error;

use crate::engine::TransferTask;
use crate::remote::{MediaUpload, RemoteError, RemoteTable};

/// Errors from a single transfer attempt.
#[derive(Debug, Error)]
pub enum TransferError {
    /// A remote call failed.
    #[error("remote call failed: {0}")]
    Remote(#[from] RemoteError),

    /// Reading or writing a local file failed.
    #[error("failed to access {}: {source}", path.display())]
    Io {
        /// File being read or written.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: io::Error,
    },

    /// Every file of a multi-file upload failed.
    #[error("none of {attempted} files could be uploaded")]
    NothingUploaded {
        /// Files tried.
        attempted: usize,
    },

    /// The task cannot proceed with its input.
    #[error("{0}")]
    Rejected(String),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> TransferError + '_ {
    move |source| TransferError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// MIME type declared for an uploaded file, from its extension.
pub fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

/// File stem for a key, with path separators replaced.
pub fn safe_file_stem(key: &str) -> String {
    key.chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

/// Decode a text file: UTF-8 when valid, otherwise GBK with unmappable
/// bytes dropped.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, had_errors) = encoding_rs::GBK.decode_without_bom_handling(bytes);
            if had_errors {
                text.chars().filter(|&c| c != char::REPLACEMENT_CHARACTER).collect()
            } else {
                text.into_owned()
            }
        }
    }
}

fn file_name_of(path: &Path) -> Result<String, TransferError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| TransferError::Rejected(format!("unusable file name: {}", path.display())))
}

/// Upload a group of image files and attach them to one record.
pub struct ImageUploadTask<R: RemoteTable> {
    remote: Arc<R>,
    table: TableLocator,
    record_id: RecordId,
    key: String,
    field: String,
    paths: Vec<PathBuf>,
    pacing: Duration,
}

impl<R: RemoteTable> ImageUploadTask<R> {
    /// Create a task.
    pub fn new(
        remote: Arc<R>,
        table: TableLocator,
        record_id: RecordId,
        key: String,
        field: &str,
        paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            remote,
            table,
            record_id,
            key,
            field: field.to_string(),
            paths,
            pacing: Duration::ZERO,
        }
    }

    /// Wait this long between two sub-uploads.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    async fn upload_one(&self, path: &Path) -> Result<UploadedAttachment, TransferError> {
        let file_name = file_name_of(path)?;
        let bytes = tokio::fs::read(path).await.map_err(io_error(path))?;
        let handle = self
            .remote
            .upload_media(
                &self.table,
                MediaUpload {
                    file_name: file_name.clone(),
                    mime: mime_for(path).to_string(),
                    bytes,
                },
            )
            .await?;
        Ok(UploadedAttachment::image(handle, &file_name))
    }
}

#[async_trait]
impl<R: RemoteTable + 'static> TransferTask for ImageUploadTask<R> {
    fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn execute(&self) -> Result<(), TransferError> {
        let mut uploaded = Vec::with_capacity(self.paths.len());

        for (i, path) in self.paths.iter().enumerate() {
            if i > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
            match self.upload_one(path).await {
                Ok(attachment) => uploaded.push(attachment),
                Err(e) => {
                    tracing::warn!("Skipping {} for {}: {}", path.display(), self.key, e);
                }
            }
        }

        if uploaded.is_empty() {
            return Err(TransferError::NothingUploaded {
                attempted: self.paths.len(),
            });
        }

        tracing::debug!(
            "Uploaded {}/{} files for {}",
            uploaded.len(),
            self.paths.len(),
            self.key
        );
        let update = FieldUpdate::attachments(&self.field, uploaded);
        self.remote
            .update_record(&self.table, &self.record_id, &update)
            .await?;
        Ok(())
    }
}

/// Write a group of text files into one text field.
pub struct TextUploadTask<R: RemoteTable> {
    remote: Arc<R>,
    table: TableLocator,
    record_id: RecordId,
    key: String,
    field: String,
    paths: Vec<PathBuf>,
}

impl<R: RemoteTable> TextUploadTask<R> {
    /// Create a task.
    pub fn new(
        remote: Arc<R>,
        table: TableLocator,
        record_id: RecordId,
        key: String,
        field: &str,
        paths: Vec<PathBuf>,
    ) -> Self {
        Self {
            remote,
            table,
            record_id,
            key,
            field: field.to_string(),
            paths,
        }
    }
}

#[async_trait]
impl<R: RemoteTable + 'static> TransferTask for TextUploadTask<R> {
    fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn execute(&self) -> Result<(), TransferError> {
        let mut parts = Vec::with_capacity(self.paths.len());
        for path in &self.paths {
            let bytes = tokio::fs::read(path).await.map_err(io_error(path))?;
            parts.push(decode_text(&bytes));
        }

        let update = FieldUpdate::text(&self.field, parts.join("\n"));
        self.remote
            .update_record(&self.table, &self.record_id, &update)
            .await?;
        Ok(())
    }
}

/// Write a record's text, and its first attachment, into a directory.
pub struct DownloadTask<R: RemoteTable> {
    remote: Arc<R>,
    record_id: RecordId,
    key: String,
    text: String,
    attachment: Option<AttachmentRef>,
    directory: PathBuf,
    attachment_extension: String,
}

impl<R: RemoteTable> DownloadTask<R> {
    /// Create a task.
    pub fn new(
        remote: Arc<R>,
        record_id: RecordId,
        key: String,
        text: String,
        attachment: Option<AttachmentRef>,
        directory: &Path,
        attachment_extension: &str,
    ) -> Self {
        Self {
            remote,
            record_id,
            key,
            text,
            attachment,
            directory: directory.to_path_buf(),
            attachment_extension: attachment_extension.trim_start_matches('.').to_string(),
        }
    }

    /// Path the text is written to.
    pub fn text_path(&self) -> PathBuf {
        self.directory
            .join(format!("{}.txt", safe_file_stem(&self.key)))
    }

    /// Path the attachment is written to.
    pub fn attachment_path(&self) -> PathBuf {
        self.directory.join(format!(
            "{}.{}",
            safe_file_stem(&self.key),
            self.attachment_extension
        ))
    }
}

#[async_trait]
impl<R: RemoteTable + 'static> TransferTask for DownloadTask<R> {
    fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    fn key(&self) -> &str {
        &self.key
    }

    async fn execute(&self) -> Result<(), TransferError> {
        let text_path = self.text_path();
        tokio::fs::write(&text_path, self.text.as_bytes())
            .await
            .map_err(io_error(&text_path))?;

        if let Some(attachment) = &self.attachment {
            let bytes = self.remote.download_attachment(attachment).await?;
            let path = self.attachment_path();
            tokio::fs::write(&path, bytes)
                .await
                .map_err(io_error(&path))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::MockRemote;
    use std::fs;
    use tablesync_types::UpdateValue;
    use tempfile::TempDir;

    fn table() -> TableLocator {
        TableLocator::new("app1", "tbl1").unwrap()
    }

    fn rid(id: &str) -> RecordId {
        RecordId::new(id).unwrap()
    }

    fn write_files(dir: &TempDir, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, format!("content of {}", name)).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn mime_follows_extension() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.jpeg")), "image/jpeg");
        assert_eq!(mime_for(Path::new("a.txt")), "text/plain");
        assert_eq!(mime_for(Path::new("a")), "application/octet-stream");
    }

    #[test]
    fn file_stem_strips_separators() {
        assert_eq!(safe_file_stem("a/b\\c"), "a_b_c");
        assert_eq!(safe_file_stem("plain"), "plain");
    }

    #[tokio::test]
    async fn image_upload_attaches_all_handles_in_order() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["A_1.png", "A_2.png"]);
        let remote = Arc::new(MockRemote::new());
        let task = ImageUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "A".into(),
            "图片",
            paths,
        );

        task.execute().await.unwrap();

        let uploads = remote.uploads();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].file_name, "A_1.png");
        assert_eq!(uploads[0].mime, "image/png");
        assert_eq!(uploads[0].bytes, b"content of A_1.png");

        let updates = remote.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0.as_str(), "rec1");
        match &updates[0].1.value {
            UpdateValue::Attachments(list) => {
                let names: Vec<&str> = list.iter().map(|a| a.name.as_str()).collect();
                assert_eq!(names, vec!["A_1.png", "A_2.png"]);
                assert!(list.iter().all(|a| a.kind == "image"));
            }
            other => panic!("expected attachments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn partial_upload_updates_with_successful_handles_only() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["A_1.png", "A_2.png"]);
        let remote = Arc::new(MockRemote::new());
        remote.fail_uploads_for("A_1.png");
        let task = ImageUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "A".into(),
            "图片",
            paths,
        );

        task.execute().await.unwrap();

        let updates = remote.updates();
        assert_eq!(updates.len(), 1);
        let handles = updates[0].1.handles();
        assert_eq!(handles.len(), 1);
        match &updates[0].1.value {
            UpdateValue::Attachments(list) => assert_eq!(list[0].name, "A_2.png"),
            other => panic!("expected attachments, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn all_uploads_failing_is_an_error_without_update() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["A_1.png"]);
        let remote = Arc::new(MockRemote::new());
        remote.fail_uploads_for("A_1.png");
        let task = ImageUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "A".into(),
            "图片",
            paths,
        );

        let result = task.execute().await;

        assert!(matches!(
            result,
            Err(TransferError::NothingUploaded { attempted: 1 })
        ));
        assert!(remote.updates().is_empty());
    }

    #[tokio::test]
    async fn missing_file_is_skipped_like_a_failed_upload() {
        let dir = TempDir::new().unwrap();
        let mut paths = write_files(&dir, &["A_2.png"]);
        paths.insert(0, dir.path().join("A_1.png"));
        let remote = Arc::new(MockRemote::new());
        let task = ImageUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "A".into(),
            "图片",
            paths,
        );

        task.execute().await.unwrap();
        assert_eq!(remote.uploads().len(), 1);
        assert_eq!(remote.updates()[0].1.handles().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn sub_uploads_are_paced() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["A_1.png", "A_2.png", "A_3.png"]);
        let remote = Arc::new(MockRemote::new());
        let task = ImageUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "A".into(),
            "图片",
            paths,
        )
        .with_pacing(Duration::from_secs(1));

        let started = tokio::time::Instant::now();
        task.execute().await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(2));
        assert_eq!(remote.uploads().len(), 3);
    }

    #[tokio::test]
    async fn failed_update_fails_the_attempt() {
        let dir = TempDir::new().unwrap();
        let paths = write_files(&dir, &["A.png"]);
        let remote = Arc::new(MockRemote::new());
        remote.fail_next_updates(1);
        let task = ImageUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "A".into(),
            "图片",
            paths,
        );

        assert!(matches!(
            task.execute().await,
            Err(TransferError::Remote(_))
        ));
        task.execute().await.unwrap();
        assert_eq!(remote.updates().len(), 1);
    }

    #[tokio::test]
    async fn text_upload_joins_parts() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("K_1.txt"), "first").unwrap();
        fs::write(dir.path().join("K_2.txt"), [b's', 0xff, b'x']).unwrap();
        let remote = Arc::new(MockRemote::new());
        let task = TextUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "K".into(),
            "计算_json",
            vec![dir.path().join("K_1.txt"), dir.path().join("K_2.txt")],
        );

        task.execute().await.unwrap();

        let updates = remote.updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            updates[0].1,
            FieldUpdate::text("计算_json", "first\nsx".into())
        );
    }

    #[test]
    fn text_decoding_falls_back_to_gbk() {
        assert_eq!(decode_text("中文".as_bytes()), "中文");
        assert_eq!(decode_text(&[0xD6, 0xD0, 0xCE, 0xC4]), "中文");
        assert_eq!(decode_text(&[b'a', 0xD6, 0xD0, 0xFF]), "a中");
    }

    #[tokio::test]
    async fn gbk_text_file_is_uploaded_as_text() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("K.txt");
        fs::write(&path, [0xD6, 0xD0, 0xCE, 0xC4]).unwrap();
        let remote = Arc::new(MockRemote::new());
        let task = TextUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "K".into(),
            "文本",
            vec![path],
        );

        task.execute().await.unwrap();

        assert_eq!(
            remote.updates()[0].1,
            FieldUpdate::text("文本", "中文".into())
        );
    }

    #[tokio::test]
    async fn text_upload_with_unreadable_file_fails() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemote::new());
        let task = TextUploadTask::new(
            Arc::clone(&remote),
            table(),
            rid("rec1"),
            "K".into(),
            "计算_json",
            vec![dir.path().join("missing.txt")],
        );

        assert!(matches!(
            task.execute().await,
            Err(TransferError::Io { .. })
        ));
        assert!(remote.updates().is_empty());
    }

    #[tokio::test]
    async fn download_writes_text_and_attachment() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemote::new());
        remote.add_download("tok1", b"\x89PNG".to_vec());
        let attachment: AttachmentRef =
            serde_json::from_value(serde_json::json!({"file_token": "tok1"})).unwrap();
        let task = DownloadTask::new(
            Arc::clone(&remote),
            rid("rec1"),
            "img1".into(),
            "a caption".into(),
            Some(attachment),
            dir.path(),
            ".png",
        );

        task.execute().await.unwrap();

        assert_eq!(
            fs::read_to_string(dir.path().join("img1.txt")).unwrap(),
            "a caption"
        );
        assert_eq!(fs::read(dir.path().join("img1.png")).unwrap(), b"\x89PNG");
    }

    #[tokio::test]
    async fn download_without_attachment_writes_text_only() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemote::new());
        let task = DownloadTask::new(
            Arc::clone(&remote),
            rid("rec1"),
            "a/b".into(),
            "text".into(),
            None,
            dir.path(),
            "png",
        );

        task.execute().await.unwrap();

        assert!(dir.path().join("a_b.txt").exists());
        assert!(remote.download_requests().is_empty());
    }

    #[tokio::test]
    async fn failed_download_fails_the_attempt() {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemote::new());
        remote.fail_next_downloads(1);
        let attachment: AttachmentRef =
            serde_json::from_value(serde_json::json!({"file_token": "tok1"})).unwrap();
        let task = DownloadTask::new(
            Arc::clone(&remote),
            rid("rec1"),
            "img1".into(),
            "text".into(),
            Some(attachment),
            dir.path(),
            "png",
        );

        assert!(matches!(
            task.execute().await,
            Err(TransferError::Remote(_))
        ));
    }
}
