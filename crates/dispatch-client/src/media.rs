//! Media uploads to Firebase Storage over its REST API.

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::stream;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

const MEDIA_PREFIX: &str = "media";
const UPLOAD_CHUNK_BYTES: usize = 256 * 1024;
const PROGRESS_BEFORE_ACK: f64 = 0.99;

// Characters left alone by JavaScript's encodeURIComponent.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("no file was provided")]
    Empty,
    #[error("only image or video files can be uploaded, got {0}")]
    UnsupportedType(String),
    #[error("file is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },
    #[error("invalid storage url: {0}")]
    Url(String),
    #[error("storage transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("upload failed with {0}")]
    Status(StatusCode),
    #[error("malformed upload response: {0}")]
    Malformed(String),
}

/// A file as received from the complainant.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct StoredObject {
    name: String,
    #[serde(rename = "downloadTokens", default)]
    download_tokens: Option<String>,
}

/// Fractional completion of one upload in `[0, 1]`, readable while it runs.
#[derive(Debug, Clone)]
pub struct UploadProgress {
    sender: Arc<watch::Sender<f64>>,
}

impl UploadProgress {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(0.0);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn fraction(&self) -> f64 {
        *self.sender.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<f64> {
        self.sender.subscribe()
    }

    fn set(&self, fraction: f64) {
        self.sender.send_replace(fraction);
    }
}

impl Default for UploadProgress {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct MediaStore {
    client: Client,
    base_url: Url,
    bucket: String,
    max_upload_bytes: u64,
}

impl MediaStore {
    pub fn new(base_url: &str, bucket: &str, max_upload_bytes: u64) -> Result<Self, UploadError> {
        Self::with_client(Client::new(), base_url, bucket, max_upload_bytes)
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        bucket: &str,
        max_upload_bytes: u64,
    ) -> Result<Self, UploadError> {
        let base = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|err| UploadError::Url(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            bucket: bucket.trim().to_string(),
            max_upload_bytes,
        })
    }

    /// Rejects empty, oversized and non image/video files. Returns the content
    /// type to upload with.
    pub fn check(&self, file: &MediaFile) -> Result<String, UploadError> {
        if file.bytes.is_empty() {
            return Err(UploadError::Empty);
        }
        let size = file.bytes.len() as u64;
        if size > self.max_upload_bytes {
            return Err(UploadError::TooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }
        media_content_type(&file.file_name, file.content_type.as_deref())
    }

    /// Uploads `file` under `media/` and returns its durable download url.
    ///
    /// Progress is published on `progress` as body chunks are handed to the
    /// connection, and reaches 1.0 once the object is stored.
    pub async fn upload(
        &self,
        file: MediaFile,
        today: NaiveDate,
        progress: Option<UploadProgress>,
    ) -> Result<String, UploadError> {
        let content_type = self.check(&file)?;
        let object = format!("{MEDIA_PREFIX}/{}", object_name(&file.file_name, today));
        let url = self.upload_url(&object)?;
        let total = file.bytes.len();

        if let Some(progress) = &progress {
            progress.set(0.0);
        }
        let chunks: Vec<Vec<u8>> = file
            .bytes
            .chunks(UPLOAD_CHUNK_BYTES)
            .map(<[u8]>::to_vec)
            .collect();
        let reporter = progress.clone();
        let mut sent = 0_usize;
        let body = stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            if let Some(progress) = &reporter {
                // the last chunk is reported once the response confirms it
                progress.set(fraction(sent, total).min(PROGRESS_BEFORE_ACK));
            }
            Ok::<_, std::io::Error>(chunk)
        }));

        debug!(object = %object, bytes = total, content_type = %content_type, "uploading media");
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(Body::wrap_stream(body))
            .send()
            .await
            .map_err(UploadError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status(status));
        }
        let stored: StoredObject = response
            .json()
            .await
            .map_err(|err| UploadError::Malformed(err.to_string()))?;
        let token = stored
            .download_tokens
            .as_deref()
            .and_then(|tokens| tokens.split(',').map(str::trim).find(|token| !token.is_empty()))
            .ok_or_else(|| UploadError::Malformed("response has no download token".to_string()))?;

        if let Some(progress) = &progress {
            progress.set(1.0);
        }
        let download_url = self.download_url(&stored.name, token);
        info!(object = %stored.name, bytes = total, "media uploaded");
        Ok(download_url)
    }

    fn upload_url(&self, object: &str) -> Result<Url, UploadError> {
        let mut url = self
            .base_url
            .join(&format!("v0/b/{}/o", self.bucket))
            .map_err(|err| UploadError::Url(err.to_string()))?;
        url.query_pairs_mut().append_pair("name", object);
        Ok(url)
    }

    pub fn download_url(&self, object: &str, token: &str) -> String {
        format!(
            "{}v0/b/{}/o/{}?alt=media&token={}",
            self.base_url,
            self.bucket,
            utf8_percent_encode(object, COMPONENT),
            utf8_percent_encode(token, COMPONENT)
        )
    }
}

/// `"{stem} - {YYYY-MM-DD}{.ext}"` from the final path component of `file_name`.
pub fn object_name(file_name: &str, date: NaiveDate) -> String {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name)
        .trim();
    let path = Path::new(base);
    let stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("upload");
    let date = date.format("%Y-%m-%d");
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{stem} - {date}.{ext}"),
        _ => format!("{stem} - {date}"),
    }
}

/// Content type for an upload: the declared one when usable, otherwise guessed
/// from the file name. Only `image/*` and `video/*` are accepted.
pub fn media_content_type(file_name: &str, declared: Option<&str>) -> Result<String, UploadError> {
    let declared = declared
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty() && value != "application/octet-stream");
    let content_type = match declared {
        Some(value) => value,
        None => mime_guess::from_path(file_name)
            .first()
            .map(|mime| mime.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    };
    if content_type.starts_with("image/") || content_type.starts_with("video/") {
        Ok(content_type)
    } else {
        Err(UploadError::UnsupportedType(content_type))
    }
}

fn fraction(sent: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    (sent as f64 / total as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(limit: u64) -> MediaStore {
        MediaStore::new(
            "https://firebasestorage.googleapis.com",
            "dispatch.appspot.com",
            limit,
        )
        .unwrap()
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    #[test]
    fn object_names_carry_the_upload_date() {
        assert_eq!(object_name("flood.jpg", day()), "flood - 2024-05-01.jpg");
        assert_eq!(
            object_name("C:\\Users\\juan\\clip.final.mp4", day()),
            "clip.final - 2024-05-01.mp4"
        );
        assert_eq!(object_name("snapshot", day()), "snapshot - 2024-05-01");
        assert_eq!(object_name("", day()), "upload - 2024-05-01");
    }

    #[test]
    fn accepts_only_images_and_videos() {
        assert_eq!(media_content_type("a.PNG", None).unwrap(), "image/png");
        assert_eq!(
            media_content_type("clip", Some("video/mp4")).unwrap(),
            "video/mp4"
        );
        assert_eq!(
            media_content_type("clip.mp4", Some("application/octet-stream")).unwrap(),
            "video/mp4"
        );
        assert!(matches!(
            media_content_type("notes.pdf", None),
            Err(UploadError::UnsupportedType(_))
        ));
    }

    #[test]
    fn rejects_files_over_the_limit() {
        let store = store(4);
        let file = MediaFile {
            file_name: "a.jpg".to_string(),
            content_type: None,
            bytes: vec![0; 5],
        };
        assert!(matches!(
            store.check(&file),
            Err(UploadError::TooLarge { size: 5, limit: 4 })
        ));

        let empty = MediaFile {
            bytes: Vec::new(),
            ..file
        };
        assert!(matches!(store.check(&empty), Err(UploadError::Empty)));
    }

    #[test]
    fn builds_upload_and_download_urls() {
        let store = store(10);
        let url = store.upload_url("media/flood - 2024-05-01.jpg").unwrap();
        assert_eq!(
            url.as_str(),
            "https://firebasestorage.googleapis.com/v0/b/dispatch.appspot.com/o?name=media%2Fflood+-+2024-05-01.jpg"
        );
        assert_eq!(
            store.download_url("media/flood - 2024-05-01.jpg", "tok-1"),
            "https://firebasestorage.googleapis.com/v0/b/dispatch.appspot.com/o/media%2Fflood%20-%202024-05-01.jpg?alt=media&token=tok-1"
        );
    }

    #[test]
    fn progress_fraction_is_bounded() {
        assert_eq!(fraction(0, 10), 0.0);
        assert_eq!(fraction(5, 10), 0.5);
        assert_eq!(fraction(12, 10), 1.0);
        assert_eq!(fraction(0, 0), 1.0);
    }
}
