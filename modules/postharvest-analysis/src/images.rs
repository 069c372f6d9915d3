// Source images for vision-capable models, fetched and base64-encoded.

use async_trait::async_trait;
use base64::Engine;
use tracing::{debug, warn};

/// Images above this size are skipped rather than sent to a model.
const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("Image request failed: {0}")]
    Network(String),

    #[error("Image request returned HTTP {0}")]
    Status(u16),

    #[error("Not an image: {0}")]
    NotAnImage(String),

    #[error("Image too large: {0} bytes")]
    TooLarge(usize),
}

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        ImageError::Network(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EncodedImage {
    pub media_type: String,
    pub data_base64: String,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<EncodedImage, ImageError>;
}

pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<EncodedImage, ImageError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ImageError::Status(status.as_u16()));
        }

        let header_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());

        let bytes = resp.bytes().await?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(ImageError::TooLarge(bytes.len()));
        }

        let media_type = header_type
            .filter(|t| t.starts_with("image/"))
            .or_else(|| sniff_media_type(&bytes).map(str::to_string))
            .ok_or_else(|| ImageError::NotAnImage(url.to_string()))?;

        Ok(EncodedImage {
            media_type,
            data_base64: base64::engine::general_purpose::STANDARD.encode(&bytes),
        })
    }
}

/// Magic-byte detection for CDNs that serve images as octet-stream.
fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', ..] => Some("image/gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("image/webp"),
        _ => None,
    }
}

/// Fetch up to `limit` images in order. Failures are logged and skipped.
pub async fn collect_images(
    fetcher: &dyn ImageFetcher,
    urls: &[String],
    limit: usize,
) -> Vec<EncodedImage> {
    let mut images = Vec::with_capacity(limit.min(urls.len()));
    for url in urls.iter().take(limit) {
        match fetcher.fetch(url).await {
            Ok(image) => images.push(image),
            Err(e) => warn!(url = %url, error = %e, "Skipping image"),
        }
    }
    debug!(requested = urls.len().min(limit), fetched = images.len(), "Images prepared");
    images
}
