//! Image download and validation.
//!
//! The [`Downloader`] fetches candidate bytes through an [`ImageFetcher`]
//! and decodes them to learn their dimensions. Every failure is a soft
//! [`Rejection`]; nothing is written to storage here.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, ImageReader};
use sku_finder_source::USER_AGENT;

use crate::PipelineError;
use crate::key::{DEFAULT_EXTENSION, url_extension};

/// Timeout applied to each image download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Largest image body accepted, in bytes.
pub const MAX_IMAGE_BYTES: usize = 25 * 1024 * 1024;

/// Fetches raw image bytes for a URL.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Downloads the full body at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on network failure or a non-200 status.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError>;
}

/// [`ImageFetcher`] backed by `reqwest`.
///
/// Bodies larger than the configured limit are rejected, either up front
/// from `Content-Length` or while streaming.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageFetcher {
    /// Creates a fetcher with a browser-like `User-Agent` and the given
    /// timeout.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Http`] if the client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    /// Overrides the body size limit.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, PipelineError> {
        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(PipelineError::Status {
                status: status.as_u16(),
                url: url.to_owned(),
            });
        }

        let too_large = || PipelineError::TooLarge {
            url: url.to_owned(),
            limit: self.max_bytes,
        };
        let declared = response
            .content_length()
            .map(|len| usize::try_from(len).unwrap_or(usize::MAX));
        if declared.is_some_and(|len| len > self.max_bytes) {
            return Err(too_large());
        }

        let mut body = Vec::with_capacity(declared.unwrap_or_default());
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// A downloaded image that decoded successfully.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedImage {
    /// Raw bytes exactly as served.
    pub bytes: Vec<u8>,
    /// Decoded width in pixels.
    pub width: u32,
    /// Decoded height in pixels.
    pub height: u32,
    /// Detected container format.
    pub format: Option<ImageFormat>,
}

impl FetchedImage {
    /// File extension for storing this image: the decoded format's
    /// canonical extension, else the URL's, else `jpg`.
    #[must_use]
    pub fn extension(&self, url: &str) -> String {
        self.format
            .and_then(|f| f.extensions_str().first().copied())
            .map(str::to_owned)
            .or_else(|| url_extension(url))
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned())
    }
}

/// Why a candidate image was not usable.
#[derive(Debug, thiserror::Error)]
pub enum Rejection {
    /// The download failed or returned a non-200 status.
    #[error("download failed: {0}")]
    Fetch(PipelineError),

    /// The body is not a decodable image.
    #[error("not a valid image: {0}")]
    Undecodable(#[from] image::ImageError),
}

impl Rejection {
    /// Whether fetching the same URL again would be rejected the same way.
    /// Network failures and bad statuses may be transient; bad bodies are
    /// not.
    #[must_use]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::Undecodable(_) | Self::Fetch(PipelineError::TooLarge { .. })
        )
    }
}

/// Downloads and validates candidate images.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn ImageFetcher>,
}

impl std::fmt::Debug for Downloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Downloader").finish_non_exhaustive()
    }
}

impl Downloader {
    /// Creates a downloader over `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetches `url` and decodes the body.
    ///
    /// # Errors
    ///
    /// Returns a [`Rejection`] if the fetch fails or the bytes are not an
    /// image. Callers log and skip the candidate.
    pub async fn download(&self, url: &str) -> Result<FetchedImage, Rejection> {
        let bytes = self.fetcher.fetch(url).await.map_err(Rejection::Fetch)?;
        let (width, height, format) = inspect(&bytes)?;
        Ok(FetchedImage {
            bytes,
            width,
            height,
            format,
        })
    }
}

/// Decodes `bytes` fully and returns `(width, height, format)`.
///
/// # Errors
///
/// Returns [`image::ImageError`] if the format is unknown or the data is
/// corrupt.
pub fn inspect(bytes: &[u8]) -> Result<(u32, u32, Option<ImageFormat>), image::ImageError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format();
    let decoded = reader.decode()?;
    Ok((decoded.width(), decoded.height(), format))
}


#[cfg(test)]
mod tests {
    use super::test_support::{StubFetcher, png};
    use super::*;

    #[test]
    fn inspects_dimensions_and_format() {
        let (w, h, format) = inspect(&png(320, 240)).unwrap();
        assert_eq!((w, h), (320, 240));
        assert_eq!(format, Some(ImageFormat::Png));
    }

    #[test]
    fn garbage_is_not_an_image() {
        assert!(inspect(b"<html>not an image</html>").is_err());
        let mut truncated = png(50, 50);
        truncated.truncate(truncated.len() / 2);
        assert!(inspect(&truncated).is_err());
    }

    #[tokio::test]
    async fn download_keeps_bytes_intact() {
        let body = png(400, 400);
        let fetcher = StubFetcher::default().with("https://x.com/a.png", body.clone());
        let downloader = Downloader::new(Arc::new(fetcher));

        let image = downloader.download("https://x.com/a.png").await.unwrap();
        assert_eq!(image.bytes, body);
        assert_eq!((image.width, image.height), (400, 400));
        assert_eq!(image.extension("https://x.com/a.jpg"), "png");
    }

    #[tokio::test]
    async fn missing_and_invalid_bodies_are_rejected() {
        let fetcher = StubFetcher::default().with("https://x.com/bad.jpg", b"nope".to_vec());
        let downloader = Downloader::new(Arc::new(fetcher));

        assert!(matches!(
            downloader.download("https://x.com/missing.jpg").await,
            Err(Rejection::Fetch(_))
        ));
        let bad = downloader.download("https://x.com/bad.jpg").await.unwrap_err();
        assert!(matches!(bad, Rejection::Undecodable(_)));
        assert!(bad.is_permanent());
        let missing = downloader
            .download("https://x.com/missing.jpg")
            .await
            .unwrap_err();
        assert!(!missing.is_permanent());
    }

    /// Serves `response` verbatim to the first connection, then closes it.
    async fn serve_once(response: Vec<u8>) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0_u8; 4096];
            let _ = socket.read(&mut request).await;
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/image.png")
    }

    fn http_fetcher(max_bytes: usize) -> HttpImageFetcher {
        HttpImageFetcher {
            client: reqwest::Client::builder().no_proxy().build().unwrap(),
            max_bytes,
        }
    }

    fn response(head: &str, body: &[u8]) -> Vec<u8> {
        let mut bytes = head.as_bytes().to_vec();
        bytes.extend_from_slice(body);
        bytes
    }

    #[tokio::test]
    async fn declared_oversized_bodies_are_refused() {
        let url = serve_once(response(
            "HTTP/1.1 200 OK\r\nContent-Length: 64\r\nConnection: close\r\n\r\n",
            &[7; 64],
        ))
        .await;
        assert!(matches!(
            http_fetcher(16).fetch(&url).await,
            Err(PipelineError::TooLarge { limit: 16, .. })
        ));
    }

    #[tokio::test]
    async fn undeclared_oversized_bodies_are_cut_off() {
        let url = serve_once(response(
            "HTTP/1.1 200 OK\r\nConnection: close\r\n\r\n",
            &[7; 64],
        ))
        .await;
        assert!(matches!(
            http_fetcher(16).fetch(&url).await,
            Err(PipelineError::TooLarge { .. })
        ));
    }

    #[tokio::test]
    async fn bodies_within_the_limit_are_returned_whole() {
        let url = serve_once(response(
            "HTTP/1.1 200 OK\r\nContent-Length: 64\r\nConnection: close\r\n\r\n",
            &[7; 64],
        ))
        .await;
        assert_eq!(http_fetcher(64).fetch(&url).await.unwrap(), vec![7; 64]);
    }

    #[tokio::test]
    async fn non_200_is_an_error() {
        let url = serve_once(response(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            &[],
        ))
        .await;
        assert!(matches!(
            http_fetcher(64).fetch(&url).await,
            Err(PipelineError::Status { status: 404, .. })
        ));
    }

    #[test]
    fn extension_falls_back_to_url_then_default() {
        let image = FetchedImage {
            bytes: Vec::new(),
            width: 1,
            height: 1,
            format: None,
        };
        assert_eq!(image.extension("https://x.com/a.webp"), "webp");
        assert_eq!(image.extension("https://x.com/a"), "jpg");
    }
}
