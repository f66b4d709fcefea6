//! Cloudflare R2 store (S3-compatible).
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |---|---|---|
//! | `CLOUDFLARE_ACCOUNT_ID` | Yes | Cloudflare account ID (builds the R2 endpoint) |
//! | `R2_ACCESS_KEY_ID` | Yes | S3-compatible access key for R2 |
//! | `R2_SECRET_ACCESS_KEY` | Yes | S3-compatible secret key for R2 |
//! | `SKU_FINDER_R2_BUCKET` | No | Bucket name (default `sku-finder-images`) |
//!
//! Uploads are skipped when the remote object's `ETag` already equals the
//! MD5 of the bytes being written.

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::{Credentials, StalledStreamProtectionConfig};
use aws_sdk_s3::primitives::ByteStream;

use crate::{ArtifactStore, StorageError, md5_hex, validate_key};

/// Bucket used when `SKU_FINDER_R2_BUCKET` is not set.
pub const DEFAULT_BUCKET: &str = "sku-finder-images";

/// Stores artifacts as objects in an R2 bucket.
pub struct R2Store {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl std::fmt::Debug for R2Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("R2Store")
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl R2Store {
    /// Creates a store from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::MissingEnv`] if any required variable is
    /// unset.
    pub fn from_env() -> Result<Self, StorageError> {
        let account_id = require_env("CLOUDFLARE_ACCOUNT_ID")?;
        let access_key = require_env("R2_ACCESS_KEY_ID")?;
        let secret_key = require_env("R2_SECRET_ACCESS_KEY")?;
        let bucket = std::env::var("SKU_FINDER_R2_BUCKET")
            .ok()
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BUCKET.to_owned());

        let endpoint = format!("https://{account_id}.r2.cloudflarestorage.com");
        let creds = Credentials::new(&access_key, &secret_key, None, None, "r2-env");

        let config = aws_sdk_s3::Config::builder()
            .endpoint_url(&endpoint)
            .region(Region::new("auto"))
            .credentials_provider(creds)
            .force_path_style(true)
            .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            bucket,
        })
    }

    fn location(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.bucket)
    }

    /// Returns the remote `ETag` (without quotes), or `None` if the object
    /// does not exist or cannot be inspected.
    async fn remote_etag(&self, key: &str) -> Option<String> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output.e_tag().map(|e| e.trim_matches('"').to_owned()),
            Err(e) => {
                let not_found = e
                    .as_service_error()
                    .is_some_and(aws_sdk_s3::operation::head_object::HeadObjectError::is_not_found);
                if !not_found {
                    log::debug!("HeadObject {} failed: {e}", self.location(key));
                }
                None
            }
        }
    }
}

#[async_trait]
impl ArtifactStore for R2Store {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        validate_key(key)?;
        let location = self.location(key);

        if self.remote_etag(key).await.as_deref() == Some(md5_hex(bytes).as_str()) {
            log::info!("{location}: skipped (unchanged)");
            return Ok(location);
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes.to_vec()))
            .content_type(content_type_for(key))
            .send()
            .await
            .map_err(|e| StorageError::Upload {
                location: location.clone(),
                source: Box::new(e),
            })?;

        log::info!("Uploaded {} bytes to {location}", bytes.len());
        Ok(location)
    }

    fn describe(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

/// Guesses an image MIME type from the key's extension.
fn content_type_for(key: &str) -> &'static str {
    let ext = key.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        _ => "application/octet-stream",
    }
}

/// Reads a required environment variable.
fn require_env(name: &str) -> Result<String, StorageError> {
    std::env::var(name).map_err(|_| StorageError::MissingEnv {
        name: name.to_owned(),
    })
}
