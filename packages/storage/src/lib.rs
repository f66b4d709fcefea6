#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Artifact storage for accepted product images.
//!
//! The pipeline only needs "write these bytes under this key, overwriting
//! whatever was there". [`ArtifactStore`] captures that contract; backends
//! are a local directory ([`fs::FsStore`]), an in-memory map
//! ([`memory::MemoryStore`]), and Cloudflare R2 ([`r2::R2Store`], behind
//! the `r2` feature).
//!
//! Keys are relative, `/`-separated paths. They must not be empty, absolute,
//! or contain `..` segments.

pub mod fs;
pub mod memory;
#[cfg(feature = "r2")]
pub mod r2;

use async_trait::async_trait;

/// Errors that can occur while storing artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The key is empty, absolute, or escapes the store root.
    #[error("Invalid storage key '{key}'")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// I/O error writing local files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: String,
    },

    /// Remote upload failed.
    #[error("Failed to upload {location}: {source}")]
    Upload {
        /// Destination that failed.
        location: String,
        /// Underlying SDK error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// A destination for accepted image bytes.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `bytes` under `key`, replacing any existing artifact, and
    /// returns a human-readable location (path or URL) for the result.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the key is invalid or the write fails.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Describes the store for log messages (e.g. its root directory).
    fn describe(&self) -> String;
}

/// Checks that `key` is a relative path without `..` or empty segments.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] if the key is unusable.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.to_owned(),
        })
    }
}

/// Returns the lowercase hex MD5 digest of `bytes`.
#[must_use]
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}
