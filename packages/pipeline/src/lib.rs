#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Product image pipeline.
//!
//! For each identifier the [`orchestrator::Pipeline`] asks every configured
//! source for candidates, ranks them, downloads them in rank order, and
//! stores the ones that pass the [`AcceptancePolicy`]. When nothing passes
//! the strict size check, the top few candidates get a second chance
//! against the relaxed floor.
//!
//! Batch runs process identifiers one at a time with a fixed pause between
//! them, so a single slow or failing identifier never stops the batch.
//!
//! [`AcceptancePolicy`]: sku_finder_pipeline_models::AcceptancePolicy

pub mod commands;
pub mod config;
pub mod csv_file;
pub mod download;
pub mod interactive;
pub mod key;
pub mod orchestrator;

use sku_finder_pipeline_models::ConfigError;
use sku_finder_source::SourceError;
use sku_finder_source_models::CandidateRecord;
use sku_finder_storage::StorageError;

/// Errors that can occur while running the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The identifier is not 8 to 20 ASCII digits.
    #[error("Invalid identifier '{identifier}': expected 8-20 digits")]
    InvalidIdentifier {
        /// The rejected identifier.
        identifier: String,
    },

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Image download answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// Image body exceeded the size limit.
    #[error("Image at {url} is larger than {limit} bytes")]
    TooLarge {
        /// Requested URL.
        url: String,
        /// Size limit in bytes.
        limit: usize,
    },

    /// Source setup failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Writing an accepted image failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Writing an accepted image failed after earlier images for the same
    /// identifier were already stored. `stored` lists those records; their
    /// artifacts remain in the store.
    #[error("{identifier}: storage failed after {} image(s) were stored: {source}", .stored.len())]
    PartialStore {
        /// Identifier being processed.
        identifier: String,
        /// Records whose artifacts were written before the failure.
        stored: Vec<CandidateRecord>,
        /// The storage failure.
        #[source]
        source: StorageError,
    },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The selected storage backend was not compiled in.
    #[error("Storage backend '{backend}' is not available in this build")]
    BackendUnavailable {
        /// Requested backend.
        backend: String,
    },

    /// CSV read or write failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
