//! Per-call state shared by every adapter implementation.

use serde_json::Value;
use sku_finder_source_models::{CandidateRecord, default_title};

use crate::SourceError;
use crate::backoff::BackoffExecutor;
use crate::http;

/// Builds [`CandidateRecord`]s stamped with one source's tag and
/// confidence.
#[derive(Debug, Clone, Copy)]
pub struct CandidateFactory<'a> {
    /// The identifier being looked up.
    pub identifier: &'a str,
    /// Source tag written into each record.
    pub source: &'a str,
    /// Confidence assigned to each record.
    pub confidence: f64,
}

impl CandidateFactory<'_> {
    /// Creates a record for `image_url`, or `None` if the URL is blank.
    ///
    /// Falls back to the default `"Product {identifier}"` title when
    /// `title` is `None`.
    #[must_use]
    pub fn record(&self, image_url: &str, title: Option<String>) -> Option<CandidateRecord> {
        let image_url = image_url.trim();
        if image_url.is_empty() {
            return None;
        }
        let title = title.unwrap_or_else(|| default_title(self.identifier));
        Some(CandidateRecord::new(
            self.identifier,
            self.source,
            image_url,
            &title,
            self.confidence,
        ))
    }
}

/// Everything an adapter needs to perform one lookup.
#[derive(Debug, Clone, Copy)]
pub struct SearchContext<'a> {
    /// HTTP client carrying the source's timeout and `User-Agent`.
    pub client: &'a reqwest::Client,
    /// Backoff applied to each individual request.
    pub backoff: &'a BackoffExecutor,
    /// Source id, used in credential errors.
    pub source_id: &'a str,
    /// Source display name, written into each record.
    pub source_name: &'a str,
    /// Confidence assigned to each record.
    pub confidence: f64,
    /// Maximum number of candidates to return.
    pub limit: usize,
}

impl<'a> SearchContext<'a> {
    /// Returns a record factory for `identifier`.
    #[must_use]
    pub const fn factory(&self, identifier: &'a str) -> CandidateFactory<'a> {
        CandidateFactory {
            identifier,
            source: self.source_name,
            confidence: self.confidence,
        }
    }

    /// Sends the request built by `build` (rebuilt on each retry) and
    /// parses the body as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails after backoff or the
    /// body is not JSON.
    pub async fn get_json<F>(&self, build: F) -> Result<Value, SourceError>
    where
        F: Fn() -> reqwest::RequestBuilder + Sync,
    {
        self.backoff.execute(|| http::send_json(build())).await
    }

    /// Sends the request built by `build` (rebuilt on each retry) and
    /// returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the request fails after backoff.
    pub async fn get_text<F>(&self, build: F) -> Result<String, SourceError>
    where
        F: Fn() -> reqwest::RequestBuilder + Sync,
    {
        self.backoff.execute(|| http::send_text(build())).await
    }

    /// Reads a required credential from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::MissingCredential`] if `variable` is unset or
    /// blank.
    pub fn credential(&self, variable: &str) -> Result<String, SourceError> {
        optional_credential(Some(variable)).ok_or_else(|| SourceError::MissingCredential {
            source_id: self.source_id.to_owned(),
            variable: variable.to_owned(),
        })
    }
}

/// Reads an optional credential from the environment. Blank values count
/// as unset.
#[must_use]
pub fn optional_credential(variable: Option<&str>) -> Option<String> {
    std::env::var(variable?)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}
