#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Product image source adapters and candidate ranking.
//!
//! Each external provider implements the [`SourceAdapter`] trait to turn a
//! product identifier into zero or more [`CandidateRecord`]s. Adapters are
//! configured from embedded TOML definitions (see [`registry`]) and invoked
//! together by the [`aggregator::Aggregator`], which ranks their output by
//! source priority and confidence.
//!
//! Every network call made by an adapter goes through the
//! [`backoff::BackoffExecutor`] so that HTTP 429 responses are retried with
//! exponential delay instead of failing the lookup.

pub mod aggregator;
pub mod backoff;
pub mod context;
pub mod distiller;
pub mod ebay;
pub mod go_upc;
pub mod http;
pub mod open_food_facts;
pub mod page_scrape;
pub mod parsing;
pub mod priority;
pub mod product_name;
pub mod progress;
pub mod registry;
pub mod source_def;
pub mod upcitemdb;
pub mod wine_searcher;

use async_trait::async_trait;
use sku_finder_scraper::ScrapeError;
use sku_finder_source_models::{CandidateRecord, is_valid_identifier};

/// Browser-like `User-Agent` sent with every outbound request. Several
/// storefronts refuse requests from unknown clients.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                              (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Errors that can occur during source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// HTTP request failed (connection, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status {
        /// Numeric HTTP status code.
        status: u16,
        /// Requested URL.
        url: String,
    },

    /// The server answered HTTP 429. Retried by the backoff executor.
    #[error("Rate limited by {url}")]
    RateLimited {
        /// Requested URL.
        url: String,
    },

    /// Still rate limited after every retry was spent.
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded {
        /// Total number of calls made.
        attempts: u32,
    },

    /// A credential the source needs is not configured.
    #[error("{source_id}: missing credential (set {variable})")]
    MissingCredential {
        /// Id of the source requiring the credential.
        source_id: String,
        /// Environment variable expected to hold it.
        variable: String,
    },

    /// The response was well-formed but not in the expected shape, or a
    /// definition could not be parsed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Page extraction failed.
    #[error(transparent)]
    Scrape(#[from] ScrapeError),
}

impl SourceError {
    /// Whether this error signals that the caller should back off and retry.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Trait that all product image sources must implement.
///
/// Implementations may return errors freely; callers go through
/// [`search_soft`], which turns every failure into an empty result.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Returns a unique identifier for this source (e.g., `"open_food_facts"`).
    fn id(&self) -> &str;

    /// Returns the human-readable name of this source. This is the tag
    /// written into [`CandidateRecord::source`].
    fn name(&self) -> &str;

    /// Looks up `identifier` and returns normalized candidates.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the lookup fails for any reason.
    async fn search(&self, identifier: &str) -> Result<Vec<CandidateRecord>, SourceError>;
}

/// Runs `adapter` for `identifier`, converting every failure into an empty
/// result with a log line.
///
/// Malformed identifiers are rejected here without touching the network.
/// Candidates with a blank image URL are dropped.
pub async fn search_soft(adapter: &dyn SourceAdapter, identifier: &str) -> Vec<CandidateRecord> {
    if !is_valid_identifier(identifier) {
        log::warn!(
            "{}: skipping malformed identifier '{identifier}'",
            adapter.name()
        );
        return Vec::new();
    }

    match adapter.search(identifier.trim()).await {
        Ok(records) => {
            let records: Vec<CandidateRecord> = records
                .into_iter()
                .filter(|r| !r.image_url.trim().is_empty())
                .collect();
            log::info!(
                "{}: found {} candidate(s) for {identifier}",
                adapter.name(),
                records.len()
            );
            records
        }
        Err(e @ SourceError::MissingCredential { .. }) => {
            log::info!("{}: skipped ({e})", adapter.name());
            Vec::new()
        }
        Err(e) => {
            log::warn!("{}: search failed for {identifier}: {e}", adapter.name());
            Vec::new()
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use sku_finder_source_models::CandidateRecord;

    use crate::{SourceAdapter, SourceError};

    /// Adapter returning a fixed outcome.
    pub struct FixedAdapter {
        pub name: String,
        pub outcome: Result<Vec<(String, f64)>, String>,
        pub panics: bool,
    }

    impl FixedAdapter {
        pub fn ok(name: &str, urls: &[(&str, f64)]) -> Self {
            Self {
                name: name.to_owned(),
                outcome: Ok(urls.iter().map(|(u, c)| ((*u).to_owned(), *c)).collect()),
                panics: false,
            }
        }

        pub fn failing(name: &str) -> Self {
            Self {
                name: name.to_owned(),
                outcome: Err("upstream exploded".to_owned()),
                panics: false,
            }
        }

        pub fn panicking(name: &str) -> Self {
            Self {
                name: name.to_owned(),
                outcome: Ok(Vec::new()),
                panics: true,
            }
        }
    }

    #[async_trait]
    impl SourceAdapter for FixedAdapter {
        fn id(&self) -> &str {
            &self.name
        }

        fn name(&self) -> &str {
            &self.name
        }

        async fn search(&self, identifier: &str) -> Result<Vec<CandidateRecord>, SourceError> {
            assert!(!self.panics, "adapter defect");
            match &self.outcome {
                Ok(urls) => Ok(urls
                    .iter()
                    .map(|(url, conf)| {
                        CandidateRecord::new(identifier, &self.name, url, "Thing", *conf)
                    })
                    .collect()),
                Err(message) => Err(SourceError::Parse {
                    message: message.clone(),
                }),
            }
        }
    }
}
