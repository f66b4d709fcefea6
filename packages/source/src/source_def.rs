//! Config-driven product image source definition.
//!
//! [`SourceDefinition`] captures everything unique about a source in a
//! serializable config struct. A single generic [`ConfiguredSource`]
//! implements [`SourceAdapter`] for all of them by dispatching on the
//! [`AdapterConfig`] variant.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sku_finder_scraper::ImageExtractor;
use sku_finder_scraper::html_images::HtmlImageExtractor;
use sku_finder_scraper::json_attribute::JsonAttributeExtractor;
use sku_finder_scraper::script_urls::ScriptUrlExtractor;
use sku_finder_source_models::{CandidateRecord, SourceKind};

use crate::backoff::BackoffExecutor;
use crate::context::SearchContext;
use crate::page_scrape::PageRequest;
use crate::{
    SourceAdapter, SourceError, USER_AGENT, distiller, ebay, go_upc, open_food_facts,
    page_scrape, upcitemdb, wine_searcher,
};

/// Shortest per-request timeout a definition may configure.
const MIN_TIMEOUT_SECS: u64 = 10;

/// Longest per-request timeout a definition may configure.
const MAX_TIMEOUT_SECS: u64 = 30;

// ── Top-level source definition ──────────────────────────────────────────

/// A complete, config-driven product image source definition.
///
/// Loaded from TOML files at compile time (see [`crate::registry`]).
#[derive(Debug, Clone, Deserialize)]
pub struct SourceDefinition {
    /// Unique identifier (e.g., `"open_food_facts"`).
    pub id: String,
    /// Human-readable name (e.g., `"Open Food Facts"`). Written into every
    /// record as its source tag and used as the priority table key.
    pub name: String,
    /// Broad category of the source.
    pub kind: SourceKind,
    /// Whether the source is queried by default.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ranking priority (higher wins).
    #[serde(default)]
    pub priority: i32,
    /// Confidence assigned to every record from this source.
    pub confidence: f64,
    /// Per-request timeout in seconds (clamped to 10..=30).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// How to query the source.
    pub adapter: AdapterConfig,
}

const fn default_enabled() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    15
}

// ── Adapter config ───────────────────────────────────────────────────────

/// How to query a source.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdapterConfig {
    /// Go-UPC product code API (bearer token).
    GoUpc {
        /// URL template with a `{sku}` placeholder.
        api_url: String,
        /// Environment variable holding the API key.
        api_key_env: String,
    },
    /// Open Food Facts product API.
    OpenFoodFacts {
        /// URL template with a `{sku}` placeholder.
        api_url: String,
    },
    /// UPCitemdb lookup API.
    Upcitemdb {
        /// URL template with a `{sku}` placeholder.
        api_url: String,
        /// Optional environment variable holding an API key.
        #[serde(default)]
        api_key_env: Option<String>,
    },
    /// eBay Browse API item search (bearer token).
    Ebay {
        /// Item summary search URL.
        api_url: String,
        /// Environment variable holding the application token.
        api_key_env: String,
        /// Optional `X-EBAY-C-ENDUSERCTX` header value.
        #[serde(default)]
        end_user_context: Option<String>,
    },
    /// Wine-Searcher lookup API.
    WineSearcher {
        /// Lookup URL.
        api_url: String,
        /// Optional environment variable holding an API key.
        #[serde(default)]
        api_key_env: Option<String>,
        /// Query templates tried in order (`{sku}` placeholder).
        query_terms: Vec<String>,
    },
    /// Distiller spirits search API.
    Distiller {
        /// Search URL.
        api_url: String,
    },
    /// `<img>` tags on a search results page.
    HtmlImages {
        /// How to build the page request.
        request: PageRequest,
        /// CSS selector for result containers.
        #[serde(default)]
        container_selector: Option<String>,
        /// CSS selector for image elements (default `img`).
        #[serde(default)]
        image_selector: Option<String>,
        /// Attributes read for the image URL (default `src`, `data-src`).
        #[serde(default)]
        url_attributes: Vec<String>,
        /// URL must contain one of these (case-insensitive).
        #[serde(default)]
        url_contains: Vec<String>,
        /// URL must contain none of these (case-insensitive).
        #[serde(default)]
        url_excludes: Vec<String>,
        /// Only accept URLs written as absolute in the page.
        #[serde(default)]
        require_absolute: bool,
        /// Replacement query string requesting a larger rendition.
        #[serde(default)]
        query_rewrite: Option<String>,
    },
    /// JSON metadata stored in an element attribute.
    JsonAttribute {
        /// How to build the page request.
        request: PageRequest,
        /// CSS selector for elements carrying the attribute.
        selector: String,
        /// Attribute holding the JSON object.
        attribute: String,
        /// Keys read (in order) for the image URL.
        #[serde(default)]
        url_keys: Vec<String>,
        /// Key read for the title.
        #[serde(default)]
        title_key: Option<String>,
    },
    /// Image URLs embedded in inline scripts.
    ScriptUrls {
        /// How to build the page request.
        request: PageRequest,
        /// Only scripts containing this marker are scanned.
        #[serde(default)]
        script_marker: Option<String>,
        /// URLs containing any of these are skipped.
        #[serde(default)]
        url_excludes: Vec<String>,
        /// URLs shorter than this are skipped.
        #[serde(default)]
        min_url_len: Option<usize>,
    },
}

impl AdapterConfig {
    /// Short name of the adapter type, for listings.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::GoUpc { .. } => "go_upc",
            Self::OpenFoodFacts { .. } => "open_food_facts",
            Self::Upcitemdb { .. } => "upcitemdb",
            Self::Ebay { .. } => "ebay",
            Self::WineSearcher { .. } => "wine_searcher",
            Self::Distiller { .. } => "distiller",
            Self::HtmlImages { .. } => "html_images",
            Self::JsonAttribute { .. } => "json_attribute",
            Self::ScriptUrls { .. } => "script_urls",
        }
    }

    /// Environment variable holding this adapter's credential, if any.
    #[must_use]
    pub fn credential_env(&self) -> Option<&str> {
        match self {
            Self::GoUpc { api_key_env, .. } | Self::Ebay { api_key_env, .. } => {
                Some(api_key_env.as_str())
            }
            Self::Upcitemdb { api_key_env, .. } | Self::WineSearcher { api_key_env, .. } => {
                api_key_env.as_deref()
            }
            _ => None,
        }
    }

    /// Builds the page extractor for scraped variants.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Scrape`] if a configured pattern is invalid.
    fn build_extractor(&self, limit: usize) -> Result<Option<Box<dyn ImageExtractor>>, SourceError> {
        let extractor: Box<dyn ImageExtractor> = match self {
            Self::HtmlImages {
                container_selector,
                image_selector,
                url_attributes,
                url_contains,
                url_excludes,
                require_absolute,
                query_rewrite,
                ..
            } => {
                let mut extractor = HtmlImageExtractor::new()
                    .with_url_contains(url_contains)
                    .with_url_excludes(url_excludes)
                    .with_require_absolute(*require_absolute)
                    .with_query_rewrite(query_rewrite.clone())
                    .with_limit(limit);
                if let Some(selector) = container_selector {
                    extractor = extractor.with_container_selector(selector);
                }
                if let Some(selector) = image_selector {
                    extractor = extractor.with_image_selector(selector);
                }
                if !url_attributes.is_empty() {
                    extractor = extractor.with_url_attributes(url_attributes);
                }
                Box::new(extractor)
            }
            Self::JsonAttribute {
                selector,
                attribute,
                url_keys,
                title_key,
                ..
            } => {
                let mut extractor = JsonAttributeExtractor::new(selector, attribute)
                    .with_limit(limit);
                if !url_keys.is_empty() {
                    extractor = extractor.with_url_keys(url_keys);
                }
                if title_key.is_some() {
                    extractor = extractor.with_title_key(title_key.clone());
                }
                Box::new(extractor)
            }
            Self::ScriptUrls {
                script_marker,
                url_excludes,
                min_url_len,
                ..
            } => {
                let mut extractor = ScriptUrlExtractor::new()?
                    .with_script_marker(script_marker.clone())
                    .with_url_excludes(url_excludes)
                    .with_limit(limit);
                if let Some(len) = min_url_len {
                    extractor = extractor.with_min_url_len(*len);
                }
                Box::new(extractor)
            }
            _ => return Ok(None),
        };
        Ok(Some(extractor))
    }
}

impl SourceDefinition {
    /// Returns the unique source identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the human-readable source name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the per-request timeout, clamped to the supported range.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.clamp(MIN_TIMEOUT_SECS, MAX_TIMEOUT_SECS))
    }

    /// Whether the configured confidence lies in the range expected for
    /// this source's kind.
    #[must_use]
    pub fn confidence_in_range(&self) -> bool {
        let (low, high) = self.kind.confidence_range();
        (low..=high).contains(&self.confidence)
    }
}

/// Parses a [`SourceDefinition`] from a TOML string.
///
/// # Errors
///
/// Returns an error if the TOML is malformed or missing required fields.
pub fn parse_source_toml(toml_str: &str) -> Result<SourceDefinition, String> {
    toml::de::from_str(toml_str).map_err(|e| e.to_string())
}

// ── Generic adapter ──────────────────────────────────────────────────────

/// A [`SourceAdapter`] driven entirely by a [`SourceDefinition`].
pub struct ConfiguredSource {
    definition: SourceDefinition,
    client: reqwest::Client,
    backoff: BackoffExecutor,
    max_candidates: usize,
    extractor: Option<Box<dyn ImageExtractor>>,
}

impl std::fmt::Debug for ConfiguredSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfiguredSource")
            .field("id", &self.definition.id)
            .field("max_candidates", &self.max_candidates)
            .finish_non_exhaustive()
    }
}

impl ConfiguredSource {
    /// Builds an adapter for `definition`, returning at most
    /// `max_candidates` records per lookup.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the HTTP client cannot be built or the
    /// definition's extractor is misconfigured.
    pub fn new(
        definition: SourceDefinition,
        backoff: BackoffExecutor,
        max_candidates: usize,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(definition.timeout())
            .build()?;
        let extractor = definition.adapter.build_extractor(max_candidates)?;

        Ok(Self {
            definition,
            client,
            backoff,
            max_candidates,
            extractor,
        })
    }

    /// Returns the underlying definition.
    #[must_use]
    pub const fn definition(&self) -> &SourceDefinition {
        &self.definition
    }

    fn context(&self) -> SearchContext<'_> {
        SearchContext {
            client: &self.client,
            backoff: &self.backoff,
            source_id: &self.definition.id,
            source_name: &self.definition.name,
            confidence: self.definition.confidence,
            limit: self.max_candidates,
        }
    }

    async fn search_page(
        &self,
        ctx: &SearchContext<'_>,
        identifier: &str,
        request: &PageRequest,
    ) -> Result<Vec<CandidateRecord>, SourceError> {
        let Some(extractor) = self.extractor.as_deref() else {
            return Err(SourceError::Parse {
                message: format!("{}: no page extractor configured", self.definition.id),
            });
        };
        page_scrape::search(ctx, identifier, request, extractor).await
    }
}

#[async_trait]
impl SourceAdapter for ConfiguredSource {
    fn id(&self) -> &str {
        &self.definition.id
    }

    fn name(&self) -> &str {
        &self.definition.name
    }

    async fn search(&self, identifier: &str) -> Result<Vec<CandidateRecord>, SourceError> {
        let ctx = self.context();
        let mut records = match &self.definition.adapter {
            AdapterConfig::GoUpc {
                api_url,
                api_key_env,
            } => go_upc::search(&ctx, identifier, api_url, api_key_env).await?,
            AdapterConfig::OpenFoodFacts { api_url } => {
                open_food_facts::search(&ctx, identifier, api_url).await?
            }
            AdapterConfig::Upcitemdb {
                api_url,
                api_key_env,
            } => upcitemdb::search(&ctx, identifier, api_url, api_key_env.as_deref()).await?,
            AdapterConfig::Ebay {
                api_url,
                api_key_env,
                end_user_context,
            } => {
                ebay::search(
                    &ctx,
                    identifier,
                    api_url,
                    api_key_env,
                    end_user_context.as_deref(),
                )
                .await?
            }
            AdapterConfig::WineSearcher {
                api_url,
                api_key_env,
                query_terms,
            } => {
                wine_searcher::search(
                    &ctx,
                    identifier,
                    api_url,
                    api_key_env.as_deref(),
                    query_terms,
                )
                .await?
            }
            AdapterConfig::Distiller { api_url } => {
                distiller::search(&ctx, identifier, api_url).await?
            }
            AdapterConfig::HtmlImages { request, .. }
            | AdapterConfig::JsonAttribute { request, .. }
            | AdapterConfig::ScriptUrls { request, .. } => {
                self.search_page(&ctx, identifier, request).await?
            }
        };

        records.truncate(self.max_candidates);
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WALMART: &str = r#"
        id = "walmart"
        name = "Walmart"
        kind = "STOREFRONT"
        priority = 8
        confidence = 0.8

        [adapter]
        type = "html_images"
        container_selector = 'div[data-testid*="item-stack"]'
        url_contains = ["i5.walmartimages.com"]
        query_rewrite = "odnHeight=768&odnWidth=768"

        [adapter.request]
        search_url = "https://www.walmart.com/search?q={query}"
    "#;

    #[test]
    fn parses_scraped_definition() {
        let def = parse_source_toml(WALMART).unwrap();
        assert!(def.enabled);
        assert_eq!(def.priority, 8);
        assert_eq!(def.timeout(), Duration::from_secs(15));
        assert_eq!(def.adapter.type_name(), "html_images");
        assert!(def.confidence_in_range());
        let AdapterConfig::HtmlImages { request, .. } = &def.adapter else {
            panic!("wrong adapter type");
        };
        assert_eq!(request.query, "{sku}");
    }

    #[test]
    fn parses_api_definition_and_clamps_timeout() {
        let def = parse_source_toml(
            r#"
            id = "go_upc"
            name = "Go-UPC"
            kind = "OFFICIAL_API"
            confidence = 1.0
            timeout_secs = 300

            [adapter]
            type = "go_upc"
            api_url = "https://go-upc.com/api/v1/code/{sku}"
            api_key_env = "GO_UPC_API_KEY"
            "#,
        )
        .unwrap();
        assert_eq!(def.priority, 0);
        assert_eq!(def.timeout(), Duration::from_secs(30));
        assert_eq!(def.adapter.credential_env(), Some("GO_UPC_API_KEY"));
    }

    #[test]
    fn rejects_unknown_adapter_type() {
        let err = parse_source_toml(
            r#"
            id = "x"
            name = "X"
            kind = "STOREFRONT"
            confidence = 0.7
            [adapter]
            type = "carrier_pigeon"
            "#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn builds_extractor_only_for_scraped_sources() {
        let def = parse_source_toml(WALMART).unwrap();
        let source = ConfiguredSource::new(def, BackoffExecutor::default(), 5).unwrap();
        assert!(source.extractor.is_some());
        assert_eq!(source.name(), "Walmart");
    }

    #[tokio::test]
    async fn missing_credential_fails_before_any_request() {
        let def = parse_source_toml(
            r#"
            id = "go_upc"
            name = "Go-UPC"
            kind = "OFFICIAL_API"
            confidence = 1.0
            [adapter]
            type = "go_upc"
            api_url = "https://go-upc.invalid/api/v1/code/{sku}"
            api_key_env = "SKU_FINDER_TEST_UNSET_GO_UPC_KEY"
            "#,
        )
        .unwrap();
        let source = ConfiguredSource::new(def, BackoffExecutor::default(), 5).unwrap();
        let result = source.search("012000161155").await;
        assert!(matches!(result, Err(SourceError::MissingCredential { .. })));
    }
}
