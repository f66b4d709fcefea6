//! Scraped search-result pages (storefronts and image search engines).
//!
//! Fetches one HTML page per lookup and hands it to a
//! [`sku_finder_scraper::ImageExtractor`] chosen by the source definition.

use serde::Deserialize;
use sku_finder_scraper::{ImageExtractor, ScrapedImage};
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext};
use crate::parsing::{fill_query, fill_url};
use crate::product_name::{NameLookupConfig, lookup_product_name};

/// How to build the search page request.
#[derive(Debug, Clone, Deserialize)]
pub struct PageRequest {
    /// Search page URL template (`{sku}` and `{query}` placeholders).
    pub search_url: String,
    /// Free-text query template used to fill `{query}`.
    #[serde(default = "default_query")]
    pub query: String,
    /// Query template used instead of `query` when a product name was
    /// found (`{name}` placeholder).
    #[serde(default)]
    pub named_query: Option<String>,
    /// Optional product-name lookup run before the search.
    #[serde(default)]
    pub name_lookup: Option<NameLookupConfig>,
    /// Static description attached to every record (e.g. marketplace name).
    #[serde(default)]
    pub description: Option<String>,
}

fn default_query() -> String {
    "{sku}".to_owned()
}

/// Fetches the search page for `identifier` and extracts candidates.
///
/// # Errors
///
/// Returns [`SourceError`] if the page cannot be fetched or the extractor
/// is misconfigured.
pub async fn search(
    ctx: &SearchContext<'_>,
    identifier: &str,
    request: &PageRequest,
    extractor: &dyn ImageExtractor,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let name = match &request.name_lookup {
        Some(config) => lookup_product_name(ctx, identifier, config).await,
        None => None,
    };

    let query = match (&request.named_query, &name) {
        (Some(template), Some(name)) => fill_query(template, identifier, Some(name.as_str())),
        _ => fill_query(&request.query, identifier, None),
    };
    let url = fill_url(&request.search_url, identifier, &query);
    log::debug!("{}: fetching {url} ({})", ctx.source_name, extractor.strategy());

    let html = ctx.get_text(|| ctx.client.get(&url)).await?;
    let images = extractor.extract(&html, &url)?;

    Ok(to_records(
        &ctx.factory(identifier),
        images,
        name.as_deref(),
        request.description.as_deref(),
        ctx.limit,
    ))
}

/// Converts scraped images into records. The image's own label wins over
/// `fallback_title`, which wins over the default title.
#[must_use]
pub fn to_records(
    factory: &CandidateFactory<'_>,
    images: Vec<ScrapedImage>,
    fallback_title: Option<&str>,
    description: Option<&str>,
    limit: usize,
) -> Vec<CandidateRecord> {
    images
        .into_iter()
        .filter_map(|image| {
            let title = image.title.or_else(|| fallback_title.map(str::to_owned));
            factory
                .record(&image.url, title)
                .map(|rec| rec.with_description(description.map(str::to_owned)))
        })
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_fall_back_in_order() {
        let factory = CandidateFactory {
            identifier: "012000161155",
            source: "DuckDuckGo Images",
            confidence: 0.6,
        };
        let images = vec![
            ScrapedImage {
                url: "https://a.com/1.jpg".to_owned(),
                title: Some("Alt text".to_owned()),
            },
            ScrapedImage {
                url: "https://a.com/2.jpg".to_owned(),
                title: None,
            },
        ];

        let records = to_records(&factory, images.clone(), Some("Pepsi Cola"), None, 5);
        assert_eq!(records[0].title, "Alt text");
        assert_eq!(records[1].title, "Pepsi Cola");

        let records = to_records(&factory, images, None, Some("Amazon Marketplace"), 1);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].description.as_deref(), Some("Amazon Marketplace"));
    }

    #[test]
    fn request_defaults_query_to_identifier() {
        let request: PageRequest =
            toml::from_str(r#"search_url = "https://www.bevmo.com/search?q={query}""#).unwrap();
        assert_eq!(request.query, "{sku}");
        assert!(request.name_lookup.is_none());
    }
}
