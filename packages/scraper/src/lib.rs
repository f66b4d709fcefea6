#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Generic image extraction from scraped web pages.
//!
//! Provides the [`ImageExtractor`] trait and concrete implementations for the
//! page shapes product image sources use: plain `<img>` tags
//! ([`html_images`]), JSON metadata stored in element attributes
//! ([`json_attribute`]), and image URLs embedded in inline scripts
//! ([`script_urls`]).
//!
//! This crate performs no I/O. Callers fetch the page body however they like
//! (with retries, rate limiting, etc.) and hand the HTML to an extractor.

pub mod html_images;
pub mod json_attribute;
pub mod script_urls;

use scraper::Selector;

/// Errors that can occur while extracting images from a page.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// A CSS selector could not be parsed.
    #[error("Invalid CSS selector '{selector}': {message}")]
    Selector {
        /// The offending selector.
        selector: String,
        /// Parser error description.
        message: String,
    },

    /// A regular expression could not be compiled.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// The page URL used to resolve relative links is not a valid URL.
    #[error("Invalid page URL '{0}'")]
    PageUrl(String),
}

/// A single image reference found on a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapedImage {
    /// Absolute image URL.
    pub url: String,
    /// Accompanying label (usually the `alt` text), if any.
    pub title: Option<String>,
}

/// Trait for pulling image references out of a fetched HTML document.
///
/// Implementations handle one extraction strategy and return images in
/// document order, de-duplicated by URL.
pub trait ImageExtractor: Send + Sync {
    /// Extracts images from `html`. Relative URLs are resolved against
    /// `page_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError`] if the extractor is misconfigured (bad
    /// selector or pattern) or `page_url` is not a valid URL.
    fn extract(&self, html: &str, page_url: &str) -> Result<Vec<ScrapedImage>, ScrapeError>;

    /// Returns the name of the extraction strategy (e.g. `"html_images"`).
    fn strategy(&self) -> &str;
}

/// Parses a CSS selector string, returning a [`ScrapeError`] on failure.
///
/// # Errors
///
/// Returns [`ScrapeError::Selector`] if `selector` is not valid CSS.
pub fn parse_selector(selector: &str) -> Result<Selector, ScrapeError> {
    Selector::parse(selector).map_err(|e| ScrapeError::Selector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}

/// Resolves `candidate` against `page_url`, returning an absolute `http(s)`
/// URL or `None` for unusable references (`data:` URIs, fragments, blank
/// strings, unsupported schemes).
///
/// # Errors
///
/// Returns [`ScrapeError::PageUrl`] if `page_url` cannot be parsed.
pub fn resolve_url(page_url: &str, candidate: &str) -> Result<Option<String>, ScrapeError> {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.starts_with('#') || candidate.starts_with("data:") {
        return Ok(None);
    }

    let base =
        reqwest::Url::parse(page_url).map_err(|_| ScrapeError::PageUrl(page_url.to_owned()))?;

    let Ok(joined) = base.join(candidate) else {
        return Ok(None);
    };

    match joined.scheme() {
        "http" | "https" => Ok(Some(joined.to_string())),
        _ => Ok(None),
    }
}

/// Returns `true` if `haystack` contains `needle`, ignoring ASCII case.
#[must_use]
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// Appends `image` to `out` unless an image with the same URL is already
/// present.
pub(crate) fn push_unique(out: &mut Vec<ScrapedImage>, image: ScrapedImage) {
    if !out.iter().any(|existing| existing.url == image.url) {
        out.push(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_urls() {
        let url = resolve_url("https://shop.example.com/search?q=1", "/img/product/1.jpg")
            .unwrap()
            .unwrap();
        assert_eq!(url, "https://shop.example.com/img/product/1.jpg");
    }

    #[test]
    fn resolves_protocol_relative_urls() {
        let url = resolve_url("https://shop.example.com/", "//cdn.example.com/a.png")
            .unwrap()
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/a.png");
    }

    #[test]
    fn skips_data_uris_and_blank() {
        assert_eq!(
            resolve_url("https://x.com/", "data:image/gif;base64,R0lGOD").unwrap(),
            None
        );
        assert_eq!(resolve_url("https://x.com/", "  ").unwrap(), None);
        assert_eq!(resolve_url("https://x.com/", "javascript:void(0)").unwrap(), None);
    }

    #[test]
    fn rejects_invalid_page_url() {
        assert!(matches!(
            resolve_url("not a url", "/a.jpg"),
            Err(ScrapeError::PageUrl(_))
        ));
    }

    #[test]
    fn invalid_selector_is_an_error() {
        assert!(matches!(
            parse_selector("div[[["),
            Err(ScrapeError::Selector { .. })
        ));
    }
}
