//! Inline-script image URL extractor.
//!
//! JavaScript-heavy result pages often ship their image results as data
//! inside `<script>` tags rather than as `<img>` elements. This extractor
//! scans script bodies with a regular expression for image-looking URLs.

use regex::Regex;
use scraper::Html;

use crate::{
    ImageExtractor, ScrapeError, ScrapedImage, contains_ignore_case, parse_selector, push_unique,
};

/// Default pattern matching absolute URLs that end in a common image
/// extension.
pub const DEFAULT_IMAGE_URL_PATTERN: &str =
    r#"https?://[^\s"'\\<>]+\.(?:jpg|jpeg|png|gif|webp)"#;

/// Extractor that finds image URLs in inline `<script>` bodies.
#[derive(Debug, Clone)]
pub struct ScriptUrlExtractor {
    /// Compiled URL pattern.
    pattern: Regex,
    /// Only scripts containing this marker are scanned.
    script_marker: Option<String>,
    /// URLs containing any of these substrings are skipped.
    url_excludes: Vec<String>,
    /// URLs shorter than this are skipped (filters out icons and
    /// tracking pixels with short paths).
    min_url_len: usize,
    /// Maximum number of images to return.
    limit: usize,
}

impl ScriptUrlExtractor {
    /// Creates an extractor using [`DEFAULT_IMAGE_URL_PATTERN`].
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Pattern`] if the default pattern fails to
    /// compile (never expected).
    pub fn new() -> Result<Self, ScrapeError> {
        Self::with_pattern(DEFAULT_IMAGE_URL_PATTERN)
    }

    /// Creates an extractor with a custom URL pattern.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Pattern`] if `pattern` is not a valid regex.
    pub fn with_pattern(pattern: &str) -> Result<Self, ScrapeError> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            script_marker: None,
            url_excludes: Vec::new(),
            min_url_len: 20,
            limit: 10,
        })
    }

    /// Only scans scripts containing `marker`.
    #[must_use]
    pub fn with_script_marker(mut self, marker: Option<String>) -> Self {
        self.script_marker = marker;
        self
    }

    /// Skips URLs containing any of `needles` (case-insensitive).
    #[must_use]
    pub fn with_url_excludes(mut self, needles: &[String]) -> Self {
        needles.clone_into(&mut self.url_excludes);
        self
    }

    /// Sets the minimum URL length.
    #[must_use]
    pub const fn with_min_url_len(mut self, len: usize) -> Self {
        self.min_url_len = len;
        self
    }

    /// Sets the maximum number of images returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl ImageExtractor for ScriptUrlExtractor {
    fn extract(&self, html: &str, _page_url: &str) -> Result<Vec<ScrapedImage>, ScrapeError> {
        let document = Html::parse_document(html);
        let script_sel = parse_selector("script")?;
        let mut images = Vec::new();

        'scripts: for script in document.select(&script_sel) {
            let body: String = script.text().collect();
            if let Some(marker) = &self.script_marker
                && !body.contains(marker.as_str())
            {
                continue;
            }

            for found in self.pattern.find_iter(&body) {
                if images.len() >= self.limit {
                    break 'scripts;
                }
                let url = found.as_str();
                if url.len() < self.min_url_len
                    || self
                        .url_excludes
                        .iter()
                        .any(|needle| contains_ignore_case(url, needle))
                {
                    continue;
                }
                push_unique(
                    &mut images,
                    ScrapedImage {
                        url: url.to_owned(),
                        title: None,
                    },
                );
            }
        }

        log::debug!("script_urls: extracted {} image(s)", images.len());
        Ok(images)
    }

    fn strategy(&self) -> &'static str {
        "script_urls"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><head>
          <script>var config = {"theme": "dark", "logo": "https://duckduckgo.com/assets/logo_header.v109.png"};</script>
          <script>
            DDG.images = [
              {"image": "https://cdn.shop.example.com/products/cola-12oz-front.jpg"},
              {"image": "https://cdn.shop.example.com/products/cola-12oz-front.jpg"},
              {"image": "https://duckduckgo.com/i/abcdef123456.png"},
              {"image": "https://x.co/a.gif"},
              {"image": "https://images.example.org/large/cola_can.webp"}
            ];
          </script>
        </head></html>
    "#;

    #[test]
    fn extracts_urls_from_marked_scripts() {
        let images = ScriptUrlExtractor::new()
            .unwrap()
            .with_script_marker(Some("images".to_owned()))
            .with_url_excludes(&["duckduckgo".to_owned()])
            .extract(PAGE, "https://duckduckgo.com/")
            .unwrap();
        let urls: Vec<&str> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://cdn.shop.example.com/products/cola-12oz-front.jpg",
                "https://images.example.org/large/cola_can.webp",
            ]
        );
    }

    #[test]
    fn invalid_pattern_is_an_error() {
        assert!(matches!(
            ScriptUrlExtractor::with_pattern("(unclosed"),
            Err(ScrapeError::Pattern(_))
        ));
    }
}
