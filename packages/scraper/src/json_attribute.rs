//! JSON-in-attribute extractor.
//!
//! Some image search result pages store per-result metadata as a JSON
//! object inside an HTML attribute (for example `<a class="iusc" m="{...}">`).
//! This extractor parses that JSON and pulls the image URL and title from
//! configurable keys.

use scraper::Html;

use crate::{ImageExtractor, ScrapeError, ScrapedImage, parse_selector, push_unique, resolve_url};

/// Extractor that reads image metadata from a JSON-valued attribute.
#[derive(Debug, Clone)]
pub struct JsonAttributeExtractor {
    /// CSS selector for elements carrying the JSON attribute.
    selector: String,
    /// Name of the attribute holding the JSON object.
    attribute: String,
    /// Keys checked in order for the image URL (e.g. full-size first, then
    /// thumbnail).
    url_keys: Vec<String>,
    /// Key holding the result title, if any.
    title_key: Option<String>,
    /// Maximum number of images to return.
    limit: usize,
}

impl JsonAttributeExtractor {
    /// Creates a new extractor reading `attribute` on elements matching
    /// `selector`.
    #[must_use]
    pub fn new(selector: &str, attribute: &str) -> Self {
        Self {
            selector: selector.to_owned(),
            attribute: attribute.to_owned(),
            url_keys: vec!["murl".to_owned(), "turl".to_owned()],
            title_key: Some("t".to_owned()),
            limit: 10,
        }
    }

    /// Overrides the keys read (in order) for the image URL.
    #[must_use]
    pub fn with_url_keys(mut self, keys: &[String]) -> Self {
        keys.clone_into(&mut self.url_keys);
        self
    }

    /// Overrides the key read for the title.
    #[must_use]
    pub fn with_title_key(mut self, key: Option<String>) -> Self {
        self.title_key = key;
        self
    }

    /// Sets the maximum number of images returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

impl ImageExtractor for JsonAttributeExtractor {
    fn extract(&self, html: &str, page_url: &str) -> Result<Vec<ScrapedImage>, ScrapeError> {
        let document = Html::parse_document(html);
        let sel = parse_selector(&self.selector)?;
        let mut images = Vec::new();

        for element in document.select(&sel) {
            if images.len() >= self.limit {
                break;
            }

            let Some(raw) = element.value().attr(&self.attribute) else {
                continue;
            };

            // Malformed metadata on one result should not spoil the page.
            let Ok(meta) = serde_json::from_str::<serde_json::Value>(raw) else {
                log::debug!("json_attribute: skipping unparseable '{}' attribute", self.attribute);
                continue;
            };

            let Some(url) = self
                .url_keys
                .iter()
                .find_map(|key| meta.get(key).and_then(serde_json::Value::as_str))
            else {
                continue;
            };

            let Some(url) = resolve_url(page_url, url)? else {
                continue;
            };

            let title = self
                .title_key
                .as_ref()
                .and_then(|key| meta.get(key))
                .and_then(serde_json::Value::as_str)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned);

            push_unique(&mut images, ScrapedImage { url, title });
        }

        log::debug!("json_attribute: extracted {} image(s) from {page_url}", images.len());
        Ok(images)
    }

    fn strategy(&self) -> &'static str {
        "json_attribute"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="imgpt"><a class="iusc" m='{"murl":"https://cdn.example.com/full.jpg","turl":"https://tse.example.com/th.jpg","t":"Cola Can"}'></a></div>
        <div class="imgpt"><a class="iusc" m='{"turl":"https://tse.example.com/only-thumb.jpg"}'></a></div>
        <div class="imgpt"><a class="iusc" m='not json'></a></div>
        <div class="imgpt"><a class="iusc"></a></div>
    "#;

    #[test]
    fn extracts_full_size_then_thumbnail() {
        let images = JsonAttributeExtractor::new("div.imgpt a.iusc", "m")
            .extract(PAGE, "https://www.bing.com/images/search?q=1")
            .unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].url, "https://cdn.example.com/full.jpg");
        assert_eq!(images[0].title.as_deref(), Some("Cola Can"));
        assert_eq!(images[1].url, "https://tse.example.com/only-thumb.jpg");
        assert_eq!(images[1].title, None);
    }

    #[test]
    fn honors_limit() {
        let images = JsonAttributeExtractor::new("div.imgpt a.iusc", "m")
            .with_limit(1)
            .extract(PAGE, "https://www.bing.com/")
            .unwrap();
        assert_eq!(images.len(), 1);
    }
}
