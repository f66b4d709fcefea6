//! `<img>` tag extractor.
//!
//! Parses an HTML page, optionally narrows it to container elements via a
//! CSS selector, and collects the image URL from the first populated
//! attribute (`src`, then `data-src`, ...) of each matching image element.

use scraper::Html;

use crate::{
    ImageExtractor, ScrapeError, ScrapedImage, contains_ignore_case, parse_selector,
    push_unique, resolve_url,
};

/// Extractor that collects images from `<img>`-like elements.
///
/// The defaults select every `<img>` on the page and read `src` then
/// `data-src`. Use the builder methods to target storefront-specific markup.
#[derive(Debug, Clone)]
pub struct HtmlImageExtractor {
    /// Optional CSS selector for container elements; images are only
    /// collected from inside matching containers.
    container_selector: Option<String>,
    /// CSS selector for image elements.
    image_selector: String,
    /// Attributes checked in order for the image URL.
    url_attributes: Vec<String>,
    /// The URL must contain at least one of these substrings
    /// (case-insensitive). Empty means no filter.
    url_contains: Vec<String>,
    /// The URL must contain none of these substrings (case-insensitive).
    url_excludes: Vec<String>,
    /// Only accept URLs that were absolute in the page source.
    require_absolute: bool,
    /// Replacement query string applied to URLs that already carry one
    /// (used to request larger renditions from image CDNs).
    query_rewrite: Option<String>,
    /// Maximum number of images to return.
    limit: usize,
}

impl Default for HtmlImageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl HtmlImageExtractor {
    /// Creates a new extractor selecting every `<img>` element.
    #[must_use]
    pub fn new() -> Self {
        Self {
            container_selector: None,
            image_selector: "img".to_owned(),
            url_attributes: vec!["src".to_owned(), "data-src".to_owned()],
            url_contains: Vec::new(),
            url_excludes: Vec::new(),
            require_absolute: false,
            query_rewrite: None,
            limit: 10,
        }
    }

    /// Restricts extraction to images inside elements matching `selector`.
    #[must_use]
    pub fn with_container_selector(mut self, selector: &str) -> Self {
        self.container_selector = Some(selector.to_owned());
        self
    }

    /// Overrides the CSS selector used to locate image elements.
    #[must_use]
    pub fn with_image_selector(mut self, selector: &str) -> Self {
        selector.clone_into(&mut self.image_selector);
        self
    }

    /// Overrides the attributes read (in order) for the image URL.
    #[must_use]
    pub fn with_url_attributes(mut self, attributes: &[String]) -> Self {
        attributes.clone_into(&mut self.url_attributes);
        self
    }

    /// Requires URLs to contain at least one of `needles`.
    #[must_use]
    pub fn with_url_contains(mut self, needles: &[String]) -> Self {
        needles.clone_into(&mut self.url_contains);
        self
    }

    /// Rejects URLs containing any of `needles`.
    #[must_use]
    pub fn with_url_excludes(mut self, needles: &[String]) -> Self {
        needles.clone_into(&mut self.url_excludes);
        self
    }

    /// Only accepts URLs written as absolute `http(s)` URLs in the page.
    #[must_use]
    pub const fn with_require_absolute(mut self, require: bool) -> Self {
        self.require_absolute = require;
        self
    }

    /// Replaces the query string of matching URLs with `query`.
    #[must_use]
    pub fn with_query_rewrite(mut self, query: Option<String>) -> Self {
        self.query_rewrite = query;
        self
    }

    /// Sets the maximum number of images returned.
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn url_passes_filters(&self, url: &str) -> bool {
        let included = self.url_contains.is_empty()
            || self
                .url_contains
                .iter()
                .any(|needle| contains_ignore_case(url, needle));
        let excluded = self
            .url_excludes
            .iter()
            .any(|needle| contains_ignore_case(url, needle));
        included && !excluded
    }

    fn rewrite(&self, url: String) -> String {
        match (&self.query_rewrite, url.split_once('?')) {
            (Some(query), Some((base, _))) => format!("{base}?{query}"),
            _ => url,
        }
    }

    fn collect_from<'a>(
        &self,
        elements: impl Iterator<Item = scraper::ElementRef<'a>>,
        page_url: &str,
        out: &mut Vec<ScrapedImage>,
    ) -> Result<(), ScrapeError> {
        for element in elements {
            if out.len() >= self.limit {
                break;
            }

            let Some(raw) = self
                .url_attributes
                .iter()
                .find_map(|attr| element.value().attr(attr))
                .map(str::trim)
                .filter(|v| !v.is_empty())
            else {
                continue;
            };

            if self.require_absolute && !raw.starts_with("http") {
                continue;
            }

            let Some(url) = resolve_url(page_url, raw)? else {
                continue;
            };

            if !self.url_passes_filters(&url) {
                continue;
            }

            let title = element
                .value()
                .attr("alt")
                .map(str::trim)
                .filter(|alt| !alt.is_empty())
                .map(str::to_owned);

            push_unique(
                out,
                ScrapedImage {
                    url: self.rewrite(url),
                    title,
                },
            );
        }
        Ok(())
    }
}

impl ImageExtractor for HtmlImageExtractor {
    fn extract(&self, html: &str, page_url: &str) -> Result<Vec<ScrapedImage>, ScrapeError> {
        let document = Html::parse_document(html);
        let image_sel = parse_selector(&self.image_selector)?;
        let mut images = Vec::new();

        if let Some(container) = &self.container_selector {
            let container_sel = parse_selector(container)?;
            for element in document.select(&container_sel) {
                self.collect_from(element.select(&image_sel), page_url, &mut images)?;
                if images.len() >= self.limit {
                    break;
                }
            }
        } else {
            self.collect_from(document.select(&image_sel), page_url, &mut images)?;
        }

        log::debug!("html_images: extracted {} image(s) from {page_url}", images.len());
        Ok(images)
    }

    fn strategy(&self) -> &'static str {
        "html_images"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
          <div data-testid="item-stack">
            <img src="https://i5.walmartimages.com/asr/abc.jpeg?odnHeight=180" alt="Cola 12 pack">
            <img data-src="https://i5.walmartimages.com/asr/def.jpeg" alt="">
            <img src="/static/logo.png" alt="logo">
          </div>
          <div class="ads">
            <img src="https://i5.walmartimages.com/asr/ad.jpeg">
          </div>
          <img src="data:image/gif;base64,R0lGOD">
        </body></html>
    "#;

    #[test]
    fn collects_all_images_by_default() {
        let images = HtmlImageExtractor::new()
            .extract(PAGE, "https://www.walmart.com/search?q=1")
            .unwrap();
        let urls: Vec<&str> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://i5.walmartimages.com/asr/abc.jpeg?odnHeight=180",
                "https://i5.walmartimages.com/asr/def.jpeg",
                "https://www.walmart.com/static/logo.png",
                "https://i5.walmartimages.com/asr/ad.jpeg",
            ]
        );
        assert_eq!(images[0].title.as_deref(), Some("Cola 12 pack"));
        assert_eq!(images[1].title, None);
    }

    #[test]
    fn restricts_to_containers_and_filters_urls() {
        let images = HtmlImageExtractor::new()
            .with_container_selector(r#"div[data-testid*="item-stack"]"#)
            .with_url_contains(&["walmartimages.com".to_owned()])
            .with_query_rewrite(Some("odnHeight=768&odnWidth=768".to_owned()))
            .extract(PAGE, "https://www.walmart.com/search?q=1")
            .unwrap();
        let urls: Vec<&str> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://i5.walmartimages.com/asr/abc.jpeg?odnHeight=768&odnWidth=768",
                "https://i5.walmartimages.com/asr/def.jpeg",
            ]
        );
    }

    #[test]
    fn excludes_and_requires_absolute() {
        let images = HtmlImageExtractor::new()
            .with_require_absolute(true)
            .with_url_excludes(&["/ad.".to_owned()])
            .extract(PAGE, "https://www.walmart.com/")
            .unwrap();
        assert_eq!(images.len(), 2);
        assert!(images.iter().all(|i| !i.url.contains("logo")));
    }

    #[test]
    fn respects_limit_and_dedupes() {
        let html = r#"<img src="https://a.com/1.jpg"><img src="https://a.com/1.jpg">
                      <img src="https://a.com/2.jpg"><img src="https://a.com/3.jpg">"#;
        let images = HtmlImageExtractor::new()
            .with_limit(2)
            .extract(html, "https://a.com/")
            .unwrap();
        let urls: Vec<&str> = images.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a.com/1.jpg", "https://a.com/2.jpg"]);
    }

    #[test]
    fn empty_page_yields_nothing() {
        let images = HtmlImageExtractor::new()
            .extract("<html></html>", "https://a.com/")
            .unwrap();
        assert!(images.is_empty());
    }
}
