#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Candidate record types shared by every product image source.
//!
//! Each external source (official product API, storefront search page,
//! generic image search engine) produces [`CandidateRecord`]s that conform
//! to this shape. Records are ranked, downloaded, and either accepted
//! (with a storage key in [`CandidateRecord::local_path`]) or discarded.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Minimum number of digits in a product identifier.
pub const MIN_IDENTIFIER_LEN: usize = 8;

/// Maximum number of digits in a product identifier.
pub const MAX_IDENTIFIER_LEN: usize = 20;

/// The broad category of an external source.
///
/// Used to sanity-check the confidence a source definition assigns to its
/// records: structured APIs are trusted more than scraped pages, which are
/// trusted more than generic image search.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// Official product database with a structured JSON API.
    OfficialApi,
    /// Retailer or marketplace listing, scraped or served by a marketplace
    /// API.
    Storefront,
    /// General-purpose image search engine.
    ImageSearch,
}

impl SourceKind {
    /// Returns the inclusive confidence range records from this kind of
    /// source are expected to carry.
    #[must_use]
    pub const fn confidence_range(self) -> (f64, f64) {
        match self {
            Self::OfficialApi => (0.85, 1.0),
            Self::Storefront => (0.6, 0.9),
            Self::ImageSearch => (0.6, 0.6),
        }
    }
}

/// One offer of an image and metadata for a product identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateRecord {
    /// The queried SKU/UPC.
    pub identifier: String,
    /// Display name of the source that produced this record
    /// (e.g., `"Open Food Facts"`).
    pub source: String,
    /// Absolute URL of the candidate image.
    pub image_url: String,
    /// Human-readable product label. May be [`default_title`].
    pub title: String,
    /// Listed price, if the source exposes one.
    pub price: Option<String>,
    /// Free-form description (brand, producer, region, ...).
    pub description: Option<String>,
    /// Ranking weight in `[0, 1]`, fixed per source.
    pub confidence: f64,
    /// Storage key of the accepted image. `None` until the record has been
    /// downloaded and accepted.
    pub local_path: Option<String>,
}

impl CandidateRecord {
    /// Creates a new candidate with no price, description, or storage key.
    ///
    /// Confidence is clamped into `[0, 1]`.
    #[must_use]
    pub fn new(
        identifier: &str,
        source: &str,
        image_url: &str,
        title: &str,
        confidence: f64,
    ) -> Self {
        Self {
            identifier: identifier.to_owned(),
            source: source.to_owned(),
            image_url: image_url.to_owned(),
            title: title.to_owned(),
            price: None,
            description: None,
            confidence: confidence.clamp(0.0, 1.0),
            local_path: None,
        }
    }

    /// Sets the price, ignoring blank values.
    #[must_use]
    pub fn with_price(mut self, price: Option<String>) -> Self {
        self.price = non_blank(price);
        self
    }

    /// Sets the description, ignoring blank values.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = non_blank(description);
        self
    }

    /// Whether this record carries the synthesized default title rather
    /// than a real product name.
    #[must_use]
    pub fn has_default_title(&self) -> bool {
        self.title == default_title(&self.identifier)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

/// Returns the title used when a source provides no product name.
#[must_use]
pub fn default_title(identifier: &str) -> String {
    format!("Product {identifier}")
}

/// Returns `true` if `identifier` looks like a UPC/SKU: 8 to 20 ASCII
/// digits after trimming surrounding whitespace.
#[must_use]
pub fn is_valid_identifier(identifier: &str) -> bool {
    let trimmed = identifier.trim();
    (MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN).contains(&trimmed.len())
        && trimmed.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_identifiers() {
        assert!(is_valid_identifier("012000161155"));
        assert!(is_valid_identifier(" 12345678 "));
        assert!(!is_valid_identifier("1234567"));
        assert!(!is_valid_identifier("123456789012345678901"));
        assert!(!is_valid_identifier("01200016115a"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn clamps_confidence() {
        let rec = CandidateRecord::new("12345678", "X", "https://x/y.jpg", "t", 1.7);
        assert!((rec.confidence - 1.0).abs() < f64::EPSILON);
        let rec = CandidateRecord::new("12345678", "X", "https://x/y.jpg", "t", -0.5);
        assert!(rec.confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn blank_optional_fields_are_dropped() {
        let rec = CandidateRecord::new("12345678", "X", "https://x/y.jpg", "t", 0.5)
            .with_price(Some("  ".to_owned()))
            .with_description(Some(" Acme ".to_owned()));
        assert_eq!(rec.price, None);
        assert_eq!(rec.description.as_deref(), Some("Acme"));
    }

    #[test]
    fn detects_default_title() {
        let rec = CandidateRecord::new("12345678", "X", "u", &default_title("12345678"), 0.5);
        assert!(rec.has_default_title());
        let rec = CandidateRecord::new("12345678", "X", "u", "Cola 12oz", 0.5);
        assert!(!rec.has_default_title());
    }

    #[test]
    fn source_kind_round_trips_through_strings() {
        assert_eq!(SourceKind::OfficialApi.as_ref(), "OFFICIAL_API");
        assert_eq!(
            "IMAGE_SEARCH".parse::<SourceKind>().ok(),
            Some(SourceKind::ImageSearch)
        );
        let json = serde_json::to_string(&SourceKind::Storefront).unwrap();
        assert_eq!(json, "\"STOREFRONT\"");
    }
}
