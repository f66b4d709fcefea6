//! Open Food Facts product API (no authentication).

use serde_json::Value;
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext};
use crate::parsing::{fill_url, json_text};

/// Product fields holding image URLs, in the order they are offered.
const IMAGE_FIELDS: &[&str] = &["image_url", "image_front_url", "image_nutrition_url"];

/// Looks up `identifier` in Open Food Facts.
///
/// # Errors
///
/// Returns [`SourceError`] on HTTP or JSON failure.
pub async fn search(
    ctx: &SearchContext<'_>,
    identifier: &str,
    api_url: &str,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let url = fill_url(api_url, identifier, identifier);
    let body = ctx.get_json(|| ctx.client.get(&url)).await?;
    Ok(parse_response(&ctx.factory(identifier), &body))
}

/// Extracts product images from an Open Food Facts response.
///
/// Responses with `status != 1` (product not found) yield nothing.
#[must_use]
pub fn parse_response(factory: &CandidateFactory<'_>, body: &Value) -> Vec<CandidateRecord> {
    if body.get("status").and_then(Value::as_i64) != Some(1) {
        return Vec::new();
    }
    let Some(product) = body.get("product") else {
        return Vec::new();
    };

    let title = json_text(product.get("product_name"));
    let brands = json_text(product.get("brands"));

    let mut records: Vec<CandidateRecord> = Vec::new();
    for field in IMAGE_FIELDS {
        let Some(url) = json_text(product.get(*field)) else {
            continue;
        };
        if records.iter().any(|r| r.image_url == url) {
            continue;
        }
        if let Some(rec) = factory.record(&url, title.clone()) {
            records.push(rec.with_description(brands.clone()));
        }
    }
    records
}
