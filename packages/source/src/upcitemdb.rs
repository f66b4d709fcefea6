//! UPCitemdb lookup API.
//!
//! The trial endpoint works without a key; a key (sent as a bearer token)
//! raises the rate limit.

use serde_json::Value;
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext, optional_credential};
use crate::parsing::{fill_url, json_array, json_text};

/// Looks up `identifier` in UPCitemdb.
///
/// # Errors
///
/// Returns [`SourceError`] on HTTP or JSON failure.
pub async fn search(
    ctx: &SearchContext<'_>,
    identifier: &str,
    api_url: &str,
    api_key_env: Option<&str>,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let body = lookup(ctx, identifier, api_url, api_key_env).await?;
    Ok(parse_response(&ctx.factory(identifier), &body))
}

/// Fetches the raw lookup response. Shared with the product-name lookup.
///
/// # Errors
///
/// Returns [`SourceError`] on HTTP or JSON failure.
pub async fn lookup(
    ctx: &SearchContext<'_>,
    identifier: &str,
    api_url: &str,
    api_key_env: Option<&str>,
) -> Result<Value, SourceError> {
    let url = fill_url(api_url, identifier, identifier);
    let api_key = optional_credential(api_key_env);
    ctx.get_json(|| {
        let request = ctx.client.get(&url);
        match &api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    })
    .await
}

/// Extracts every image of every matching item.
#[must_use]
pub fn parse_response(factory: &CandidateFactory<'_>, body: &Value) -> Vec<CandidateRecord> {
    let mut records = Vec::new();
    for item in json_array(body, "items") {
        let title = json_text(item.get("title"));
        let brand = json_text(item.get("brand"));
        for image in json_array(item, "images") {
            let Some(url) = json_text(Some(image)) else {
                continue;
            };
            if let Some(rec) = factory.record(&url, title.clone()) {
                records.push(rec.with_description(brand.clone()));
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;

    const FACTORY: CandidateFactory<'static> = CandidateFactory {
        identifier: "012000161155",
        source: "UPC Database",
        confidence: 0.85,
    };

    #[test]
    fn parses_item_images() {
        let body = serde_json::json!({
            "code": "OK",
            "items": [{
                "title": "Pepsi 12oz Can",
                "brand": "Pepsi",
                "images": ["https://i.upcitemdb.com/1.jpg", "", "https://i.upcitemdb.com/2.jpg"]
            }]
        });
        let records = parse_response(&FACTORY, &body);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.title == "Pepsi 12oz Can"));
        assert!(records.iter().all(|r| r.description.as_deref() == Some("Pepsi")));
    }

    #[test]
    fn empty_items_yield_nothing() {
        assert!(parse_response(&FACTORY, &serde_json::json!({"items": []})).is_empty());
        assert!(parse_response(&FACTORY, &serde_json::json!({"code": "INVALID_UPC"})).is_empty());
    }
}
