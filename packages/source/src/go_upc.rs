//! Go-UPC product lookup API.
//!
//! Authenticated with a bearer token. Returns at most one image per
//! product code.

use serde_json::Value;
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext};
use crate::parsing::{fill_url, json_text};

/// Looks up `identifier` against the Go-UPC `code` endpoint.
///
/// # Errors
///
/// Returns [`SourceError::MissingCredential`] if the API key is not set, or
/// any HTTP/JSON error from the request.
pub async fn search(
    ctx: &SearchContext<'_>,
    identifier: &str,
    api_url: &str,
    api_key_env: &str,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let api_key = ctx.credential(api_key_env)?;
    let url = fill_url(api_url, identifier, identifier);
    let body = ctx
        .get_json(|| ctx.client.get(&url).bearer_auth(&api_key))
        .await?;
    Ok(parse_response(&ctx.factory(identifier), &body))
}

/// Extracts the product image from a Go-UPC response.
#[must_use]
pub fn parse_response(factory: &CandidateFactory<'_>, body: &Value) -> Vec<CandidateRecord> {
    let Some(product) = body.get("product") else {
        return Vec::new();
    };

    json_text(product.get("imageUrl").or_else(|| product.get("image")))
        .and_then(|url| factory.record(&url, json_text(product.get("name"))))
        .map(|rec| rec.with_description(json_text(product.get("brand"))))
        .into_iter()
        .collect()
}
