//! eBay Browse API item search.

use serde_json::Value;
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext};
use crate::parsing::{fill_url, json_array, json_text};

/// Header carrying the buyer location eBay uses to localize results.
const END_USER_CONTEXT_HEADER: &str = "X-EBAY-C-ENDUSERCTX";

/// Searches eBay listings for `identifier`.
///
/// # Errors
///
/// Returns [`SourceError::MissingCredential`] if the application token is
/// not set, or any HTTP/JSON error from the request.
pub async fn search(
    ctx: &SearchContext<'_>,
    identifier: &str,
    api_url: &str,
    api_key_env: &str,
    end_user_context: Option<&str>,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let token = ctx.credential(api_key_env)?;
    let url = fill_url(api_url, identifier, identifier);
    let limit = ctx.limit.to_string();

    let body = ctx
        .get_json(|| {
            let request = ctx
                .client
                .get(&url)
                .bearer_auth(&token)
                .query(&[("q", identifier), ("limit", limit.as_str())]);
            match end_user_context {
                Some(value) => request.header(END_USER_CONTEXT_HEADER, value),
                None => request,
            }
        })
        .await?;

    Ok(parse_response(&ctx.factory(identifier), &body))
}

/// Extracts listing images and prices from an item summary search.
#[must_use]
pub fn parse_response(factory: &CandidateFactory<'_>, body: &Value) -> Vec<CandidateRecord> {
    json_array(body, "itemSummaries")
        .iter()
        .filter_map(|item| {
            let url = json_text(item.get("image").and_then(|i| i.get("imageUrl")))?;
            let price = json_text(item.get("price").and_then(|p| p.get("value")));
            factory
                .record(&url, json_text(item.get("title")))
                .map(|rec| rec.with_price(price))
        })
        .collect()
}
