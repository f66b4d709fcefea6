//! Distiller spirits search API.

use serde_json::Value;
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext};
use crate::parsing::{fill_url, join_text, json_array, json_text};

/// Searches Distiller for spirits matching `identifier`.
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
    let body = ctx
        .get_json(|| {
            ctx.client
                .get(&url)
                .query(&[("q", identifier), ("type", "spirit")])
        })
        .await?;
    Ok(parse_response(&ctx.factory(identifier), &body))
}

/// Extracts bottle images and distillery/category descriptions.
#[must_use]
pub fn parse_response(factory: &CandidateFactory<'_>, body: &Value) -> Vec<CandidateRecord> {
    json_array(body, "spirits")
        .iter()
        .filter_map(|spirit| {
            let url = json_text(spirit.get("image_url"))
                .or_else(|| json_text(spirit.get("bottle_image")))?;
            let description = join_text(&[
                json_text(spirit.get("distillery")),
                json_text(spirit.get("category")),
            ]);
            factory
                .record(&url, json_text(spirit.get("name")))
                .map(|rec| rec.with_description(description))
        })
        .collect()
}
