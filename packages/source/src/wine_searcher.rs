//! Wine-Searcher lookup API for wines and spirits.
//!
//! Each configured query term is tried in order until one produces
//! results.

use serde_json::Value;
use sku_finder_source_models::CandidateRecord;

use crate::SourceError;
use crate::context::{CandidateFactory, SearchContext, optional_credential};
use crate::parsing::{fill_query, fill_url, join_text, json_array, json_text};

/// Searches Wine-Searcher with each of `query_terms` until one matches.
///
/// # Errors
///
/// Returns the last [`SourceError`] if every term fails outright.
pub async fn search(
    ctx: &SearchContext<'_>,
    identifier: &str,
    api_url: &str,
    api_key_env: Option<&str>,
    query_terms: &[String],
) -> Result<Vec<CandidateRecord>, SourceError> {
    let api_key = optional_credential(api_key_env);
    let factory = ctx.factory(identifier);
    let mut last_error = None;

    for term in query_terms {
        let query = fill_query(term, identifier, None);
        let url = fill_url(api_url, identifier, &query);
        let result = ctx
            .get_json(|| {
                let request = ctx
                    .client
                    .get(&url)
                    .query(&[("query", query.as_str()), ("format", "json")]);
                match &api_key {
                    Some(key) => request.query(&[("api_key", key.as_str())]),
                    None => request,
                }
            })
            .await;

        match result {
            Ok(body) => {
                let records = parse_response(&factory, &body);
                if !records.is_empty() {
                    return Ok(records);
                }
                last_error = None;
            }
            Err(e) => {
                log::debug!("{}: query '{query}' failed: {e}", ctx.source_name);
                last_error = Some(e);
            }
        }
    }

    last_error.map_or_else(|| Ok(Vec::new()), Err)
}

/// Extracts wine images, minimum price, and producer/region description.
#[must_use]
pub fn parse_response(factory: &CandidateFactory<'_>, body: &Value) -> Vec<CandidateRecord> {
    json_array(body, "results")
        .iter()
        .filter_map(|wine| {
            let url = json_text(wine.get("image"))?;
            let description = join_text(&[
                json_text(wine.get("producer")),
                json_text(wine.get("region")),
            ]);
            factory
                .record(&url, json_text(wine.get("wine")))
                .map(|rec| {
                    rec.with_price(json_text(wine.get("price_min")))
                        .with_description(description)
                })
        })
        .collect()
}
