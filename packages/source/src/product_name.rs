//! Product-name lookup used to enrich free-text image searches.
//!
//! Generic image search engines return much better matches for
//! `"Pepsi Cola 12 fl oz 012000161155"` than for a bare barcode. The name
//! comes from a UPCitemdb lookup; failures are silent.

use serde::Deserialize;
use serde_json::Value;

use crate::context::SearchContext;
use crate::parsing::{json_array, json_text};
use crate::upcitemdb;

/// Where to look up product names.
#[derive(Debug, Clone, Deserialize)]
pub struct NameLookupConfig {
    /// UPCitemdb-compatible lookup URL template (with `{sku}`).
    pub api_url: String,
    /// Optional environment variable holding an API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

/// Returns a human-readable name for `identifier`, or `None` if the lookup
/// fails or finds nothing.
pub async fn lookup_product_name(
    ctx: &SearchContext<'_>,
    identifier: &str,
    config: &NameLookupConfig,
) -> Option<String> {
    match upcitemdb::lookup(ctx, identifier, &config.api_url, config.api_key_env.as_deref()).await
    {
        Ok(body) => {
            let name = parse_product_name(&body);
            log::debug!("{}: product name for {identifier}: {name:?}", ctx.source_name);
            name
        }
        Err(e) => {
            log::debug!("{}: product name lookup for {identifier} failed: {e}", ctx.source_name);
            None
        }
    }
}

/// Builds a name from the first matching item: `"{brand} {title}"`, else
/// the title, else the brand.
#[must_use]
pub fn parse_product_name(body: &Value) -> Option<String> {
    let item = json_array(body, "items").first()?;
    match (json_text(item.get("brand")), json_text(item.get("title"))) {
        (Some(brand), Some(title)) => Some(format!("{brand} {title}")),
        (None, Some(title)) => Some(title),
        (Some(brand), None) => Some(brand),
        (None, None) => None,
    }
}
