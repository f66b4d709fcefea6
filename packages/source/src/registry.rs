//! Source registry: loads all source definitions from embedded TOML configs.
//!
//! Each `.toml` file in `packages/source/sources/` is baked into the binary
//! at compile time via [`include_str!`]. Adding a new source is as simple as
//! creating a new TOML file and adding it to the list below.

use crate::SourceAdapter;
use crate::backoff::BackoffExecutor;
use crate::source_def::{ConfiguredSource, SourceDefinition, parse_source_toml};

/// TOML configs embedded at compile time.
const SOURCE_TOMLS: &[(&str, &str)] = &[
    // ── Product APIs ─────────────────────────────────────────────────
    ("go_upc", include_str!("../sources/go_upc.toml")),
    (
        "open_food_facts",
        include_str!("../sources/open_food_facts.toml"),
    ),
    ("upcitemdb", include_str!("../sources/upcitemdb.toml")),
    ("wine_searcher", include_str!("../sources/wine_searcher.toml")),
    ("distiller", include_str!("../sources/distiller.toml")),
    // ── Storefronts and marketplaces ─────────────────────────────────
    ("total_wine", include_str!("../sources/total_wine.toml")),
    ("bevmo", include_str!("../sources/bevmo.toml")),
    ("walmart", include_str!("../sources/walmart.toml")),
    ("target", include_str!("../sources/target.toml")),
    ("ebay", include_str!("../sources/ebay.toml")),
    (
        "google_shopping",
        include_str!("../sources/google_shopping.toml"),
    ),
    (
        "barcode_lookup",
        include_str!("../sources/barcode_lookup.toml"),
    ),
    // ── Image search engines ─────────────────────────────────────────
    (
        "duckduckgo_images",
        include_str!("../sources/duckduckgo_images.toml"),
    ),
    ("bing_images", include_str!("../sources/bing_images.toml")),
    ("google_images", include_str!("../sources/google_images.toml")),
];

/// Total number of configured sources (used in tests).
#[cfg(test)]
const EXPECTED_SOURCE_COUNT: usize = 15;

/// Returns all configured source definitions, parsed from embedded TOML.
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_sources() -> Vec<SourceDefinition> {
    SOURCE_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_source_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Returns the enabled source definitions, optionally restricted to the
/// given ids.
///
/// An explicit id list selects sources even if they are disabled by
/// default. Unknown ids are logged and ignored.
#[must_use]
pub fn enabled_sources(only: Option<&[String]>) -> Vec<SourceDefinition> {
    let all = all_sources();
    let Some(ids) = only.filter(|ids| !ids.is_empty()) else {
        return all.into_iter().filter(|s| s.enabled).collect();
    };

    for id in ids {
        if !all.iter().any(|s| &s.id == id) {
            log::warn!("Unknown source id '{id}' (see `sku_finder sources`)");
        }
    }

    all.into_iter().filter(|s| ids.contains(&s.id)).collect()
}

/// Builds adapters for `definitions`, preserving their order.
///
/// A definition that fails to build is logged and skipped so one broken
/// source cannot take the others down.
#[must_use]
pub fn build_adapters(
    definitions: Vec<SourceDefinition>,
    backoff: BackoffExecutor,
    max_candidates: usize,
) -> Vec<Box<dyn SourceAdapter>> {
    definitions
        .into_iter()
        .filter_map(|def| {
            let id = def.id.clone();
            match ConfiguredSource::new(def, backoff, max_candidates) {
                Ok(source) => Some(Box::new(source) as Box<dyn SourceAdapter>),
                Err(e) => {
                    log::error!("Failed to initialize source '{id}': {e}");
                    None
                }
            }
        })
        .collect()
}
