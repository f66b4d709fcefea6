//! Shared parsing utilities for product sources.
//!
//! Small helpers for pulling loosely-typed fields out of JSON responses and
//! for filling URL templates.

use serde_json::Value;

/// Placeholder replaced with the URL-encoded identifier.
pub const SKU_PLACEHOLDER: &str = "{sku}";

/// Placeholder replaced with the URL-encoded free-text query.
pub const QUERY_PLACEHOLDER: &str = "{query}";

/// Placeholder replaced with a looked-up product name (query templates
/// only).
pub const NAME_PLACEHOLDER: &str = "{name}";

/// Reads a JSON value as trimmed, non-empty text. Numbers are rendered
/// with their JSON representation; everything else yields `None`.
#[must_use]
pub fn json_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Joins the non-empty parts with a single space, returning `None` if
/// nothing remains.
#[must_use]
pub fn join_text(parts: &[Option<String>]) -> Option<String> {
    let joined = parts
        .iter()
        .flatten()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

/// Returns the array at `key`, or an empty slice if it is absent or not an
/// array.
#[must_use]
pub fn json_array<'a>(value: &'a Value, key: &str) -> &'a [Value] {
    value
        .get(key)
        .and_then(Value::as_array)
        .map_or(&[], Vec::as_slice)
}

/// Fills `{sku}` and `{query}` in a URL template, URL-encoding both values.
#[must_use]
pub fn fill_url(template: &str, identifier: &str, query: &str) -> String {
    template
        .replace(SKU_PLACEHOLDER, &urlencoding::encode(identifier))
        .replace(QUERY_PLACEHOLDER, &urlencoding::encode(query))
}

/// Fills `{sku}` and `{name}` in a free-text query template without
/// encoding.
#[must_use]
pub fn fill_query(template: &str, identifier: &str, name: Option<&str>) -> String {
    template
        .replace(SKU_PLACEHOLDER, identifier)
        .replace(NAME_PLACEHOLDER, name.unwrap_or_default())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_text_and_numbers() {
        let v = serde_json::json!({"a": " x ", "b": 12.5, "c": "", "d": null, "e": [1]});
        assert_eq!(json_text(v.get("a")).as_deref(), Some("x"));
        assert_eq!(json_text(v.get("b")).as_deref(), Some("12.5"));
        assert_eq!(json_text(v.get("c")), None);
        assert_eq!(json_text(v.get("d")), None);
        assert_eq!(json_text(v.get("e")), None);
        assert_eq!(json_text(v.get("missing")), None);
    }

    #[test]
    fn joins_non_empty_parts() {
        assert_eq!(
            join_text(&[Some("Buffalo Trace".to_owned()), None, Some(" Bourbon ".to_owned())])
                .as_deref(),
            Some("Buffalo Trace Bourbon")
        );
        assert_eq!(join_text(&[None, Some("  ".to_owned())]), None);
    }

    #[test]
    fn fills_url_templates() {
        assert_eq!(
            fill_url(
                "https://www.google.com/search?q={query}&tbm=isch",
                "012000161155",
                "012000161155 product"
            ),
            "https://www.google.com/search?q=012000161155%20product&tbm=isch"
        );
        assert_eq!(
            fill_url("https://x.org/api/v0/product/{sku}.json", "012000161155", ""),
            "https://x.org/api/v0/product/012000161155.json"
        );
    }

    #[test]
    fn fills_query_templates() {
        assert_eq!(
            fill_query("{name} {sku} product", "012000161155", Some("Pepsi Cola")),
            "Pepsi Cola 012000161155 product"
        );
        assert_eq!(
            fill_query("{name} {sku} product", "012000161155", None),
            "012000161155 product"
        );
    }
}
