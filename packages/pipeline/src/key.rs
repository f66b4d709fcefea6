//! Storage key derivation for accepted images.
//!
//! A key looks like
//! `{identifier}-{title}-{source}-{millis}-{digest}.{ext}`, optionally
//! under a `prefix/`. The title is dropped when it is the synthesized
//! default. The millisecond timestamp plus an 8-character digest of the
//! image URL keeps keys unique across concurrent writers without locking.

use sku_finder_source_models::CandidateRecord;
use sku_finder_storage::md5_hex;

/// Characters that are illegal in file names on at least one platform.
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum number of title characters kept in a key.
pub const MAX_TITLE_CHARS: usize = 30;

/// Length of the URL digest suffix.
const DIGEST_LEN: usize = 8;

/// Extension used when neither the decoded format nor the URL gives one.
pub const DEFAULT_EXTENSION: &str = "jpg";

/// Extensions recognized at the end of an image URL.
const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Replaces path-illegal and control characters with `_` and whitespace
/// runs with a single `_`.
#[must_use]
pub fn sanitize(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| {
            if ILLEGAL_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/// Returns the lowercase extension at the end of `url`'s path if it is a
/// known image extension.
#[must_use]
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    KNOWN_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Builds the storage key for an accepted `record`.
#[must_use]
pub fn storage_key(
    prefix: Option<&str>,
    record: &CandidateRecord,
    timestamp_ms: i64,
    extension: &str,
) -> String {
    let mut parts = vec![sanitize(&record.identifier)];

    if !record.has_default_title() {
        let title: String = sanitize(&record.title)
            .chars()
            .take(MAX_TITLE_CHARS)
            .collect();
        let title = title.trim_matches('_');
        if !title.is_empty() {
            parts.push(title.to_owned());
        }
    }

    parts.push(sanitize(&record.source.to_lowercase()));
    parts.push(timestamp_ms.to_string());
    parts.push(md5_hex(record.image_url.as_bytes())[..DIGEST_LEN].to_owned());

    let name = format!("{}.{extension}", parts.join("-"));
    match prefix.map(|p| p.trim_matches('/')).filter(|p| !p.is_empty()) {
        Some(prefix) => format!("{prefix}/{name}"),
        None => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, source: &str, url: &str) -> CandidateRecord {
        CandidateRecord::new("012000161155", source, url, title, 0.9)
    }

    #[test]
    fn sanitizes_illegal_characters() {
        assert_eq!(sanitize(r#"a<b>c:d"e/f\g|h?i*j"#), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize("  Pepsi   Cola 12 oz "), "Pepsi_Cola_12_oz");
    }

    #[test]
    fn builds_keys_from_record_fields() {
        let rec = record("Pepsi Cola: 12/pack", "Total Wine", "https://x.com/a.png");
        let key = storage_key(None, &rec, 1_700_000_000_123, "png");
        let digest = &md5_hex(b"https://x.com/a.png")[..8];
        assert_eq!(
            key,
            format!("012000161155-Pepsi_Cola__12_pack-total_wine-1700000000123-{digest}.png")
        );
    }

    #[test]
    fn default_title_is_omitted_and_long_titles_truncated() {
        let rec = record("Product 012000161155", "Walmart", "https://x.com/a.jpg");
        let key = storage_key(Some("/images/"), &rec, 1, "jpg");
        assert!(key.starts_with("images/012000161155-walmart-1-"));

        let rec = record(&"x".repeat(80), "Walmart", "https://x.com/a.jpg");
        let key = storage_key(None, &rec, 1, "jpg");
        assert!(key.contains(&format!("-{}-walmart-", "x".repeat(MAX_TITLE_CHARS))));
    }

    #[test]
    fn different_urls_get_different_keys() {
        let a = storage_key(None, &record("t", "S", "https://x.com/1.jpg"), 5, "jpg");
        let b = storage_key(None, &record("t", "S", "https://x.com/2.jpg"), 5, "jpg");
        assert_ne!(a, b);
    }

    #[test]
    fn reads_url_extensions() {
        assert_eq!(url_extension("https://x.com/a/b.PNG?w=1").as_deref(), Some("png"));
        assert_eq!(url_extension("https://x.com/a/b.webp#frag").as_deref(), Some("webp"));
        assert_eq!(url_extension("https://x.com/a/b.php"), None);
        assert_eq!(url_extension("https://x.com/image"), None);
    }
}
