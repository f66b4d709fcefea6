//! HTTP helpers that classify responses for the backoff executor.
//!
//! Source adapters should use [`send_json`] or [`send_text`] instead of
//! calling `reqwest::RequestBuilder::send()` directly. HTTP 429 is mapped to
//! [`SourceError::RateLimited`] (retryable), any other non-success status to
//! [`SourceError::Status`] (not retryable).

use crate::SourceError;

/// Maximum length of the response body preview included in debug logs.
const BODY_PREVIEW_LEN: usize = 300;

/// Sends `request` and returns the response if its status is a success.
///
/// # Errors
///
/// Returns [`SourceError::RateLimited`] on HTTP 429,
/// [`SourceError::Status`] on any other non-2xx status, or
/// [`SourceError::Http`] if the request itself fails.
pub async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, SourceError> {
    let response = request.send().await?;
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(SourceError::RateLimited {
            url: response.url().to_string(),
        });
    }

    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        });
    }

    Ok(response)
}

/// Sends `request` and parses the response body as JSON.
///
/// # Errors
///
/// Returns [`SourceError`] if [`send`] fails, the body cannot be read, or
/// it is not valid JSON.
pub async fn send_json(request: reqwest::RequestBuilder) -> Result<serde_json::Value, SourceError> {
    let response = send(request).await?;
    let url = response.url().to_string();
    let text = response.text().await?;

    serde_json::from_str(&text).map_err(|e| {
        log::debug!(
            "JSON parse failed for {url} ({} bytes): {e}\n  body preview: {}",
            text.len(),
            preview(&text)
        );
        SourceError::Json(e)
    })
}

/// Sends `request` and returns the response body as a `String`.
///
/// # Errors
///
/// Returns [`SourceError`] if [`send`] fails or the body cannot be read.
pub async fn send_text(request: reqwest::RequestBuilder) -> Result<String, SourceError> {
    Ok(send(request).await?.text().await?)
}

fn preview(text: &str) -> &str {
    if text.len() <= BODY_PREVIEW_LEN {
        return text;
    }
    let mut end = BODY_PREVIEW_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
