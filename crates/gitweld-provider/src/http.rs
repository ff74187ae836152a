//! Shared response handling for the REST clients.

use crate::error::{classify_status, ProviderError};
use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;
use reqwest::Response;

/// Turn a non-success response into a classified [`ProviderError`].
pub(crate) async fn error_from_response(response: Response) -> ProviderError {
    let status = response.status().as_u16();
    let reset = reset_from_headers(response.headers());
    let body = response.text().await.unwrap_or_default();
    classify_status(status, &body, reset)
}

/// Extract a rate-limit reset time from response headers.
///
/// Checks the epoch-seconds reset headers both provider models use, then
/// falls back to `Retry-After` in seconds.
pub(crate) fn reset_from_headers(headers: &HeaderMap) -> Option<DateTime<Utc>> {
    for name in ["x-ratelimit-reset", "ratelimit-reset"] {
        if let Some(value) = header_i64(headers, name) {
            if let Some(ts) = Utc.timestamp_opt(value, 0).single() {
                return Some(ts);
            }
        }
    }
    header_i64(headers, "retry-after").map(|secs| Utc::now() + chrono::Duration::seconds(secs))
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
}
