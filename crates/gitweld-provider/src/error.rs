//! Provider error types and HTTP status classification.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors surfaced by provider clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Credentials rejected (401).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Token lacks the required scope or access (403, not rate limiting).
    #[error("Permission denied: {message}")]
    Permission { message: String },

    /// Resource does not exist on the provider (404).
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Validation or state conflict (409/422).
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Provider rate limit hit (429, or 403 with a rate-limit body).
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// When the provider says the limit resets, if it says at all.
        reset_at: Option<DateTime<Utc>>,
    },

    /// Provider-side failure (5xx).
    #[error("Server error (status {status}): {message}")]
    Server { status: u16, message: String },

    /// Transport-level failure before a response was received.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Request timed out.
    #[error("Timeout: {message}")]
    Timeout { message: String },

    /// Response arrived but could not be parsed into the typed model.
    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    /// Client misconfiguration (bad base URL, empty token).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Status the classifier has no rule for.
    #[error("Unexpected response (status {status}): {message}")]
    Unexpected { status: u16, message: String },
}

impl ProviderError {
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>, reset_at: Option<DateTime<Utc>>) -> Self {
        Self::RateLimited {
            message: message.into(),
            reset_at,
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether retrying this operation could succeed.
    ///
    /// 4xx responses are deterministic and fatal, with rate limiting as the
    /// one exception. Server-side and transport failures are retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Server { .. }
                | Self::Network { .. }
                | Self::Timeout { .. }
                | Self::Unexpected { .. }
        )
    }

    /// Whether the failure needs operator attention before a retry can work.
    #[must_use]
    pub fn requires_resolution(&self) -> bool {
        matches!(self, Self::Authentication { .. } | Self::Permission { .. })
    }

    /// Stable code for audit records and metrics.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Authentication { .. } => "AUTHENTICATION",
            Self::Permission { .. } => "PERMISSION",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict { .. } => "CONFLICT",
            Self::RateLimited { .. } => "RATE_LIMIT",
            Self::Server { .. } => "SERVER",
            Self::Network { .. } => "NETWORK",
            Self::Timeout { .. } => "TIMEOUT",
            Self::InvalidResponse { .. } => "INVALID_RESPONSE",
            Self::Configuration { .. } => "CONFIGURATION",
            Self::Unexpected { .. } => "UNKNOWN",
        }
    }

    /// The rate-limit reset time, when known.
    #[must_use]
    pub fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::RateLimited { reset_at, .. } => *reset_at,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout {
                message: err.to_string(),
            }
        } else if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Classify a non-success HTTP response into a [`ProviderError`].
///
/// `reset_at` is the parsed rate-limit reset header, when the response
/// carried one. A 403 only counts as rate limiting when the body says so or
/// a reset header is present; otherwise it is a scope problem.
#[must_use]
pub fn classify_status(status: u16, body: &str, reset_at: Option<DateTime<Utc>>) -> ProviderError {
    let snippet = body_snippet(body);
    match status {
        401 => ProviderError::authentication(snippet),
        403 => {
            if reset_at.is_some() || body.to_ascii_lowercase().contains("rate limit") {
                ProviderError::rate_limited(snippet, reset_at)
            } else {
                ProviderError::permission(snippet)
            }
        }
        404 => ProviderError::not_found(snippet),
        409 | 422 => ProviderError::conflict(snippet),
        429 => ProviderError::rate_limited(snippet, reset_at),
        s if s >= 500 => ProviderError::Server {
            status: s,
            message: snippet,
        },
        s => ProviderError::Unexpected {
            status: s,
            message: snippet,
        },
    }
}

/// Trim a response body for inclusion in an error message.
fn body_snippet(body: &str) -> String {
    const MAX: usize = 240;
    let trimmed = body.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &trimmed[..end])
    }
}
