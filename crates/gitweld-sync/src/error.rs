//! Engine error types.

use gitweld_provider::{GitProvider, ProviderError};
use thiserror::Error;

/// Errors that can occur in the reconciliation engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Provider boundary error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No client registered for a provider.
    #[error("No client registered for provider {provider}")]
    ProviderUnavailable { provider: GitProvider },

    /// Not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Invalid state transition.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    pub fn provider_unavailable(provider: GitProvider) -> Self {
        Self::ProviderUnavailable { provider }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_state_transition(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::InvalidStateTransition {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether retrying the operation could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) => true,
            Self::Provider(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// The underlying provider error, when this failure came from the
    /// provider boundary.
    #[must_use]
    pub fn as_provider(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(e) => Some(e),
            _ => None,
        }
    }

    /// Stable code for audit records.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Database(_) => "DATABASE",
            Self::Provider(e) => e.error_code(),
            Self::Serialization(_) => "SERIALIZATION",
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Whether the failure needs operator attention before a retry can work.
    #[must_use]
    pub fn requires_resolution(&self) -> bool {
        self.as_provider().is_some_and(ProviderError::requires_resolution)
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
