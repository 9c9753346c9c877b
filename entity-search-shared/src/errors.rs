//! Error taxonomy shared by the coordinators and handlers.

use thiserror::Error;

/// Errors surfaced to callers of the index and query coordinators.
///
/// A lost version race is not represented here: stale writes are reported
/// as an outcome, never as an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// Malformed request shape, bad pagination or missing identifiers.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Missing or invalid tenant identity.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The underlying index store failed or timed out.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
}

impl ServiceError {
    /// Create an invalid input error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a store unavailable error.
    pub fn store_unavailable(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    /// Whether the caller should retry (event redelivery or client retry).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::StoreUnavailable(_) => 503,
        }
    }

    /// The bare message without the category prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::InvalidInput(msg) | Self::Unauthorized(msg) | Self::StoreUnavailable(msg) => msg,
        }
    }
}
