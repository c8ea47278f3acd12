//! # Gateway Errors
//!
//! Error types surfaced by the filter engine and the backends.

use thiserror::Error;

/// Result type for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Gateway errors
///
/// Every variant carries a message that is safe to show to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    // ==================
    // Client Errors (4xx)
    // ==================
    /// Session missing, invalid or expired
    #[error("{0}")]
    Authentication(String),

    /// Malformed request: unknown attribute, bad date, unresolvable entity
    #[error("{0}")]
    BadRequest(String),

    /// A filter could not be constructed (e.g. negative limit)
    #[error("{0}")]
    Validation(String),

    /// The query matched no records where at least one was required
    #[error("{0}")]
    MissingRecord(String),

    // ==================
    // Server Errors (5xx)
    // ==================
    /// Failure reported by the catalog or the relational mirror
    #[error("{0}")]
    Backend(String),

    /// Filter applied onto a query that cannot accept it
    #[error("Filter error: {0}")]
    Filter(String),
}

impl GatewayError {
    pub fn forbidden() -> Self {
        Self::Authentication("Forbidden".to_string())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing_record(msg: impl Into<String>) -> Self {
        Self::MissingRecord(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::Authentication(_) => 401,
            GatewayError::BadRequest(_) => 400,
            GatewayError::Validation(_) => 400,
            GatewayError::MissingRecord(_) => 404,
            GatewayError::Backend(_) => 500,
            GatewayError::Filter(_) => 500,
        }
    }

    /// Returns whether this error was caused by the caller
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
