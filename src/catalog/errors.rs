//! # Catalog Client Errors
//!
//! Failures reported by a catalog client, and how they surface to callers.

use thiserror::Error;

use crate::common::GatewayError;

/// Result type for catalog client calls
pub type ClientResult<T> = Result<T, ClientError>;

/// Catalog client errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Session id unknown, expired or logged out
    #[error("Session error: {0}")]
    Session(String),

    /// Login rejected
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The catalog rejected the request contents
    #[error("{0}")]
    Validation(String),

    /// Referenced object does not exist
    #[error("{0}")]
    NoSuchObject(String),

    /// Any other failure inside the catalog
    #[error("{0}")]
    Internal(String),
}

impl ClientError {
    pub fn is_session_error(&self) -> bool {
        matches!(self, ClientError::Session(_))
    }
}

impl From<ClientError> for GatewayError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Session(_) | ClientError::Authentication(_) => GatewayError::forbidden(),
            ClientError::NoSuchObject(msg) => GatewayError::MissingRecord(msg),
            ClientError::Validation(msg) | ClientError::Internal(msg) => GatewayError::Backend(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_map_to_gateway_errors() {
        let err: GatewayError = ClientError::Session("expired".into()).into();
        assert_eq!(err, GatewayError::forbidden());

        let err: GatewayError = ClientError::Validation("bad attribute".into()).into();
        assert_eq!(err, GatewayError::Backend("bad attribute".into()));
        assert_eq!(err.status_code(), 500);
    }
}
