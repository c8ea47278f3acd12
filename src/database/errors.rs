//! # Session Errors
//!
//! Error types for relational-mirror sessions.

use thiserror::Error;

use crate::common::GatewayError;

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Session errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Username or password rejected
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Session not found
    #[error("Session invalid")]
    SessionInvalid,

    /// Session past its expiry time
    #[error("Session expired")]
    SessionExpired,

    /// Session repository failure
    #[error("Session storage error: {0}")]
    StorageError(String),
}

impl SessionError {
    pub fn status_code(&self) -> u16 {
        match self {
            SessionError::InvalidCredentials
            | SessionError::SessionInvalid
            | SessionError::SessionExpired => 401,
            SessionError::StorageError(_) => 500,
        }
    }
}

impl From<SessionError> for GatewayError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::StorageError(msg) => GatewayError::Backend(msg),
            _ => GatewayError::forbidden(),
        }
    }
}
