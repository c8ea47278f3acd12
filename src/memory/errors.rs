//! # Store Errors

use thiserror::Error;

/// Result type for in-memory store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// In-memory store errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Unknown entity type: {0}")]
    UnknownEntity(String),

    #[error("Unknown field {field} on {entity}")]
    UnknownField { entity: String, field: String },

    #[error("No {entity} found with id {id}")]
    NotFound { entity: String, id: i64 },

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Constraint violated: {0}")]
    Constraint(String),
}

impl StoreError {
    pub(crate) fn unknown_field(entity: &str, field: &str) -> Self {
        Self::UnknownField {
            entity: entity.to_string(),
            field: field.to_string(),
        }
    }

    /// Whether the error was caused by the request rather than the data
    pub fn is_invalid_request(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownEntity(_) | StoreError::UnknownField { .. } | StoreError::InvalidValue(_)
        )
    }
}
