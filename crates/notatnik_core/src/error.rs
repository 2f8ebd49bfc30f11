//! crates/notatnik_core/src/error.rs
//!
//! The error type returned by every core service.

use crate::coach::CoachError;
use crate::ports::PortError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Coach(#[from] CoachError),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl From<PortError> for ServiceError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(msg) => ServiceError::NotFound(msg),
            PortError::Conflict(msg) => ServiceError::Conflict(msg),
            PortError::Unauthorized => ServiceError::Unauthorized("Unauthorized".to_string()),
            PortError::Unexpected(msg) => ServiceError::Internal(msg),
        }
    }
}

/// Rejects a missing or whitespace-only value.
pub(crate) fn require_non_blank<'a>(value: &'a str, message: &str) -> ServiceResult<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Validation(message.to_string()));
    }
    Ok(trimmed)
}
