//! Core error types for MediaLib RS

use thiserror::Error;

use crate::Id;

/// Error type for every media operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    #[error("Not found: {entity} with id={id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Duplicate attachment id: {0}")]
    DuplicateId(Id),

    #[error("Invalid order for slot {slot}: {reason}")]
    InvalidOrder { slot: String, reason: String },

    #[error("Rejected path: {0}")]
    Rejected(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl MediaError {
    pub fn attachment_not_found(id: Id) -> Self {
        MediaError::NotFound {
            entity: "Attachment",
            id: id.to_string(),
        }
    }

    pub fn invalid_order(slot: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        MediaError::InvalidOrder {
            slot: slot.to_string(),
            reason: reason.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        MediaError::StorageFailure(message.into())
    }

    /// Errors caused by the caller's input rather than by the service
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            MediaError::NotFound { .. }
                | MediaError::DuplicateId(_)
                | MediaError::InvalidOrder { .. }
                | MediaError::Rejected(_)
        )
    }
}

/// HTTP status code mapping for errors
impl MediaError {
    pub fn status_code(&self) -> u16 {
        match self {
            // Rejected paths look exactly like missing ones
            MediaError::NotFound { .. } | MediaError::Rejected(_) => 404,
            MediaError::DuplicateId(_) => 409,
            MediaError::InvalidOrder { .. } => 422,
            MediaError::StorageFailure(_) | MediaError::Internal(_) | MediaError::Config(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            MediaError::NotFound { .. } | MediaError::Rejected(_) => "not_found",
            MediaError::DuplicateId(_) => "duplicate_id",
            MediaError::InvalidOrder { .. } => "invalid_order",
            MediaError::StorageFailure(_) => "storage_failure",
            MediaError::Internal(_) => "internal_error",
            MediaError::Config(_) => "configuration_error",
        }
    }
}
