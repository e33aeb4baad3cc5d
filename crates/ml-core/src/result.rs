//! Result type aliases and the operation envelope
//!
//! Every mutating operation answers with the same envelope shape, either a
//! success carrying a localized message and optional payload, or a failure
//! carrying a status code and the error detail.

use serde::Serialize;

use crate::error::MediaError;

/// Standard Result type for media operations
pub type MediaResult<T> = Result<T, MediaError>;

/// Uniform response envelope for mutating operations
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Envelope<T: Serialize> {
    /// Whether the operation succeeded
    pub success: bool,
    /// HTTP-style status code
    pub status: u16,
    /// Localized confirmation or error message
    pub message: String,
    /// Stable error identifier (failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    /// Operation-specific payload (successes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    /// Create a successful envelope with a payload
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            status: 200,
            message: message.into(),
            error: None,
            data: Some(data),
        }
    }

    /// Create a failed envelope from an error
    pub fn failure(error: &MediaError) -> Self {
        Self {
            success: false,
            status: error.status_code(),
            message: error.to_string(),
            error: Some(error.error_code()),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Override the status code, e.g. 201 for a created resource
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl Envelope<()> {
    /// Create a successful envelope with no payload
    pub fn success_empty(message: impl Into<String>) -> Self {
        Self {
            success: true,
            status: 200,
            message: message.into(),
            error: None,
            data: None,
        }
    }
}
