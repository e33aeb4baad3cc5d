//! API error handling
//!
//! Failures render as the operation envelope with `success: false`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ml_core::{Envelope, MediaError};
use tracing::{debug, error, warn};

#[derive(Debug)]
pub enum ApiError {
    Media(MediaError),
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        ApiError::BadRequest(msg.into())
    }

    /// Whether the caller can fix the request
    pub fn is_input_error(&self) -> bool {
        match self {
            ApiError::Media(e) => e.is_input_error(),
            ApiError::BadRequest(_) => true,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Media(e) => StatusCode::from_u16(e.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<MediaError> for ApiError {
    fn from(err: MediaError) -> Self {
        ApiError::Media(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = match &self {
            ApiError::Media(e) => Envelope::<()>::failure(e),
            ApiError::BadRequest(msg) => Envelope {
                success: false,
                status: status.as_u16(),
                message: msg.clone(),
                error: Some("bad_request"),
                data: None,
            },
        };

        if self.is_input_error() {
            debug!(status = status.as_u16(), message = %envelope.message, "Request rejected");
        } else if status.is_server_error() {
            error!(status = status.as_u16(), message = %envelope.message, "Request failed");
        } else {
            warn!(status = status.as_u16(), message = %envelope.message, "Request failed");
        }

        (status, Json(envelope)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
