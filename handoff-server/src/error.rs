//! Server error types

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use handoff_core::SessionError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur starting or running the handoff server
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the specified address
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Body returned by every callback and registration endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CallbackResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// A request failure rendered as `{success: false, error}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let (status, message) = match err {
            SessionError::NotFound(_) => (StatusCode::NOT_FOUND, "Invalid session".to_string()),
            SessionError::AlreadyExists(_) => {
                (StatusCode::CONFLICT, "Session already exists".to_string())
            }
            SessionError::InvalidId(_) => {
                (StatusCode::BAD_REQUEST, "Invalid session id".to_string())
            }
            SessionError::InvalidDestination(_) => {
                (StatusCode::BAD_REQUEST, "Invalid destination".to_string())
            }
            SessionError::ConsentRequired(_) => {
                (StatusCode::FORBIDDEN, "Consent required".to_string())
            }
            SessionError::AlreadyUsed(_) => {
                (StatusCode::CONFLICT, "Session already used".to_string())
            }
            SessionError::Withdrawn(_) => (StatusCode::CONFLICT, "Session withdrawn".to_string()),
            SessionError::MalformedPayload(reason) => (StatusCode::BAD_REQUEST, reason),
        };
        Self { status, message }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(CallbackResponse::failed(self.message))).into_response()
    }
}
