//! Error handling for the PTZ tracking engine

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera (or other resource) not registered
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the current camera state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Device unreachable or handshake timed out (retryable)
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Device rejected the credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Malformed or unexpected device response
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Missing or corrupt calibration record
    #[error("Calibration error: {0}")]
    Calibration(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<crate::ptz_transport::TransportError> for Error {
    fn from(e: crate::ptz_transport::TransportError) -> Self {
        use crate::ptz_transport::TransportError;
        match e {
            TransportError::Connectivity(msg) => Error::Connectivity(msg),
            TransportError::Authorization(msg) => Error::Unauthorized(msg),
            TransportError::Protocol(msg) => Error::Protocol(msg),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            Error::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            Error::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            Error::Connectivity(msg) => (
                StatusCode::BAD_GATEWAY,
                "CONNECTIVITY_ERROR",
                msg.clone(),
            ),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            Error::Protocol(msg) => (StatusCode::BAD_GATEWAY, "PROTOCOL_ERROR", msg.clone()),
            Error::Calibration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CALIBRATION_ERROR",
                msg.clone(),
            ),
            Error::Config(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CONFIG_ERROR",
                msg.clone(),
            ),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
