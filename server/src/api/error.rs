//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::exec::ConnectError;
use crate::gateway::GatewayError;
use crate::models::ErrorResponse;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Container runtime timed out")]
    Timeout,

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Container runtime unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Timeout => (
                StatusCode::GATEWAY_TIMEOUT,
                "RUNTIME_TIMEOUT",
                self.to_string(),
            ),
            ApiError::Runtime(msg) => (StatusCode::BAD_GATEWAY, "RUNTIME_ERROR", msg.clone()),
            ApiError::Unavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "RUNTIME_UNAVAILABLE",
                msg.clone(),
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(ErrorResponse::new(error_code, message));
        (status, body).into_response()
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(msg) => ApiError::NotFound(msg),
            GatewayError::Timeout => ApiError::Timeout,
            GatewayError::Unavailable(msg) => ApiError::Unavailable(msg),
            other @ (GatewayError::Api { .. } | GatewayError::Unsupported(_) | GatewayError::Decode(_)) => {
                ApiError::Runtime(other.to_string())
            }
        }
    }
}

impl From<ConnectError> for ApiError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Timeout(_) => ApiError::Timeout,
            ConnectError::InvalidContainer => ApiError::BadRequest(err.to_string()),
            other => ApiError::Runtime(other.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!(error = %err, "Internal error");
        ApiError::Internal(err.to_string())
    }
}
