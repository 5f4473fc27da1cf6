//! Error types for Omnibridge
//!
//! HTTP-facing errors and their JSON rendering.

use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::bridge::BridgeError;
use crate::preprocess::PreprocessError;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid media: {0}")]
    InvalidMedia(#[from] PreprocessError),

    #[error("Model service failure: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// Error details
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InvalidMedia(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_MEDIA",
                err.to_string(),
            ),
            AppError::Bridge(err) if err.is_timeout() => (
                StatusCode::GATEWAY_TIMEOUT,
                "MODEL_SERVICE_TIMEOUT",
                err.summary(),
            ),
            AppError::Bridge(err) => (
                StatusCode::BAD_GATEWAY,
                "MODEL_SERVICE_ERROR",
                err.summary(),
            ),
            AppError::Internal(err) => {
                error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
