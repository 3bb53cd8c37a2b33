use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

/// Failures on the market-data path. None of them stop a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("upstream returned status {0}")]
    Status(u16),
    #[error("malformed candle: {0}")]
    MalformedCandle(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.clone()),
        };

        let body = Json(ErrorResponse { message });
        (status, body).into_response()
    }
}
