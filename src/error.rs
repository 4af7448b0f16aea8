//! Common error types for the image proxy gateway

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Conversation not found")]
    ConversationNotFound,

    #[error("Upstream resource exhausted: {message}")]
    ResourceExhausted {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("Model returned no content")]
    EmptyOutput,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// HTTP-equivalent status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Json(_) | AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::ConversationNotFound => StatusCode::NOT_FOUND,
            AppError::ResourceExhausted { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::HttpClient(_) | AppError::EmptyOutput | AppError::Upstream(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }

    /// Stable machine-readable code reported to clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Config(_) | AppError::Io(_) | AppError::Internal(_) => "INTERNAL",
            AppError::Json(_) | AppError::InvalidRequest(_) => "INVALID_ARGUMENT",
            AppError::AuthenticationRequired(_) => "UNAUTHENTICATED",
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::ConversationNotFound => "NOT_FOUND",
            AppError::ResourceExhausted { .. } => "RESOURCE_EXHAUSTED",
            AppError::HttpClient(_) | AppError::EmptyOutput | AppError::Upstream(_) => {
                "UPSTREAM_ERROR"
            }
        }
    }
}

/// Error body returned to clients: a stable triple, independent of which
/// internal variant produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status_code: u16,
    pub error_code: String,
    pub message: String,
}

impl From<&AppError> for ErrorBody {
    fn from(err: &AppError) -> Self {
        Self {
            status_code: err.status_code().as_u16(),
            error_code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(ErrorBody::from(&self));

        let mut response = (status, body).into_response();
        if let AppError::ResourceExhausted {
            retry_after: Some(after),
            ..
        } = &self
        {
            let secs = after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
