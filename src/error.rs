use axum::{
    Json,
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::transport::UpstreamError;

/// Crate-level error for storage and internal failures
#[derive(Debug, Error)]
pub enum StudyError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Redis pool error: {0}")]
    Pool(#[from] deadpool_redis::PoolError),

    #[error("Failed to create Redis pool: {0}")]
    PoolCreation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StudyError>;

/// Error returned by the HTTP handlers. Every variant renders as a JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Request body too large: {0}")]
    PayloadTooLarge(String),

    #[error("Method not allowed: {0}")]
    MethodNotAllowed(Method),

    #[error("Server configuration error: API key is not set")]
    MissingApiKey,

    #[error("OpenAI API error: {0}")]
    Upstream(UpstreamError),

    #[error("OpenAI API error on retry: {0}")]
    UpstreamRetry(UpstreamError),

    #[error("Unexpected error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    error_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<String>,
}

impl ErrorBody {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            method: None,
            message: None,
            error_type: None,
            code: None,
        }
    }

    fn upstream(error: &str, upstream: UpstreamError) -> Self {
        Self {
            error: error.to_string(),
            method: None,
            message: Some(upstream.message),
            error_type: upstream.error_type,
            code: upstream.code,
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::MissingApiKey
            | ApiError::Upstream(_)
            | ApiError::UpstreamRetry(_)
            | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg) => ErrorBody::new(msg),
            ApiError::PayloadTooLarge(msg) => ErrorBody {
                message: Some(msg),
                ..ErrorBody::new("Request body too large")
            },
            ApiError::MethodNotAllowed(method) => ErrorBody {
                method: Some(method.to_string()),
                ..ErrorBody::new("Method not allowed")
            },
            ApiError::MissingApiKey => {
                ErrorBody::new("Server configuration error: API key is not set")
            }
            ApiError::Upstream(e) => ErrorBody::upstream("OpenAI API error", e),
            ApiError::UpstreamRetry(e) => ErrorBody::upstream("OpenAI API error on retry", e),
            ApiError::Internal(msg) => ErrorBody {
                message: Some(msg),
                ..ErrorBody::new("An unexpected error occurred while processing your request")
            },
        };
        (status, Json(body)).into_response()
    }
}
