use axum::http::StatusCode;
use axum::http::header::{HeaderName, HeaderValue, WWW_AUTHENTICATE};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Header advertising the configured request capacity on 429 responses.
pub const RATE_LIMIT_LIMIT_HEADER: HeaderName = HeaderName::from_static("x-ratelimit-limit");

/// Header advertising the remaining capacity on 429 responses (always `0`).
pub const RATE_LIMIT_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-ratelimit-remaining");

/// Application-wide error types with appropriate HTTP status codes.
///
/// The request-facing variants (`Unauthorized`, `RateLimited`, `NotFound`)
/// are terminal for the request: nothing in the service retries them
/// internally. Malformed JSON and unparseable path segments never get here;
/// axum's extractor rejections answer those directly.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid API key")]
    Unauthorized,

    #[error("Rate limit exceeded ({limit} requests per window)")]
    RateLimited { limit: usize },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            // Expected client-side outcomes are not server failures
            AppError::Unauthorized | AppError::RateLimited { .. } | AppError::NotFound(_) => {
                tracing::debug!(error = %self, "Request rejected");
            }
            AppError::ConfigError(_) => {
                tracing::error!(error = %self, "Request failed");
            }
        }

        let (status, error_type, message) = match &self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Invalid API key".to_string(),
            ),
            AppError::RateLimited { .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limited",
                "Rate limit exceeded".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone()),

            // Never expose configuration details to clients
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.".to_string(),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
        };
        let mut response = (status, axum::Json(body)).into_response();

        match self {
            AppError::Unauthorized => {
                response
                    .headers_mut()
                    .insert(WWW_AUTHENTICATE, HeaderValue::from_static("API-Key"));
            }
            AppError::RateLimited { limit } => {
                let headers = response.headers_mut();
                headers.insert(RATE_LIMIT_LIMIT_HEADER, HeaderValue::from(limit));
                headers.insert(RATE_LIMIT_REMAINING_HEADER, HeaderValue::from_static("0"));
            }
            _ => {}
        }

        response
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
