use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::channel::ChannelError;
use crate::services::cache::CacheError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Maps spec.md §7's error kinds onto HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{code}: {message}")]
    BadRequest { code: &'static str, message: String },
    #[error("not found")]
    NotFound,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("forbidden")]
    Forbidden,
    #[error("not modified")]
    NotModified,
    #[error("service unavailable")]
    ServiceUnavailable,
    /// `301` with the configured landing URL, raised by the health check.
    #[error("moved permanently")]
    MovedPermanently(String),
}

impl AppError {
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::NotModified => return StatusCode::NOT_MODIFIED.into_response(),
            AppError::MovedPermanently(location) => {
                let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
                if let Ok(value) = HeaderValue::from_str(&location) {
                    response.headers_mut().insert(header::LOCATION, value);
                }
                return response;
            }
            _ => {}
        }

        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "not found".into()),
            AppError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                "METHOD_NOT_ALLOWED",
                "method not allowed".into(),
            ),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN", "forbidden".into()),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                "service unavailable".into(),
            ),
            AppError::NotModified | AppError::MovedPermanently(_) => unreachable!(),
        };

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ChannelError> for AppError {
    fn from(e: ChannelError) -> Self {
        match e {
            ChannelError::BadRequest(reason) => AppError::bad_request("BAD_REQUEST", reason),
            ChannelError::NotFound => AppError::NotFound,
            ChannelError::NotModified => AppError::NotModified,
            ChannelError::Unavailable => AppError::ServiceUnavailable,
        }
    }
}

impl From<CacheError> for AppError {
    fn from(_: CacheError) -> Self {
        AppError::ServiceUnavailable
    }
}
