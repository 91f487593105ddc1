//! Service-level errors.
//!
//! Per-post fetch failures are not errors here: they are carried as data in
//! [`DetailedPost::error`](crate::models::DetailedPost). This enum covers the
//! failures that abort a whole request.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Smallest accepted `count`.
pub const MIN_COUNT: u32 = 1;
/// Largest accepted `count`.
pub const MAX_COUNT: u32 = 500;

#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    #[error("count must be between 1 and 500, got {0}")]
    InvalidCount(i64),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("Parser functionality is disabled")]
    Disabled,

    #[error("browser session failed: {0}")]
    Browser(String),

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("task {0} not found")]
    TaskNotFound(String),

    #[error("{0}")]
    TaskFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ParserError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ParserError::InvalidCount(_) | ParserError::InvalidRequest(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ParserError::Disabled | ParserError::TaskFailed(_) => StatusCode::BAD_REQUEST,
            ParserError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            ParserError::Browser(_) => StatusCode::BAD_GATEWAY,
            ParserError::HttpClient(_) | ParserError::Io(_) | ParserError::Json(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ParserError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

/// Reject a `count` outside `MIN_COUNT..=MAX_COUNT` before any work starts.
///
/// Takes a signed value so that negative counts from a query string or a JSON
/// body get the same error as zero or 501.
pub fn validate_count(count: i64) -> Result<u32, ParserError> {
    match u32::try_from(count) {
        Ok(valid) if (MIN_COUNT..=MAX_COUNT).contains(&valid) => Ok(valid),
        _ => Err(ParserError::InvalidCount(count)),
    }
}

impl From<QueryRejection> for ParserError {
    fn from(rejection: QueryRejection) -> Self {
        ParserError::InvalidRequest(rejection.body_text())
    }
}

impl From<JsonRejection> for ParserError {
    fn from(rejection: JsonRejection) -> Self {
        ParserError::InvalidRequest(rejection.body_text())
    }
}
