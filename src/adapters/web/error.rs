//! HTTP error responses for the web adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{debug, error};

use crate::domain::error::AnalyticsError;

#[derive(Debug)]
pub struct WebError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: &'a str,
}

impl WebError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<AnalyticsError> for WebError {
    fn from(err: AnalyticsError) -> Self {
        Self::new(status_from_error(&err), err.to_string())
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), detail = %self.message, "request failed");
        } else {
            debug!(status = self.status.as_u16(), detail = %self.message, "request rejected");
        }
        let body = ErrorBody {
            error: self.status.canonical_reason().unwrap_or("Error"),
            detail: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

pub fn status_from_error(err: &AnalyticsError) -> StatusCode {
    match err {
        AnalyticsError::InvalidRange { .. } | AnalyticsError::InvalidParameter { .. } => {
            StatusCode::BAD_REQUEST
        }
        AnalyticsError::NotFound { .. } | AnalyticsError::InsufficientData { .. } => {
            StatusCode::NOT_FOUND
        }
        AnalyticsError::DegenerateInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AnalyticsError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AnalyticsError::MalformedSeries { .. }
        | AnalyticsError::Database { .. }
        | AnalyticsError::ConfigParse { .. }
        | AnalyticsError::ConfigMissing { .. }
        | AnalyticsError::ConfigInvalid { .. }
        | AnalyticsError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
