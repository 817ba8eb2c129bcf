//! Errors of the enrichment request path and their HTTP representation.
use crate::gemini::surfaced_status;
use crate::models::ErrorBody;
use crate::normalize::ShapeError;
use axum::Json;
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    #[error("method {0} is not allowed")]
    MethodNotAllowed(Method),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The reason is for the logs only; callers get a generic message.
    #[error("server misconfigured: {0}")]
    Configuration(&'static str),
    #[error("upstream returned status {0}")]
    UpstreamStatus(StatusCode),
    #[error("upstream request failed: {0}")]
    UpstreamTransport(String),
    #[error("upstream did not answer within {0:?}")]
    UpstreamTimeout(Duration),
    #[error("invalid AI response: {0}")]
    InvalidAiResponse(#[from] ShapeError),
}

impl EnrichError {
    pub fn status(&self) -> StatusCode {
        match self {
            EnrichError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            EnrichError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EnrichError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EnrichError::UpstreamStatus(status) => surfaced_status(*status),
            EnrichError::UpstreamTransport(_) => StatusCode::BAD_GATEWAY,
            EnrichError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EnrichError::InvalidAiResponse(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let (error, details) = match self {
            EnrichError::MethodNotAllowed(_) => ("Method Not Allowed", None),
            EnrichError::InvalidInput(reason) => (
                "A \"word\" string is required in the body",
                Some(reason.clone()),
            ),
            EnrichError::Configuration(_) => ("Server configuration error", None),
            EnrichError::UpstreamStatus(status) => (
                "Failed to fetch data from AI service",
                Some(format!("upstream returned status {}", status.as_u16())),
            ),
            EnrichError::UpstreamTransport(_) => (
                "Failed to fetch data from AI service",
                Some("upstream request failed".to_string()),
            ),
            EnrichError::UpstreamTimeout(_) => (
                "Failed to fetch data from AI service",
                Some("upstream did not answer in time".to_string()),
            ),
            EnrichError::InvalidAiResponse(shape) => ("Invalid AI response", Some(shape.to_string())),
        };
        ErrorBody {
            error: error.to_string(),
            details,
        }
    }
}

impl IntoResponse for EnrichError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
