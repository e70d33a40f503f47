//! API error types with JSON responses.
//!
//! Summary routes answer `{"error": message}`. The submission route answers
//! `{"success": false, "message": ...}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

pub const INVALID_JSON_MESSAGE: &str = "Invalid JSON payload.";
pub const PROMPT_FAILED_MESSAGE: &str = "Unable to build AI prompt from the provided data.";
pub const NOT_CONFIGURED_MESSAGE: &str =
    "AI summary service is not configured. Please contact support.";
pub const SUBMIT_FAILED_MESSAGE: &str = "Failed to submit assessment";
const GENERATE_FAILED_MESSAGE: &str = "An unexpected error occurred while generating the AI summary.";

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("AI summary service is not configured")]
    NotConfigured,
    /// The summary model failed or returned nothing.
    #[error("Upstream model error: {0}")]
    Upstream(String),
    #[error("Submission failed: {0}")]
    SubmitFailed(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, json!({ "error": detail })),
            ApiError::NotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": NOT_CONFIGURED_MESSAGE }),
            ),
            ApiError::Upstream(detail) => {
                tracing::warn!(detail, "Summary model failed");
                let message = if detail.is_empty() {
                    GENERATE_FAILED_MESSAGE
                } else {
                    detail.as_str()
                };
                (StatusCode::BAD_GATEWAY, json!({ "error": message }))
            }
            ApiError::SubmitFailed(detail) => {
                tracing::error!(detail, "Submission storage failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "success": false, "message": SUBMIT_FAILED_MESSAGE }),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "An internal error occurred" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::llm::LlmError> for ApiError {
    fn from(err: crate::llm::LlmError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}
