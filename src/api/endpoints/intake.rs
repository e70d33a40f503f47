//! Assessment submission endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::{ApiError, INVALID_JSON_MESSAGE};
use crate::api::types::ApiContext;
use crate::models::{Snapshot, SubmissionRecord};

pub const SUBMIT_OK_MESSAGE: &str = "Assessment submitted successfully";

#[derive(Serialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub message: &'static str,
    pub id: String,
}

/// `POST /api/submit-intake`: store the wizard payload.
pub async fn submit(
    State(ctx): State<ApiContext>,
    payload: Result<Json<serde_json::Value>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected submission body");
        ApiError::BadRequest(INVALID_JSON_MESSAGE.into())
    })?;
    let snapshot: Snapshot = serde_json::from_value(payload)
        .map_err(|_| ApiError::BadRequest(INVALID_JSON_MESSAGE.into()))?;

    let record = SubmissionRecord::from_snapshot(&snapshot)
        .map_err(|e| ApiError::SubmitFailed(e.to_string()))?;
    crate::db::insert_submission(&*ctx.db()?, &record)
        .map_err(|e| ApiError::SubmitFailed(e.to_string()))?;

    tracing::info!(
        id = %record.id,
        pain_points = snapshot.pain_points.len(),
        has_summary = record.ai_summary.is_some(),
        "Assessment stored"
    );

    Ok(Json(SubmitResponse {
        success: true,
        message: SUBMIT_OK_MESSAGE,
        id: record.id.to_string(),
    }))
}
