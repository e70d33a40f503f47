//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub summary_configured: bool,
    pub submissions: i64,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn check(State(ctx): State<ApiContext>) -> Result<Json<HealthResponse>, ApiError> {
    let submissions = crate::db::count_submissions(&*ctx.db()?)?;

    Ok(Json(HealthResponse {
        status: "ok",
        summary_configured: ctx.model.is_some(),
        submissions,
        version: crate::config::APP_VERSION,
    }))
}
