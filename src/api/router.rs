//! Intake API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`. The wizard runs in a browser or another
//! origin, so CORS is open; every request is traced.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the intake API router.
pub fn intake_router(ctx: ApiContext) -> Router {
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/submit-intake", post(endpoints::intake::submit))
        .route("/generate-summary", post(endpoints::summary::generate))
        .route("/generate-summary/stream", post(endpoints::summary::stream))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/api", api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
