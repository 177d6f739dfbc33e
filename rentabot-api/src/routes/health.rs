//! Health check endpoints.
//!
//! Both endpoints answer 200 whenever the process is up: the catalog lives
//! in memory, so there is no dependency that could fail independently.

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: String,
    pub resources: usize,
    pub version: String,
    pub uptime_seconds: u64,
}

/// GET /health - Liveness check
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses((status = 200, description = "Process is alive", body = HealthResponse)),
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /readiness - Readiness check with catalog summary
#[utoipa::path(
    get,
    path = "/readiness",
    tag = "Health",
    responses((status = 200, description = "Service is ready", body = ReadinessResponse)),
)]
pub async fn readiness(State(state): State<AppState>) -> Json<ReadinessResponse> {
    Json(ReadinessResponse {
        status: "ready".to_string(),
        resources: state.catalog.resource_count(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

/// Create the health check router (served un-prefixed).
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/readiness", get(readiness))
}
