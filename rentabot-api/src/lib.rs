//! Rent-A-Bot API - REST layer over the resource locking engine.
//!
//! Exposes the catalog, the lock lifecycle and the reservation queue as
//! JSON over HTTP (Axum). Handlers are thin translators: every state
//! decision is made by `rentabot-core`, this crate maps requests to engine
//! operations and engine errors to HTTP statuses.
//!
//! The API is served under `/api/v1` and, for older clients, under the
//! legacy `/rentabot/api/v1.0` prefix (deprecation header, or a 307
//! redirect when `RENTABOT_LEGACY_REDIRECT` is set).

pub mod config;
pub mod error;
pub mod jobs;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod types;

// Re-export commonly used types
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

use axum::{middleware::from_fn, routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assemble the full application router.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let api = Router::new()
        .nest("/resources", routes::resources::create_router())
        .nest("/reservations", routes::reservations::create_router());

    let legacy = if config.legacy_redirect {
        Router::new().fallback(middleware::legacy_redirect)
    } else {
        api.clone().layer(from_fn(middleware::legacy_deprecation))
    };

    Router::new()
        .nest(middleware::PRIMARY_PREFIX, api)
        .nest(middleware::LEGACY_PREFIX, legacy)
        .merge(routes::health::create_router())
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
