//! Shared application state for Axum routers.

use rentabot_core::Catalog;
use std::sync::Arc;
use std::time::Instant;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        AppState {
            catalog,
            start_time: Instant::now(),
        }
    }
}
