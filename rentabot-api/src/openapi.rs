//! OpenAPI specification for the Rent-A-Bot API.
//!
//! The document is generated with utoipa from the route annotations and
//! wire types, and served at `GET /api-docs/openapi.json`.

use axum::Json;
use utoipa::OpenApi;

use crate::error::{ApiError, ErrorCode};
use crate::routes::{health, reservations, resources};
use crate::types::{
    CreateReservationRequest, ExtendResponse, LockRequest, LockResponse, MessageResponse,
    ReservationView, ReservationsListResponse, ResourceResponse, ResourceView,
    ResourcesListResponse,
};
use rentabot_core::ReservationStatus;

/// OpenAPI document for the Rent-A-Bot API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rent-A-Bot",
        version = "0.2.0",
        description = "Your automation resource provider: exclusive, time-bounded access to a catalog of named resources, with asynchronous tag-based reservations.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT"),
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development")
    ),
    tags(
        (name = "Resources", description = "Catalog inspection and the lock lifecycle"),
        (name = "Reservations", description = "Deferred batch locks on tag-matching resources"),
        (name = "Health", description = "Liveness and readiness probes"),
    ),
    paths(
        resources::list_resources,
        resources::get_resource,
        resources::lock_resource,
        resources::unlock_resource,
        resources::extend_lock,
        resources::lock_by_criteria,
        reservations::create_reservation,
        reservations::list_reservations,
        reservations::get_reservation,
        reservations::claim_reservation,
        reservations::cancel_reservation,
        health::health,
        health::readiness,
    ),
    components(schemas(
        ResourceView,
        ResourcesListResponse,
        ResourceResponse,
        LockRequest,
        LockResponse,
        MessageResponse,
        ExtendResponse,
        CreateReservationRequest,
        ReservationView,
        ReservationsListResponse,
        ReservationStatus,
        ApiError,
        ErrorCode,
        health::HealthResponse,
        health::ReadinessResponse,
    ))
)]
pub struct ApiDoc;

/// GET /api-docs/openapi.json - Serve the OpenAPI document
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
