//! Reservation REST routes: create, inspect, claim and cancel.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
    types::{CreateReservationRequest, ReservationView, ReservationsListResponse},
};
use rentabot_core::{ReservationId, DEFAULT_MAX_WAIT_TIME, DEFAULT_RESERVATION_TTL};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/reservations - Create a reservation
#[utoipa::path(
    post,
    path = "/api/v1/reservations",
    tag = "Reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Reservation accepted and queued", body = ReservationView),
        (status = 400, description = "Empty tags, zero quantity or incompatible TTL", body = ApiError),
        (status = 404, description = "No resource matches the tags", body = ApiError),
    ),
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<ReservationView>)> {
    let reservation = state.catalog.create_reservation(
        request.tags,
        request.quantity,
        request.max_wait_time.unwrap_or(DEFAULT_MAX_WAIT_TIME),
        request.ttl.unwrap_or(DEFAULT_RESERVATION_TTL),
    )?;

    let position = state
        .catalog
        .get_reservation(&reservation.reservation_id)
        .map(|queued| queued.position)
        .unwrap_or(None);

    Ok((
        StatusCode::CREATED,
        Json(ReservationView::from_reservation(reservation, position)),
    ))
}

/// GET /api/v1/reservations - List all reservations
#[utoipa::path(
    get,
    path = "/api/v1/reservations",
    tag = "Reservations",
    responses(
        (status = 200, description = "All reservations, oldest first", body = ReservationsListResponse),
    ),
)]
pub async fn list_reservations(State(state): State<AppState>) -> Json<ReservationsListResponse> {
    let reservations = state
        .catalog
        .list_reservations()
        .into_iter()
        .map(Into::into)
        .collect();
    Json(ReservationsListResponse { reservations })
}

/// GET /api/v1/reservations/{id} - Get one reservation
#[utoipa::path(
    get,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation details with queue position", body = ReservationView),
        (status = 404, description = "Reservation not found", body = ApiError),
    ),
)]
pub async fn get_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReservationView>> {
    let queued = state.catalog.get_reservation(&ReservationId(id))?;
    Ok(Json(queued.into()))
}

/// POST /api/v1/reservations/{id}/claim - Claim a fulfilled reservation
#[utoipa::path(
    post,
    path = "/api/v1/reservations/{id}/claim",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation id")),
    responses(
        (status = 200, description = "Reservation claimed, tokens handed over", body = ReservationView),
        (status = 404, description = "Unknown or already claimed reservation", body = ApiError),
        (status = 409, description = "Reservation is still pending", body = ApiError),
        (status = 410, description = "Claim window has expired", body = ApiError),
    ),
)]
pub async fn claim_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReservationView>> {
    let claimed = state.catalog.claim_reservation(&ReservationId(id))?;
    Ok(Json(ReservationView::from_reservation(claimed, None)))
}

/// DELETE /api/v1/reservations/{id} - Cancel a pending reservation
#[utoipa::path(
    delete,
    path = "/api/v1/reservations/{id}",
    tag = "Reservations",
    params(("id" = String, Path, description = "Reservation id")),
    responses(
        (status = 204, description = "Reservation cancelled"),
        (status = 404, description = "Reservation not found", body = ApiError),
        (status = 409, description = "Reservation already consumed resources", body = ApiError),
    ),
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.catalog.cancel_reservation(&ReservationId(id))?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the reservation routes router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_reservation).get(list_reservations))
        .route("/:id", get(get_reservation).delete(cancel_reservation))
        .route("/:id/claim", post(claim_reservation))
}
