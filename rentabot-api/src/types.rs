//! Wire types for the Rent-A-Bot REST API.
//!
//! Resource JSON uses hyphenated field names (the original wire contract);
//! reservation JSON uses underscore names. Timestamps are ISO-8601 UTC.

use chrono::{DateTime, Utc};
use rentabot_core::{QueuedReservation, Reservation, ReservationStatus, Resource, ResourceId};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// ============================================================================
// RESOURCE WIRE TYPES
// ============================================================================

/// A resource as rendered on the wire. `lock-token` is the empty string
/// while the resource is unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceView {
    pub id: u32,
    pub name: String,
    pub description: Option<String>,
    pub endpoint: Option<String>,
    pub tags: String,
    #[serde(rename = "max-lock-duration")]
    pub max_lock_duration: u64,
    #[serde(rename = "lock-token")]
    pub lock_token: String,
    #[serde(rename = "lock-details")]
    pub lock_details: String,
    #[serde(rename = "lock-acquired-at")]
    pub lock_acquired_at: Option<DateTime<Utc>>,
    #[serde(rename = "lock-expires-at")]
    pub lock_expires_at: Option<DateTime<Utc>>,
}

impl From<Resource> for ResourceView {
    fn from(resource: Resource) -> Self {
        let (lock_token, lock_acquired_at, lock_expires_at) = match &resource.lock {
            Some(lock) => (
                lock.token.clone(),
                Some(lock.acquired_at),
                Some(lock.expires_at),
            ),
            None => (String::new(), None, None),
        };
        ResourceView {
            id: resource.id.0,
            name: resource.name,
            description: resource.description,
            endpoint: resource.endpoint,
            tags: resource.tags,
            max_lock_duration: resource.max_lock_duration,
            lock_token,
            lock_details: resource.lock_details,
            lock_acquired_at,
            lock_expires_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourcesListResponse {
    pub resources: Vec<ResourceView>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceResponse {
    pub resource: ResourceView,
}

// ============================================================================
// LOCK WIRE TYPES
// ============================================================================

/// Optional body of a lock request. A missing body means the default TTL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct LockRequest {
    /// Lock TTL in seconds (default 3600)
    pub ttl: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LockResponse {
    pub message: String,
    #[serde(rename = "lock-token")]
    pub lock_token: String,
    pub resource: ResourceView,
    #[serde(rename = "locked-at")]
    pub locked_at: DateTime<Utc>,
    #[serde(rename = "expires-at")]
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ExtendResponse {
    pub message: String,
    #[serde(rename = "new-expires-at")]
    pub new_expires_at: DateTime<Utc>,
    /// Seconds between acquisition and the refreshed deadline.
    #[serde(rename = "total-lock-duration")]
    pub total_lock_duration: i64,
}

/// Query parameters of an unlock request.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UnlockParams {
    #[serde(rename = "lock-token")]
    pub lock_token: Option<String>,
}

/// Query parameters of an extend request.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ExtendParams {
    #[serde(rename = "lock-token")]
    pub lock_token: Option<String>,
    #[serde(rename = "additional-ttl")]
    pub additional_ttl: Option<u64>,
}

// ============================================================================
// RESERVATION WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    /// Required tag set, non-empty
    pub tags: Vec<String>,
    pub quantity: u32,
    /// Seconds the reservation may stay pending (default 3600)
    pub max_wait_time: Option<u64>,
    /// Lock TTL in seconds applied on fulfillment (default 3600)
    pub ttl: Option<u64>,
}

/// A reservation as rendered on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReservationView {
    pub reservation_id: String,
    pub tags: Vec<String>,
    pub quantity: u32,
    pub ttl: u64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub resource_ids: Vec<u32>,
    pub lock_tokens: Vec<String>,
    /// 1-based FIFO rank, present only while pending
    pub position_in_queue: Option<u32>,
}

impl ReservationView {
    pub fn from_reservation(reservation: Reservation, position: Option<u32>) -> Self {
        ReservationView {
            reservation_id: reservation.reservation_id.0,
            tags: reservation.tags,
            quantity: reservation.quantity,
            ttl: reservation.ttl,
            status: reservation.status,
            created_at: reservation.created_at,
            expires_at: reservation.expires_at,
            fulfilled_at: reservation.fulfilled_at,
            claim_expires_at: reservation.claim_expires_at,
            claimed_at: reservation.claimed_at,
            resource_ids: reservation
                .resource_ids
                .iter()
                .map(|ResourceId(id)| *id)
                .collect(),
            lock_tokens: reservation.lock_tokens,
            position_in_queue: position,
        }
    }
}

impl From<QueuedReservation> for ReservationView {
    fn from(queued: QueuedReservation) -> Self {
        ReservationView::from_reservation(queued.reservation, queued.position)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReservationsListResponse {
    pub reservations: Vec<ReservationView>,
}
