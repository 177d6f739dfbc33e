//! Reservation records: deferred batch lock requests on tag-matching
//! resources.

use crate::ResourceId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Seconds a fulfilled reservation stays claimable before the scheduler
/// reclaims its resources.
pub const CLAIM_WINDOW_SECS: i64 = 60;

/// Lock TTL applied to resources locked on behalf of a reservation when the
/// request omits one.
pub const DEFAULT_RESERVATION_TTL: u64 = 3_600;

/// Pending deadline applied when the request omits `max_wait_time`.
pub const DEFAULT_MAX_WAIT_TIME: u64 = 3_600;

/// Opaque reservation identifier with a `res_` prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ReservationId(pub String);

impl ReservationId {
    /// Generate a fresh globally-unique id.
    pub fn generate() -> Self {
        ReservationId(format!("res_{}", Uuid::new_v4().simple()))
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ReservationId {
    fn from(value: &str) -> Self {
        ReservationId(value.to_string())
    }
}

/// Reservation lifecycle state.
///
/// Progression is pending → fulfilled → claimed; expiry and cancellation
/// delete the record instead of parking it in a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Pending,
    Fulfilled,
    Claimed,
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReservationStatus::Pending => write!(f, "pending"),
            ReservationStatus::Fulfilled => write!(f, "fulfilled"),
            ReservationStatus::Claimed => write!(f, "claimed"),
        }
    }
}

/// A queued request for `quantity` resources matching `tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub reservation_id: ReservationId,
    /// Required tag set, non-empty.
    pub tags: Vec<String>,
    pub quantity: u32,
    /// Lock TTL in seconds applied when resources are locked on behalf of
    /// this reservation.
    pub ttl: u64,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    /// Pending deadline: `created_at + max_wait_time`.
    pub expires_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
    /// `fulfilled_at + 60s`; claiming past this point is refused.
    pub claim_expires_at: Option<DateTime<Utc>>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Fulfillment payload, parallel arrays of length `quantity` once
    /// fulfilled.
    pub resource_ids: Vec<ResourceId>,
    pub lock_tokens: Vec<String>,
}

impl Reservation {
    /// Create a fresh pending reservation.
    pub fn new(
        tags: Vec<String>,
        quantity: u32,
        max_wait_time: u64,
        ttl: u64,
        now: DateTime<Utc>,
    ) -> Self {
        Reservation {
            reservation_id: ReservationId::generate(),
            tags,
            quantity,
            ttl,
            status: ReservationStatus::Pending,
            created_at: now,
            expires_at: now + Duration::seconds(max_wait_time as i64),
            fulfilled_at: None,
            claim_expires_at: None,
            claimed_at: None,
            resource_ids: Vec::new(),
            lock_tokens: Vec::new(),
        }
    }

    /// Pending and past its wait deadline.
    pub fn is_pending_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at <= now
    }

    /// Fulfilled and past its claim window.
    pub fn is_claim_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Fulfilled
            && self
                .claim_expires_at
                .is_some_and(|deadline| deadline <= now)
    }
}
