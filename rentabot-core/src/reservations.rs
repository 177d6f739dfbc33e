//! Reservation manager and the fulfillment scheduler's tick bodies.
//!
//! Creation validates against the catalog *shape* (what exists), not the
//! current availability: a request that could never be satisfied is refused
//! up front, while one that merely has to wait enters the FIFO queue.
//! Queue positions are computed on read, never stored.

use crate::{
    is_insufficient, Catalog, EngineResult, Reservation, ReservationError, ReservationId,
    ReservationStatus, ResourceError, CLAIM_WINDOW_SECS,
};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// A reservation together with its computed queue position
/// (1-based, pending only).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedReservation {
    pub reservation: Reservation,
    pub position: Option<u32>,
}

/// Outcome of one fulfillment scheduler tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SchedulerTick {
    pub pending_expired: Vec<ReservationId>,
    pub claims_expired: Vec<ReservationId>,
    pub fulfilled: Vec<ReservationId>,
}

fn queue_positions(
    reservations: &HashMap<ReservationId, Reservation>,
) -> HashMap<ReservationId, u32> {
    let mut pending: Vec<(&ReservationId, DateTime<Utc>)> = reservations
        .iter()
        .filter(|(_, r)| r.status == ReservationStatus::Pending)
        .map(|(id, r)| (id, r.created_at))
        .collect();
    pending.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0 .0.cmp(&b.0 .0)));
    pending
        .into_iter()
        .enumerate()
        .map(|(index, (id, _))| (id.clone(), index as u32 + 1))
        .collect()
}

impl Catalog {
    /// Create a reservation for `quantity` resources matching `tags`.
    ///
    /// Validated against the catalog shape: zero tag matches is `NotFound`,
    /// fewer than `quantity` matches whose `max_lock_duration` accommodates
    /// `ttl` is an `IncompatibleTtl` refusal. Currently-locked matches do
    /// not count against acceptance; the reservation just waits.
    pub fn create_reservation(
        &self,
        tags: Vec<String>,
        quantity: u32,
        max_wait_time: u64,
        ttl: u64,
    ) -> EngineResult<Reservation> {
        let tags: Vec<String> = tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return Err(ReservationError::EmptyTags.into());
        }
        if quantity == 0 {
            return Err(ReservationError::InvalidQuantity.into());
        }

        let matching = self.resources_matching_tags(&tags);
        if matching.is_empty() {
            return Err(ResourceError::not_found_tags(&tags).into());
        }
        let compatible = matching
            .iter()
            .filter(|r| r.max_lock_duration >= ttl)
            .count() as u32;
        if compatible < quantity {
            return Err(ReservationError::IncompatibleTtl {
                needed: quantity,
                found: compatible,
                ttl,
            }
            .into());
        }

        let reservation = Reservation::new(tags, quantity, max_wait_time, ttl, Utc::now());
        self.reservations
            .lock()
            .insert(reservation.reservation_id.clone(), reservation.clone());

        tracing::info!(
            reservation_id = %reservation.reservation_id,
            quantity,
            "Reservation created"
        );
        Ok(reservation)
    }

    /// Fetch a reservation with its computed queue position.
    pub fn get_reservation(&self, id: &ReservationId) -> EngineResult<QueuedReservation> {
        let reservations = self.reservations.lock();
        let reservation = reservations
            .get(id)
            .cloned()
            .ok_or_else(|| ReservationError::NotFound { id: id.clone() })?;
        let position = queue_positions(&reservations).get(id).copied();
        Ok(QueuedReservation {
            reservation,
            position,
        })
    }

    /// All reservations, oldest first, with positions for the pending ones.
    pub fn list_reservations(&self) -> Vec<QueuedReservation> {
        let reservations = self.reservations.lock();
        let positions = queue_positions(&reservations);
        let mut listed: Vec<QueuedReservation> = reservations
            .values()
            .map(|r| QueuedReservation {
                position: positions.get(&r.reservation_id).copied(),
                reservation: r.clone(),
            })
            .collect();
        listed.sort_by(|a, b| {
            a.reservation
                .created_at
                .cmp(&b.reservation.created_at)
                .then_with(|| a.reservation.reservation_id.0.cmp(&b.reservation.reservation_id.0))
        });
        listed
    }

    /// Cancel a pending reservation, deleting its record.
    ///
    /// A fulfilled or claimed reservation has already consumed resources and
    /// must be claim-expired or unlocked by token instead.
    pub fn cancel_reservation(&self, id: &ReservationId) -> EngineResult<()> {
        let mut reservations = self.reservations.lock();
        let reservation = reservations
            .get(id)
            .ok_or_else(|| ReservationError::NotFound { id: id.clone() })?;

        if reservation.status != ReservationStatus::Pending {
            return Err(ReservationError::CannotBeCancelled {
                id: id.clone(),
                status: reservation.status,
            }
            .into());
        }

        reservations.remove(id);
        drop(reservations);
        tracing::info!(reservation_id = %id, "Reservation cancelled");
        Ok(())
    }

    /// Claim a fulfilled reservation, handing its lock tokens to the caller.
    ///
    /// Past the claim window the scheduler may already be releasing the
    /// locks, so a late claim is refused rather than racing it.
    pub fn claim_reservation(&self, id: &ReservationId) -> EngineResult<Reservation> {
        let mut reservations = self.reservations.lock();
        let reservation = reservations
            .get(id)
            .ok_or_else(|| ReservationError::NotFound { id: id.clone() })?;

        match reservation.status {
            ReservationStatus::Pending => {
                return Err(ReservationError::NotFulfilled { id: id.clone() }.into())
            }
            // An already-claimed reservation is gone as far as claiming goes.
            ReservationStatus::Claimed => {
                return Err(ReservationError::NotFound { id: id.clone() }.into())
            }
            ReservationStatus::Fulfilled => {}
        }

        let now = Utc::now();
        if reservation
            .claim_expires_at
            .is_some_and(|deadline| now >= deadline)
        {
            return Err(ReservationError::ClaimExpired { id: id.clone() }.into());
        }

        let mut claimed = reservation.clone();
        claimed.status = ReservationStatus::Claimed;
        claimed.claimed_at = Some(now);
        reservations.insert(id.clone(), claimed.clone());
        drop(reservations);

        tracing::info!(reservation_id = %id, "Reservation claimed");
        Ok(claimed)
    }

    /// Phase A: delete pending reservations whose wait deadline has passed.
    pub fn expire_pending_reservations(&self, now: DateTime<Utc>) -> Vec<ReservationId> {
        let snapshot = self.snapshot_reservations();
        let mut expired = Vec::new();

        for stale in snapshot {
            if !stale.is_pending_expired(now) {
                continue;
            }
            let mut reservations = self.reservations.lock();
            let still_expired = reservations
                .get(&stale.reservation_id)
                .is_some_and(|current| current.is_pending_expired(now));
            if still_expired {
                reservations.remove(&stale.reservation_id);
                drop(reservations);
                tracing::info!(reservation_id = %stale.reservation_id, "Pending reservation expired");
                expired.push(stale.reservation_id);
            }
        }

        expired
    }

    /// Phase B: release and delete fulfilled reservations nobody claimed.
    ///
    /// Locks are released by token outside the reservation mutex; a
    /// `NotFound` there means the caller already unlocked, which is fine.
    pub fn expire_unclaimed_reservations(&self, now: DateTime<Utc>) -> Vec<ReservationId> {
        let snapshot = self.snapshot_reservations();
        let mut expired = Vec::new();

        for stale in snapshot {
            if !stale.is_claim_expired(now) {
                continue;
            }

            for token in &stale.lock_tokens {
                match self.unlock_by_token(token) {
                    Ok(resource_id) => {
                        tracing::info!(
                            reservation_id = %stale.reservation_id,
                            resource_id = %resource_id,
                            "Released lock of unclaimed reservation"
                        );
                    }
                    Err(error) if is_not_found(&error) => {}
                    Err(error) => {
                        tracing::error!(
                            reservation_id = %stale.reservation_id,
                            error = %error,
                            "Failed to release lock of unclaimed reservation"
                        );
                    }
                }
            }

            let mut reservations = self.reservations.lock();
            let still_expired = reservations
                .get(&stale.reservation_id)
                .is_some_and(|current| current.is_claim_expired(now));
            if still_expired {
                reservations.remove(&stale.reservation_id);
                drop(reservations);
                tracing::info!(reservation_id = %stale.reservation_id, "Unclaimed reservation expired");
                expired.push(stale.reservation_id);
            }
        }

        expired
    }

    /// Phase C: fulfill pending reservations in FIFO order.
    ///
    /// A reservation the catalog cannot currently satisfy is skipped rather
    /// than stalling the queue behind it; a later, smaller reservation may
    /// be fulfilled first when only it fits the freed resources.
    pub fn fulfill_pending_reservations(&self, now: DateTime<Utc>) -> Vec<ReservationId> {
        let pending: Vec<Reservation> = self
            .snapshot_reservations()
            .into_iter()
            .filter(|r| r.status == ReservationStatus::Pending)
            .collect();

        let mut fulfilled = Vec::new();
        for reservation in pending {
            if self.try_fulfill(&reservation, now) {
                fulfilled.push(reservation.reservation_id);
            }
        }
        fulfilled
    }

    /// Run all three scheduler phases against one clock reading.
    pub fn run_scheduler_tick(&self, now: DateTime<Utc>) -> SchedulerTick {
        SchedulerTick {
            pending_expired: self.expire_pending_reservations(now),
            claims_expired: self.expire_unclaimed_reservations(now),
            fulfilled: self.fulfill_pending_reservations(now),
        }
    }

    /// Attempt to batch-lock for one pending reservation and commit the
    /// fulfillment payload. Returns whether the reservation was fulfilled.
    ///
    /// The status is re-checked under the reservation mutex after the batch
    /// lock: if the reservation was cancelled in between, the just-acquired
    /// locks are released again instead of leaking until their TTL.
    pub(crate) fn try_fulfill(&self, reservation: &Reservation, now: DateTime<Utc>) -> bool {
        let locked = match self.lock_by_tags(
            &reservation.tags,
            reservation.quantity,
            reservation.ttl,
        ) {
            Ok(locked) => locked,
            Err(error) if is_insufficient(&error) => return false,
            Err(error) => {
                tracing::error!(
                    reservation_id = %reservation.reservation_id,
                    error = %error,
                    "Batch lock failed during fulfillment"
                );
                return false;
            }
        };

        let mut reservations = self.reservations.lock();
        let current = reservations
            .get(&reservation.reservation_id)
            .filter(|current| current.status == ReservationStatus::Pending)
            .cloned();

        let Some(mut updated) = current else {
            drop(reservations);
            for resource in &locked {
                if let Some(lock) = &resource.lock {
                    let _ = self.unlock_by_token(&lock.token);
                }
            }
            tracing::warn!(
                reservation_id = %reservation.reservation_id,
                "Reservation vanished during batch lock, released fresh locks"
            );
            return false;
        };

        updated.status = ReservationStatus::Fulfilled;
        updated.fulfilled_at = Some(now);
        updated.claim_expires_at = Some(now + Duration::seconds(CLAIM_WINDOW_SECS));
        updated.resource_ids = locked.iter().map(|r| r.id).collect();
        updated.lock_tokens = locked
            .iter()
            .filter_map(|r| r.lock.as_ref().map(|lock| lock.token.clone()))
            .collect();
        reservations.insert(updated.reservation_id.clone(), updated);
        drop(reservations);

        tracing::info!(
            reservation_id = %reservation.reservation_id,
            count = locked.len(),
            "Reservation fulfilled"
        );
        true
    }
}

fn is_not_found(error: &crate::EngineError) -> bool {
    matches!(
        error,
        crate::EngineError::Resource(ResourceError::NotFound { .. })
    )
}
