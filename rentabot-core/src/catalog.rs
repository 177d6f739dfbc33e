//! The catalog store: the only mutable shared state in the engine.
//!
//! Two logically independent mutexes serialize access, one per map. Where
//! an operation needs both, the resource mutex is acquired first, or the
//! locks are released between steps and the state re-checked. Records are
//! immutable values replaced wholesale under the mutex, so snapshots taken
//! by readers never observe a half-updated record. Critical sections do no
//! I/O and never block on anything but the mutex itself.

use crate::{
    EngineResult, Reservation, ReservationId, Resource, ResourceError, ResourceId,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;

/// Process-wide state container for resources and reservations.
#[derive(Debug, Default)]
pub struct Catalog {
    pub(crate) resources: Mutex<HashMap<ResourceId, Resource>>,
    pub(crate) reservations: Mutex<HashMap<ReservationId, Reservation>>,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog from descriptor resources.
    pub fn from_resources(resources: Vec<Resource>) -> Self {
        let catalog = Self::new();
        {
            let mut map = catalog.resources.lock();
            for resource in resources {
                map.insert(resource.id, resource);
            }
        }
        catalog
    }

    pub fn resource_count(&self) -> usize {
        self.resources.lock().len()
    }

    /// Clone out every resource, in id order for determinism.
    pub fn snapshot_resources(&self) -> Vec<Resource> {
        let mut resources: Vec<Resource> = self.resources.lock().values().cloned().collect();
        resources.sort_by_key(|r| r.id);
        resources
    }

    /// Clone out every reservation, oldest first.
    pub fn snapshot_reservations(&self) -> Vec<Reservation> {
        let mut reservations: Vec<Reservation> =
            self.reservations.lock().values().cloned().collect();
        reservations.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.reservation_id.0.cmp(&b.reservation_id.0))
        });
        reservations
    }

    /// Look up a resource by id.
    pub fn get_resource(&self, id: ResourceId) -> EngineResult<Resource> {
        self.resources
            .lock()
            .get(&id)
            .cloned()
            .ok_or_else(|| ResourceError::not_found_id(id).into())
    }

    /// Look up a resource by its unique name.
    pub fn get_resource_by_name(&self, name: &str) -> EngineResult<Resource> {
        self.resources
            .lock()
            .values()
            .find(|r| r.name == name)
            .cloned()
            .ok_or_else(|| ResourceError::not_found_name(name).into())
    }

    /// Resources whose tags contain `required`, in id order.
    pub fn resources_matching_tags(&self, required: &[String]) -> Vec<Resource> {
        let mut matching: Vec<Resource> = self
            .resources
            .lock()
            .values()
            .filter(|r| r.matches_tags(required))
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.id);
        matching
    }

    /// One reaper tick: unlock every resource whose lock TTL has elapsed.
    ///
    /// Works from a snapshot, then re-acquires the mutex per candidate and
    /// re-checks token and deadline against the current record, since the
    /// holder may have unlocked or extended in the interim. Returns the ids
    /// that were reclaimed.
    pub fn reap_expired_locks(&self, now: DateTime<Utc>) -> Vec<ResourceId> {
        let snapshot = self.snapshot_resources();
        let mut reaped = Vec::new();

        for stale in snapshot {
            let Some(stale_lock) = stale.lock else {
                continue;
            };
            if !stale_lock.is_expired(now) {
                continue;
            }

            let mut resources = self.resources.lock();
            let Some(current) = resources.get(&stale.id) else {
                continue;
            };
            let still_expired = current
                .lock
                .as_ref()
                .is_some_and(|lock| lock.token == stale_lock.token && lock.is_expired(now));
            if !still_expired {
                continue;
            }

            let mut updated = current.clone();
            updated.lock = None;
            updated.lock_details = format!("Auto-expired at {}", now.to_rfc3339());
            resources.insert(updated.id, updated);
            drop(resources);

            tracing::info!(resource_id = %stale.id, "Lock auto-expired");
            reaped.push(stale.id);
        }

        reaped
    }
}
