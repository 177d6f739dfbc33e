//! Lock manager and batch locker.
//!
//! Every operation here is a single critical section on the resource mutex,
//! so lock/unlock/extend on the same resource are totally ordered. Tokens
//! are UUID v4, issued fresh per lock and compared only for equality.

use crate::{
    Catalog, EngineError, EngineResult, LockState, Resource, ResourceError, ResourceId,
};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

fn fresh_token() -> String {
    Uuid::new_v4().to_string()
}

fn locked_copy(resource: &Resource, token: &str, now: DateTime<Utc>, ttl: u64) -> Resource {
    let mut updated = resource.clone();
    updated.lock = Some(LockState {
        token: token.to_string(),
        acquired_at: now,
        expires_at: now + Duration::seconds(ttl as i64),
    });
    updated.lock_details = "Resource locked".to_string();
    updated
}

fn unlocked_copy(resource: &Resource) -> Resource {
    let mut updated = resource.clone();
    updated.lock = None;
    updated.lock_details = "Resource available".to_string();
    updated
}

impl Catalog {
    /// Lock a resource by id for `ttl` seconds.
    ///
    /// Returns the fresh token together with the updated record.
    pub fn lock(&self, id: ResourceId, ttl: u64) -> EngineResult<(String, Resource)> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get(&id)
            .ok_or_else(|| ResourceError::not_found_id(id))?;

        if resource.is_locked() {
            return Err(ResourceError::already_locked_id(id).into());
        }
        if ttl > resource.max_lock_duration {
            return Err(ResourceError::InvalidTtl {
                id,
                requested: ttl,
                max: resource.max_lock_duration,
            }
            .into());
        }

        let token = fresh_token();
        let updated = locked_copy(resource, &token, Utc::now(), ttl);
        resources.insert(id, updated.clone());
        drop(resources);

        tracing::info!(resource_id = %id, ttl_secs = ttl, "Resource locked");
        Ok((token, updated))
    }

    /// Lock a resource by its unique name.
    pub fn lock_by_name(&self, name: &str, ttl: u64) -> EngineResult<(String, Resource)> {
        let id = self.get_resource_by_name(name)?.id;
        self.lock(id, ttl)
    }

    /// Lock the first unlocked resource (in id order) whose tags contain
    /// `tags`.
    ///
    /// No tag match at all is `NotFound`; matches that are all currently
    /// held is `AlreadyLocked`.
    pub fn lock_first_available(
        &self,
        tags: &[String],
        ttl: u64,
    ) -> EngineResult<(String, Resource)> {
        let mut resources = self.resources.lock();

        let mut matching: Vec<&Resource> =
            resources.values().filter(|r| r.matches_tags(tags)).collect();
        if matching.is_empty() {
            return Err(ResourceError::not_found_tags(tags).into());
        }
        matching.sort_by_key(|r| r.id);

        let candidate = matching
            .into_iter()
            .find(|r| !r.is_locked())
            .cloned()
            .ok_or_else(|| ResourceError::already_locked_tags(tags))?;

        if ttl > candidate.max_lock_duration {
            return Err(ResourceError::InvalidTtl {
                id: candidate.id,
                requested: ttl,
                max: candidate.max_lock_duration,
            }
            .into());
        }

        let token = fresh_token();
        let updated = locked_copy(&candidate, &token, Utc::now(), ttl);
        resources.insert(updated.id, updated.clone());
        drop(resources);

        tracing::info!(resource_id = %updated.id, ?tags, "Resource locked by tags");
        Ok((token, updated))
    }

    /// Unlock a resource, authorized solely by token equality.
    pub fn unlock(&self, id: ResourceId, token: &str) -> EngineResult<()> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get(&id)
            .ok_or_else(|| ResourceError::not_found_id(id))?;

        let Some(lock) = &resource.lock else {
            return Err(ResourceError::AlreadyUnlocked { id }.into());
        };
        if lock.token != token {
            return Err(ResourceError::InvalidLockToken { id }.into());
        }

        let updated = unlocked_copy(resource);
        resources.insert(id, updated);
        drop(resources);

        tracing::info!(resource_id = %id, "Resource unlocked");
        Ok(())
    }

    /// Refresh a lock's deadline to `now + additional_ttl`.
    ///
    /// This is an absolute refresh, not an addition to the previous deadline,
    /// so it can shorten the lock. The refreshed deadline may not put the
    /// total lifetime past `max_lock_duration` from acquisition.
    pub fn extend(
        &self,
        id: ResourceId,
        token: &str,
        additional_ttl: u64,
    ) -> EngineResult<Resource> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get(&id)
            .ok_or_else(|| ResourceError::not_found_id(id))?;

        let Some(lock) = &resource.lock else {
            return Err(ResourceError::AlreadyUnlocked { id }.into());
        };
        if lock.token != token {
            return Err(ResourceError::InvalidLockToken { id }.into());
        }

        let now = Utc::now();
        let new_expires_at = now + Duration::seconds(additional_ttl as i64);
        let total = (new_expires_at - lock.acquired_at).num_seconds();
        if total < 0 || total as u64 > resource.max_lock_duration {
            return Err(ResourceError::InvalidTtl {
                id,
                requested: additional_ttl,
                max: resource.max_lock_duration,
            }
            .into());
        }

        let mut updated = resource.clone();
        if let Some(lock) = updated.lock.as_mut() {
            lock.expires_at = new_expires_at;
        }
        resources.insert(id, updated.clone());
        drop(resources);

        tracing::info!(resource_id = %id, additional_ttl_secs = additional_ttl, "Lock extended");
        Ok(updated)
    }

    /// Release whichever resource currently carries `token`.
    ///
    /// Used by the fulfillment scheduler to reclaim locks it handed out.
    /// `NotFound` here is normal: the holder may already have unlocked.
    pub fn unlock_by_token(&self, token: &str) -> EngineResult<ResourceId> {
        let mut resources = self.resources.lock();
        let held = resources
            .values()
            .find(|r| r.lock.as_ref().is_some_and(|lock| lock.token == token))
            .cloned();

        let Some(resource) = held else {
            return Err(ResourceError::NotFound {
                selector: "lock token".to_string(),
            }
            .into());
        };

        let id = resource.id;
        resources.insert(id, unlocked_copy(&resource));
        drop(resources);

        tracing::debug!(resource_id = %id, "Resource unlocked by token");
        Ok(id)
    }

    /// Atomically lock `quantity` unlocked resources whose tags contain
    /// `tags`. Either all of them become locked as a group, or none do.
    pub fn lock_by_tags(
        &self,
        tags: &[String],
        quantity: u32,
        ttl: u64,
    ) -> EngineResult<Vec<Resource>> {
        let mut resources = self.resources.lock();

        let mut available: Vec<Resource> = resources
            .values()
            .filter(|r| !r.is_locked() && r.matches_tags(tags))
            .cloned()
            .collect();
        available.sort_by_key(|r| r.id);

        if (available.len() as u32) < quantity {
            return Err(ResourceError::Insufficient {
                tags: tags.to_vec(),
                needed: quantity,
                available: available.len() as u32,
            }
            .into());
        }

        let chosen: Vec<Resource> = available.into_iter().take(quantity as usize).collect();

        // TTL-validate the whole group before any mutation.
        for resource in &chosen {
            if ttl > resource.max_lock_duration {
                return Err(ResourceError::InvalidTtl {
                    id: resource.id,
                    requested: ttl,
                    max: resource.max_lock_duration,
                }
                .into());
            }
        }

        let now = Utc::now();
        let mut locked = Vec::with_capacity(chosen.len());
        for resource in &chosen {
            let updated = locked_copy(resource, &fresh_token(), now, ttl);
            resources.insert(updated.id, updated.clone());
            locked.push(updated);
        }
        drop(resources);

        tracing::info!(count = locked.len(), ?tags, "Batch lock acquired");
        Ok(locked)
    }
}

/// True when the error is the batch locker reporting a shortfall, which the
/// fulfillment scheduler treats as "skip and try the next reservation".
pub fn is_insufficient(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::Resource(ResourceError::Insufficient { .. })
    )
}
