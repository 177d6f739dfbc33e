//! Error types for Rent-A-Bot engine operations

use crate::{ReservationId, ReservationStatus, ResourceId};
use thiserror::Error;

/// Resource / lock manager errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResourceError {
    #[error("Resource not found: {selector}")]
    NotFound { selector: String },

    #[error("Resource already locked: {selector}")]
    AlreadyLocked { selector: String },

    #[error("Resource {id} is already unlocked")]
    AlreadyUnlocked { id: ResourceId },

    #[error("Invalid lock token for resource {id}")]
    InvalidLockToken { id: ResourceId },

    #[error("Requested TTL {requested}s would exceed max_lock_duration {max}s for resource {id}")]
    InvalidTtl {
        id: ResourceId,
        requested: u64,
        max: u64,
    },

    #[error("Not enough resources: need {needed} matching {tags:?}, found {available} available")]
    Insufficient {
        tags: Vec<String>,
        needed: u32,
        available: u32,
    },
}

impl ResourceError {
    /// NotFound for an id lookup.
    pub fn not_found_id(id: ResourceId) -> Self {
        ResourceError::NotFound {
            selector: format!("id {}", id),
        }
    }

    /// NotFound for a name lookup.
    pub fn not_found_name(name: &str) -> Self {
        ResourceError::NotFound {
            selector: format!("name {}", name),
        }
    }

    /// NotFound for a tag query that matched nothing.
    pub fn not_found_tags(tags: &[String]) -> Self {
        ResourceError::NotFound {
            selector: format!("tags {:?}", tags),
        }
    }

    /// AlreadyLocked for a direct id lock.
    pub fn already_locked_id(id: ResourceId) -> Self {
        ResourceError::AlreadyLocked {
            selector: format!("id {}", id),
        }
    }

    /// AlreadyLocked when every tag match is currently held.
    pub fn already_locked_tags(tags: &[String]) -> Self {
        ResourceError::AlreadyLocked {
            selector: format!("tags {:?}", tags),
        }
    }
}

/// Reservation manager errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReservationError {
    #[error("Reservation tags must not be empty")]
    EmptyTags,

    #[error("Reservation quantity must be at least 1")]
    InvalidQuantity,

    #[error("Need {needed} compatible resources, found {found} (ttl {ttl}s exceeds max_lock_duration on the rest)")]
    IncompatibleTtl { needed: u32, found: u32, ttl: u64 },

    #[error("Reservation not found: {id}")]
    NotFound { id: ReservationId },

    #[error("Reservation {id} is not fulfilled yet")]
    NotFulfilled { id: ReservationId },

    #[error("Claim window for reservation {id} has expired")]
    ClaimExpired { id: ReservationId },

    #[error("Cannot cancel {status} reservation {id}")]
    CannotBeCancelled {
        id: ReservationId,
        status: ReservationStatus,
    },
}

/// Descriptor loading errors.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("Failed to read resource descriptor {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse resource descriptor {path}: {source}")]
    Yaml {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("Resource descriptor is empty: {path}")]
    Empty { path: String },

    #[error("Invalid resource descriptor {path}: {reason}")]
    Invalid { path: String, reason: String },
}

/// Master error type for engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// Result type alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
