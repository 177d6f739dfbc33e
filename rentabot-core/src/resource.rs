//! Resource records and tag matching.
//!
//! A [`Resource`] is a named, lockable external object whose identity is
//! fixed at catalog load. Lock state is a single `Option<LockState>` so a
//! token can never exist without its timestamps. Records are value types:
//! the catalog replaces them wholesale on every mutation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Upper bound on a single lock's lifetime when the descriptor does not
/// override it (24 hours).
pub const DEFAULT_MAX_LOCK_DURATION: u64 = 86_400;

/// Lock TTL applied when a lock request does not specify one.
pub const DEFAULT_LOCK_TTL: u64 = 3_600;

/// Stable dense identifier assigned from descriptor file order, starting at 1.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(transparent)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        ResourceId(value)
    }
}

/// Lock state of a held resource. Absent on an unlocked resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    /// Opaque token authorizing unlock/extend. UUID v4, compared by equality.
    pub token: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockState {
    /// Check whether the lock has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// A lockable catalog resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    /// Unique non-empty name from the descriptor.
    pub name: String,
    pub description: Option<String>,
    /// Opaque to the engine (e.g. an IP address or serial port).
    pub endpoint: Option<String>,
    /// Comma-separated tag declaration, parsed on read.
    pub tags: String,
    /// Upper bound in seconds on any single lock's lifetime.
    pub max_lock_duration: u64,
    /// Human-readable status line, always present.
    pub lock_details: String,
    /// Present iff the resource is locked.
    pub lock: Option<LockState>,
}

impl Resource {
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Resource {
            id,
            name: name.into(),
            description: None,
            endpoint: None,
            tags: String::new(),
            max_lock_duration: DEFAULT_MAX_LOCK_DURATION,
            lock_details: "Resource available".to_string(),
            lock: None,
        }
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn with_max_lock_duration(mut self, seconds: u64) -> Self {
        self.max_lock_duration = seconds;
        self
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    /// Parse the comma-separated tag declaration into a set.
    ///
    /// Splits on commas, trims whitespace, drops empty fragments.
    pub fn parsed_tags(&self) -> HashSet<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    /// Set-containment tag match: every required tag must be declared.
    ///
    /// An empty tag declaration matches no non-empty requirement.
    pub fn matches_tags(&self, required: &[String]) -> bool {
        let declared = self.parsed_tags();
        required.iter().all(|t| declared.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use proptest::prelude::*;

    fn tagged(tags: &str) -> Resource {
        Resource::new(ResourceId(1), "rig").with_tags(tags)
    }

    fn strings(tags: &[&str]) -> Vec<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn parses_comma_separated_tags_with_whitespace() {
        let resource = tagged(" arduino , leds ,, motors ");
        let tags = resource.parsed_tags();
        assert_eq!(tags.len(), 3);
        assert!(tags.contains("arduino"));
        assert!(tags.contains("leds"));
        assert!(tags.contains("motors"));
    }

    #[test]
    fn empty_declaration_matches_nothing() {
        let resource = tagged("");
        assert!(resource.parsed_tags().is_empty());
        assert!(!resource.matches_tags(&strings(&["arduino"])));
    }

    #[test]
    fn containment_requires_every_tag() {
        let resource = tagged("arduino,leds");
        assert!(resource.matches_tags(&strings(&["arduino"])));
        assert!(resource.matches_tags(&strings(&["arduino", "leds"])));
        assert!(!resource.matches_tags(&strings(&["arduino", "motors"])));
    }

    #[test]
    fn lock_state_expiry() {
        let now = Utc::now();
        let lock = LockState {
            token: "t".to_string(),
            acquired_at: now,
            expires_at: now + Duration::seconds(60),
        };
        assert!(!lock.is_expired(now));
        assert!(lock.is_expired(now + Duration::seconds(60)));
        assert!(lock.is_expired(now + Duration::seconds(90)));
    }

    proptest! {
        // Any subset of the declared tags must match.
        #[test]
        fn subsets_of_declared_tags_always_match(
            declared in proptest::collection::hash_set("[a-z]{1,8}", 1..6),
            selector in any::<prop::sample::Index>(),
        ) {
            let declared: Vec<String> = declared.into_iter().collect();
            let resource = tagged(&declared.join(","));
            let take = selector.index(declared.len() + 1);
            let required: Vec<String> = declared.iter().take(take).cloned().collect();
            prop_assert!(resource.matches_tags(&required));
        }

        // A tag that is not declared must never match.
        #[test]
        fn undeclared_tag_never_matches(
            declared in proptest::collection::hash_set("[a-z]{1,8}", 0..6),
            foreign in "[0-9]{1,8}",
        ) {
            let declared: Vec<String> = declared.into_iter().collect();
            let resource = tagged(&declared.join(","));
            prop_assert!(!resource.matches_tags(&[foreign]));
        }
    }
}
