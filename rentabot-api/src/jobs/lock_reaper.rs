//! Lock expiration reaper background task.
//!
//! Periodically unlocks resources whose lock TTL has elapsed. Nominal
//! expiry can therefore be observed up to one check interval late; that
//! skew is the system's contract, not a bug.

use rentabot_core::Catalog;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Default seconds between reaper checks.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 10;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the lock reaper background task.
#[derive(Debug, Clone)]
pub struct LockReaperConfig {
    /// How often to scan for expired locks (default: 10 seconds)
    pub check_interval: Duration,
}

impl Default for LockReaperConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_REAPER_INTERVAL_SECS),
        }
    }
}

impl LockReaperConfig {
    /// Create LockReaperConfig from environment variables.
    ///
    /// Environment variables:
    /// - `RENTABOT_REAPER_INTERVAL_SECS`: check cadence (default: 10)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_secs(
            std::env::var("RENTABOT_REAPER_INTERVAL_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_REAPER_INTERVAL_SECS),
        );
        Self { check_interval }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters tracking reaper activity since startup.
#[derive(Debug, Default)]
pub struct LockReaperMetrics {
    /// Total locks reclaimed after TTL expiry
    pub locks_reaped: AtomicU64,

    /// Total reap cycles completed
    pub reap_cycles: AtomicU64,
}

impl LockReaperMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> LockReaperSnapshot {
        LockReaperSnapshot {
            locks_reaped: self.locks_reaped.load(Ordering::Relaxed),
            reap_cycles: self.reap_cycles.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the reaper counters.
#[derive(Debug, Clone)]
pub struct LockReaperSnapshot {
    pub locks_reaped: u64,
    pub reap_cycles: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that periodically reclaims expired locks.
///
/// Runs until the shutdown signal flips to `true`. Each tick snapshots the
/// catalog and re-checks every candidate under the resource mutex, so a
/// holder unlocking or extending concurrently is never raced.
pub async fn lock_reaper_task(
    catalog: Arc<Catalog>,
    config: LockReaperConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<LockReaperMetrics> {
    let metrics = Arc::new(LockReaperMetrics::new());

    let mut check_interval = interval(config.check_interval);
    check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = config.check_interval.as_secs(),
        "Lock reaper task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Lock reaper task shutting down");
                    break;
                }
            }

            _ = check_interval.tick() => {
                metrics.reap_cycles.fetch_add(1, Ordering::Relaxed);
                let reaped = catalog.reap_expired_locks(chrono::Utc::now());
                if !reaped.is_empty() {
                    metrics.locks_reaped.fetch_add(reaped.len() as u64, Ordering::Relaxed);
                    tracing::info!(count = reaped.len(), "Reap cycle reclaimed expired locks");
                } else {
                    tracing::trace!("Reap cycle found no expired locks");
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        locks_reaped = snapshot.locks_reaped,
        reap_cycles = snapshot.reap_cycles,
        "Lock reaper task completed"
    );

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration as ChronoDuration, Utc};
    use rentabot_core::{LockState, Resource, ResourceId};

    #[tokio::test]
    async fn reaper_task_reclaims_expired_locks_and_shuts_down() {
        let mut resource = Resource::new(ResourceId(1), "rig");
        resource.lock = Some(LockState {
            token: "stale".to_string(),
            acquired_at: Utc::now() - ChronoDuration::seconds(120),
            expires_at: Utc::now() - ChronoDuration::seconds(60),
        });
        let catalog = Arc::new(Catalog::from_resources(vec![resource]));

        let config = LockReaperConfig {
            check_interval: Duration::from_millis(20),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(lock_reaper_task(catalog.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).expect("send shutdown");
        let metrics = handle.await.expect("task join");

        assert!(!catalog.get_resource(ResourceId(1)).unwrap().is_locked());
        assert_eq!(metrics.snapshot().locks_reaped, 1);
        assert!(metrics.snapshot().reap_cycles >= 1);
    }
}
