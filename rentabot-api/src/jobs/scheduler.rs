//! Reservation fulfillment scheduler background task.
//!
//! Each tick runs three phases against the catalog: expire overdue pending
//! reservations, reclaim fulfilled-but-unclaimed ones, then fulfill pending
//! reservations FIFO from whatever resources are free. The phase bodies
//! live in `rentabot-core`; this task only drives them on a cadence.

use rentabot_core::Catalog;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Default seconds between scheduler ticks.
pub const DEFAULT_SCHEDULER_INTERVAL_SECS: u64 = 10;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the fulfillment scheduler background task.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// How often to run the three phases (default: 10 seconds)
    pub check_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(DEFAULT_SCHEDULER_INTERVAL_SECS),
        }
    }
}

impl SchedulerConfig {
    /// Create SchedulerConfig from environment variables.
    ///
    /// Environment variables:
    /// - `RENTABOT_SCHEDULER_INTERVAL_SECS`: tick cadence (default: 10)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_secs(
            std::env::var("RENTABOT_SCHEDULER_INTERVAL_SECS")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_SCHEDULER_INTERVAL_SECS),
        );
        Self { check_interval }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Counters tracking scheduler activity since startup.
#[derive(Debug, Default)]
pub struct SchedulerMetrics {
    /// Pending reservations deleted past their wait deadline
    pub pending_expired: AtomicU64,

    /// Fulfilled reservations reclaimed past their claim window
    pub claims_expired: AtomicU64,

    /// Reservations fulfilled
    pub reservations_fulfilled: AtomicU64,

    /// Total ticks completed
    pub ticks: AtomicU64,
}

impl SchedulerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of all counters.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            pending_expired: self.pending_expired.load(Ordering::Relaxed),
            claims_expired: self.claims_expired.load(Ordering::Relaxed),
            reservations_fulfilled: self.reservations_fulfilled.load(Ordering::Relaxed),
            ticks: self.ticks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of the scheduler counters.
#[derive(Debug, Clone)]
pub struct SchedulerSnapshot {
    pub pending_expired: u64,
    pub claims_expired: u64,
    pub reservations_fulfilled: u64,
    pub ticks: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Background task that drives reservation lifecycle and fulfillment.
///
/// Runs until the shutdown signal flips to `true`. Failures inside a phase
/// are logged by the engine and never terminate the loop.
pub async fn scheduler_task(
    catalog: Arc<Catalog>,
    config: SchedulerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<SchedulerMetrics> {
    let metrics = Arc::new(SchedulerMetrics::new());

    let mut check_interval = interval(config.check_interval);
    check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_secs = config.check_interval.as_secs(),
        "Fulfillment scheduler task started"
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!("Fulfillment scheduler task shutting down");
                    break;
                }
            }

            _ = check_interval.tick() => {
                metrics.ticks.fetch_add(1, Ordering::Relaxed);
                let tick = catalog.run_scheduler_tick(chrono::Utc::now());

                metrics.pending_expired.fetch_add(tick.pending_expired.len() as u64, Ordering::Relaxed);
                metrics.claims_expired.fetch_add(tick.claims_expired.len() as u64, Ordering::Relaxed);
                metrics.reservations_fulfilled.fetch_add(tick.fulfilled.len() as u64, Ordering::Relaxed);

                if !tick.pending_expired.is_empty()
                    || !tick.claims_expired.is_empty()
                    || !tick.fulfilled.is_empty()
                {
                    tracing::info!(
                        pending_expired = tick.pending_expired.len(),
                        claims_expired = tick.claims_expired.len(),
                        fulfilled = tick.fulfilled.len(),
                        "Scheduler tick completed"
                    );
                } else {
                    tracing::trace!("Scheduler tick completed with no work");
                }
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        pending_expired = snapshot.pending_expired,
        claims_expired = snapshot.claims_expired,
        reservations_fulfilled = snapshot.reservations_fulfilled,
        ticks = snapshot.ticks,
        "Fulfillment scheduler task completed"
    );

    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use rentabot_core::{ReservationStatus, Resource, ResourceId};

    #[tokio::test]
    async fn scheduler_task_fulfills_waiting_reservations() {
        let catalog = Arc::new(Catalog::from_resources(vec![
            Resource::new(ResourceId(1), "linux-1").with_tags("ci,linux"),
        ]));
        let reservation = catalog
            .create_reservation(vec!["ci".to_string(), "linux".to_string()], 1, 3_600, 600)
            .expect("reservation accepted");

        let config = SchedulerConfig {
            check_interval: Duration::from_millis(20),
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(scheduler_task(catalog.clone(), config, shutdown_rx));

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).expect("send shutdown");
        let metrics = handle.await.expect("task join");

        let queued = catalog
            .get_reservation(&reservation.reservation_id)
            .expect("reservation still present");
        assert_eq!(queued.reservation.status, ReservationStatus::Fulfilled);
        assert_eq!(metrics.snapshot().reservations_fulfilled, 1);
    }
}
