//! Background purge of expired tombstones.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument};

use crate::coordinator::IndexCoordinator;
use entity_search_shared::ServiceError;

/// Default time between purge passes.
pub const DEFAULT_PURGE_INTERVAL: Duration = Duration::from_secs(300);

/// Periodically removes tombstones older than the coordinator's retention window.
pub struct TombstoneJanitor {
    coordinator: Arc<IndexCoordinator>,
    interval: Duration,
}

impl TombstoneJanitor {
    pub fn new(coordinator: Arc<IndexCoordinator>) -> Self {
        Self::with_interval(coordinator, DEFAULT_PURGE_INTERVAL)
    }

    pub fn with_interval(coordinator: Arc<IndexCoordinator>, interval: Duration) -> Self {
        Self { coordinator, interval }
    }

    /// Run purge passes until a shutdown signal arrives.
    ///
    /// A failed pass is logged and retried on the next tick.
    #[instrument(skip(self, shutdown_rx), fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Starting tombstone janitor");

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        error!(error = %e, "Tombstone purge failed");
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Tombstone janitor received shutdown signal");
                    break;
                }
            }
        }
    }

    /// Run a single purge pass.
    pub async fn run_once(&self) -> Result<u64, ServiceError> {
        let purged = self.coordinator.purge_expired_tombstones(Utc::now()).await?;
        if purged > 0 {
            info!(purged, "Purged expired tombstones");
        } else {
            debug!("No expired tombstones");
        }
        Ok(purged)
    }
}
