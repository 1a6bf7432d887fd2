// Periodic stale-job sweep

use super::StaleJobReconciler;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

/// Reconcile scheduler
///
/// Sweeps each configured domain every `interval` until shut down
pub struct ReconcileScheduler {
    reconciler: StaleJobReconciler,
    domains: Vec<String>,
    threshold: Duration,
    interval: Duration,
}

impl ReconcileScheduler {
    /// Create a new reconcile scheduler
    ///
    /// # Arguments
    /// * `reconciler` - Stale job reconciler
    /// * `domains` - Tenant scopes to sweep, in order
    /// * `threshold` - Age after which an IN_PROGRESS job is failed
    /// * `interval` - Time between sweeps
    pub fn new(
        reconciler: StaleJobReconciler,
        domains: Vec<String>,
        threshold: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            reconciler,
            domains,
            threshold,
            interval,
        }
    }

    /// Run the sweep loop until `shutdown` carries `true` or its sender is dropped.
    ///
    /// The first sweep happens immediately. Should be spawned in tokio::spawn
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            domains = ?self.domains,
            threshold_secs = self.threshold.as_secs(),
            interval_secs = self.interval.as_secs(),
            "Reconcile scheduler started"
        );

        let mut tick = interval(self.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = tick.tick() => {
                    self.run_now().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("Reconcile scheduler stopped");
    }

    /// Sweep every domain once, returning the total number of jobs failed
    pub async fn run_now(&self) -> usize {
        let mut total = 0;
        for domain_id in &self.domains {
            match self
                .reconciler
                .reconcile_stale(domain_id, self.threshold)
                .await
            {
                Ok(failed) => total += failed,
                Err(e) => {
                    error!(domain_id = %domain_id, error = ?e, "Stale job sweep failed");
                }
            }
        }
        total
    }
}
