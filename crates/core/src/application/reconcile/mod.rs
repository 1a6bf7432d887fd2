// Stale job reconciliation
//
// Liveness backstop: a job whose completion signals were lost (worker crash,
// network partition) would otherwise stay IN_PROGRESS forever.

pub mod scheduler;

pub use scheduler::ReconcileScheduler;

use crate::application::lifecycle::JobLifecycleManager;
use crate::domain::JobState;
use crate::port::JobQuery;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Forces IN_PROGRESS jobs older than a threshold into FAILURE
pub struct StaleJobReconciler {
    manager: Arc<JobLifecycleManager>,
}

impl StaleJobReconciler {
    pub fn new(manager: Arc<JobLifecycleManager>) -> Self {
        Self { manager }
    }

    /// Fail every IN_PROGRESS job in `domain_id` created more than `age_threshold` ago
    ///
    /// Algorithm:
    /// 1. Query jobs with `state = IN_PROGRESS` and `created_at < now - age_threshold`
    /// 2. Drive `mark_failure` on each through the lifecycle manager
    /// 3. A job that fails to transition is logged and skipped
    ///
    /// Re-running right after a sweep finds nothing left to fail.
    ///
    /// # Returns
    /// Number of jobs moved to FAILURE
    pub async fn reconcile_stale(
        &self,
        domain_id: &str,
        age_threshold: Duration,
    ) -> crate::error::Result<usize> {
        let now = self.manager.time_provider().now_millis();
        let threshold_ms = i64::try_from(age_threshold.as_millis()).unwrap_or(i64::MAX);
        let cutoff = now.saturating_sub(threshold_ms);

        let query = JobQuery::in_domain(domain_id)
            .with_state(JobState::InProgress)
            .created_before(cutoff);
        let (jobs, total_count) = self.manager.store().query(&query).await?;

        info!(
            domain_id = %domain_id,
            cutoff = cutoff,
            stale_jobs = total_count,
            "Starting stale job sweep"
        );

        let mut failed = 0;
        for job in jobs {
            match self.manager.mark_failure(&job.job_id, domain_id).await {
                Ok(_) => {
                    info!(
                        job_id = %job.job_id,
                        created_at = job.created_at,
                        remained_tasks = job.remained_tasks,
                        "Stale job marked as FAILURE"
                    );
                    failed += 1;
                }
                Err(e) => {
                    error!(job_id = %job.job_id, error = %e, "Failed to fail stale job");
                }
            }
        }

        info!(domain_id = %domain_id, failed_jobs = failed, "Stale job sweep complete");
        Ok(failed)
    }
}
