// Job Lifecycle Manager - counters, error log and state transitions for fan-out jobs

pub mod create;

pub use create::CreateJobRequest;

use crate::application::constants::DEFAULT_MAX_TRANSITION_ATTEMPTS;
use crate::domain::{
    CounterField, DomainError, ErrorEntry, ErrorLogLimits, Job, JobEvent, JobState,
    JobStateMachine,
};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, TimeProvider};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Tunables for the lifecycle manager
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub error_log: ErrorLogLimits,
    pub max_transition_attempts: usize,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            error_log: ErrorLogLimits::default(),
            max_transition_attempts: DEFAULT_MAX_TRANSITION_ATTEMPTS,
        }
    }
}

/// Single entry point for subtask workers, orchestrators and the stale-job sweep.
///
/// Operations are keyed by `(job_id, domain_id)`; jobs never coordinate with each other.
pub struct JobLifecycleManager {
    store: Arc<dyn JobStore>,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    config: LifecycleConfig,
}

impl JobLifecycleManager {
    pub fn new(
        store: Arc<dyn JobStore>,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            store,
            id_provider,
            time_provider,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn time_provider(&self) -> &Arc<dyn TimeProvider> {
        &self.time_provider
    }

    /// Create a job in CREATED state and return its ID
    pub async fn create_job(&self, domain_id: &str, req: CreateJobRequest) -> Result<String> {
        create::execute(
            self.store.as_ref(),
            self.id_provider.as_ref(),
            self.time_provider.as_ref(),
            domain_id,
            req,
        )
        .await
    }

    /// Current snapshot of a job
    pub async fn job(&self, job_id: &str, domain_id: &str) -> Result<Job> {
        self.store
            .get(job_id, domain_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Job {} not found in domain {}", job_id, domain_id))
            })
    }

    /// Register one more subtask (`total_tasks += 1`) and return the new total
    pub async fn register_task(&self, job_id: &str, domain_id: &str) -> Result<i64> {
        self.ensure_open(job_id, domain_id).await?;

        let total = self
            .store
            .atomic_increment(job_id, domain_id, CounterField::TotalTasks, 1)
            .await?;

        debug!(job_id = %job_id, total_tasks = total, "[register_task]");
        Ok(total)
    }

    /// Grow the outstanding work (`remained_tasks += 1`) and return the new value
    pub async fn add_remained_task(&self, job_id: &str, domain_id: &str) -> Result<i64> {
        self.ensure_open(job_id, domain_id).await?;

        let remained = self
            .store
            .atomic_increment(job_id, domain_id, CounterField::RemainedTasks, 1)
            .await?;

        debug!(job_id = %job_id, remained_tasks = remained, "[add_remained_task]");
        Ok(remained)
    }

    /// Report one subtask done (`remained_tasks -= 1`) and return the new value.
    ///
    /// The caller whose decrement lands exactly on zero drives `mark_finished`;
    /// a negative result is a `CounterUnderflow` and leaves the counter as-is.
    pub async fn complete_task(&self, job_id: &str, domain_id: &str) -> Result<i64> {
        let remained = self
            .store
            .atomic_increment(job_id, domain_id, CounterField::RemainedTasks, -1)
            .await?;

        debug!(job_id = %job_id, remained_tasks = remained, "[complete_task]");

        if remained < 0 {
            warn!(
                job_id = %job_id,
                remained_tasks = remained,
                "More completions reported than tasks registered"
            );
            return Err(DomainError::CounterUnderflow {
                job_id: job_id.to_string(),
                field: CounterField::RemainedTasks,
                value: remained,
            }
            .into());
        }

        if remained == 0 {
            self.mark_finished(job_id, domain_id).await?;
        }

        Ok(remained)
    }

    /// Append an error to the job's log and fail the job
    pub async fn report_error(
        &self,
        job_id: &str,
        domain_id: &str,
        error_code: &str,
        message: &str,
        additional: Option<serde_json::Value>,
    ) -> Result<()> {
        let limits = &self.config.error_log;
        let entry = ErrorEntry::new(error_code, message, additional, limits);

        let appended = self
            .store
            .append_error(job_id, domain_id, &entry, limits.max_entries)
            .await?;

        if appended {
            debug!(job_id = %job_id, error_code = %entry.error_code, "[report_error] appended");
        } else {
            warn!(
                job_id = %job_id,
                error_code = %entry.error_code,
                max_entries = limits.max_entries,
                "Error log full, entry dropped"
            );
        }

        self.mark_failure(job_id, domain_id).await?;
        Ok(())
    }

    pub async fn mark_in_progress(&self, job_id: &str, domain_id: &str) -> Result<JobState> {
        self.transition(job_id, domain_id, JobEvent::MarkInProgress).await
    }

    pub async fn mark_finished(&self, job_id: &str, domain_id: &str) -> Result<JobState> {
        self.transition(job_id, domain_id, JobEvent::MarkFinished).await
    }

    pub async fn mark_canceled(&self, job_id: &str, domain_id: &str) -> Result<JobState> {
        self.transition(job_id, domain_id, JobEvent::MarkCanceled).await
    }

    pub async fn mark_timeout(&self, job_id: &str, domain_id: &str) -> Result<JobState> {
        self.transition(job_id, domain_id, JobEvent::MarkTimeout).await
    }

    pub async fn mark_failure(&self, job_id: &str, domain_id: &str) -> Result<JobState> {
        self.transition(job_id, domain_id, JobEvent::MarkFailure).await
    }

    /// Point-in-time cancellation check for cooperating workers
    pub async fn is_canceled(&self, job_id: &str, domain_id: &str) -> Result<bool> {
        Ok(self.job(job_id, domain_id).await?.is_canceled())
    }

    /// Apply `event` under optimistic concurrency on the stored state.
    ///
    /// A lost compare-and-swap means another writer moved the job; the table is
    /// re-evaluated against the fresh state.
    async fn transition(&self, job_id: &str, domain_id: &str, event: JobEvent) -> Result<JobState> {
        for attempt in 1..=self.config.max_transition_attempts {
            let current = self.job(job_id, domain_id).await?.state;
            let next = JobStateMachine::apply(job_id, current, event)?;

            if next == current {
                debug!(job_id = %job_id, event = %event, state = %current, "State unchanged");
                return Ok(next);
            }

            if self
                .store
                .persist_state(job_id, domain_id, current, next)
                .await?
            {
                info!(
                    job_id = %job_id,
                    event = %event,
                    from = %current,
                    to = %next,
                    "Job state changed"
                );
                return Ok(next);
            }

            debug!(
                job_id = %job_id,
                event = %event,
                attempt,
                "State changed concurrently, re-evaluating"
            );
        }

        Err(AppError::Conflict(format!(
            "Job {} state kept changing while applying {} ({} attempts)",
            job_id, event, self.config.max_transition_attempts
        )))
    }

    /// Reject counter growth on jobs that can no longer make progress
    async fn ensure_open(&self, job_id: &str, domain_id: &str) -> Result<()> {
        let job = self.job(job_id, domain_id).await?;
        if job.state.is_closed() {
            return Err(DomainError::AlreadyTerminal {
                job_id: job_id.to_string(),
                state: job.state,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
