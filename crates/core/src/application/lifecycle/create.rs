// Create Job Use Case

use crate::application::constants::MAX_ID_LEN;
use crate::domain::{DomainError, Job, JobParams};
use crate::error::Result;
use crate::port::{IdProvider, JobStore, TimeProvider};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Create request issued by the job-submission flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
    pub collector_id: String,

    /// Seeds `remained_tasks`
    #[serde(default)]
    pub expected_tasks: i64,

    /// Collector parameters (filter, secret_id, ...)
    #[serde(default)]
    pub params: serde_json::Value,
}

fn validate_id(kind: &str, value: &str) -> std::result::Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::ValidationError(format!(
            "{} cannot be empty",
            kind
        )));
    }
    if value.len() > MAX_ID_LEN {
        return Err(DomainError::ValidationError(format!(
            "{} too long (max {} chars)",
            kind, MAX_ID_LEN
        )));
    }
    Ok(())
}

/// Validate a create request, returning the parsed params
pub fn validate_request(
    domain_id: &str,
    req: &CreateJobRequest,
) -> std::result::Result<JobParams, DomainError> {
    validate_id("domain_id", domain_id)?;
    validate_id("collector_id", &req.collector_id)?;

    if req.expected_tasks < 0 {
        return Err(DomainError::ValidationError(format!(
            "expected_tasks out of range: {}",
            req.expected_tasks
        )));
    }

    JobParams::from_value(req.params.clone())
}

/// Execute create use case
///
/// # Arguments
///
/// * `store` - Job store
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `domain_id` - Tenant scope
/// * `req` - Create request
pub async fn execute(
    store: &dyn JobStore,
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    domain_id: &str,
    req: CreateJobRequest,
) -> Result<String> {
    let params = validate_request(domain_id, &req)?;

    let job = Job::new(
        id_provider.generate_id(),
        domain_id,
        req.collector_id,
        req.expected_tasks,
        time_provider.now_millis(),
        params,
    );

    debug!(job_id = %job.job_id, params = %job.params.to_value(), "[create_job] params");
    store.insert(&job).await?;

    info!(
        job_id = %job.job_id,
        domain_id = %job.domain_id,
        collector_id = %job.collector_id,
        expected_tasks = job.remained_tasks,
        "Job created"
    );

    Ok(job.job_id)
}
