// Domain Error Types

use super::job::{CounterField, JobEvent, JobState};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid job state transition: cannot apply {event} to job {job_id} in state {state}")]
    InvalidStateTransition {
        job_id: String,
        event: JobEvent,
        state: JobState,
    },

    #[error("Counter underflow on job {job_id}: {field} = {value}")]
    CounterUnderflow {
        job_id: String,
        field: CounterField,
        value: i64,
    },

    #[error("Job {job_id} is already terminal ({state})")]
    AlreadyTerminal { job_id: String, state: JobState },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
