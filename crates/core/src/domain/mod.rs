// Domain Layer - Pure business logic and entities

pub mod error;
pub mod error_log;
pub mod job;
pub mod state_machine;

// Re-exports
pub use error::DomainError;
pub use error_log::{
    truncate_message, ErrorEntry, ErrorLogLimits, DEFAULT_MAX_ERROR_ENTRIES, DEFAULT_MAX_MESSAGE_LEN,
};
pub use job::{CounterField, DomainId, Job, JobEvent, JobId, JobParams, JobState};
pub use state_machine::JobStateMachine;
