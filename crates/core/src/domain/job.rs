// Job Domain Model

use super::error::DomainError;
use super::error_log::ErrorEntry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Job ID (UUID v4)
pub type JobId = String;

/// Tenant scope a job belongs to
pub type DomainId = String;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    Created,
    InProgress,
    Canceled,
    Finished,
    Failure,
    Timeout,
}

impl JobState {
    pub const ALL: [JobState; 6] = [
        JobState::Created,
        JobState::InProgress,
        JobState::Canceled,
        JobState::Finished,
        JobState::Failure,
        JobState::Timeout,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Created => "CREATED",
            JobState::InProgress => "IN_PROGRESS",
            JobState::Canceled => "CANCELED",
            JobState::Finished => "FINISHED",
            JobState::Failure => "FAILURE",
            JobState::Timeout => "TIMEOUT",
        }
    }

    /// CANCELED and TIMEOUT accept no further progress of any kind
    pub fn is_closed(&self) -> bool {
        matches!(self, JobState::Canceled | JobState::Timeout)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobState::ALL
            .into_iter()
            .find(|state| state.as_str() == s)
            .ok_or_else(|| DomainError::ValidationError(format!("unknown job state: {}", s)))
    }
}

/// Signals that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    MarkInProgress,
    MarkFinished,
    MarkCanceled,
    MarkTimeout,
    MarkFailure,
}

impl JobEvent {
    pub const ALL: [JobEvent; 5] = [
        JobEvent::MarkInProgress,
        JobEvent::MarkFinished,
        JobEvent::MarkCanceled,
        JobEvent::MarkTimeout,
        JobEvent::MarkFailure,
    ];
}

impl fmt::Display for JobEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobEvent::MarkInProgress => "mark_in_progress",
            JobEvent::MarkFinished => "mark_finished",
            JobEvent::MarkCanceled => "mark_canceled",
            JobEvent::MarkTimeout => "mark_timeout",
            JobEvent::MarkFailure => "mark_failure",
        };
        f.write_str(name)
    }
}

/// Numeric job fields that only change through atomic increments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterField {
    TotalTasks,
    RemainedTasks,
}

impl CounterField {
    /// Storage column name
    pub fn column(&self) -> &'static str {
        match self {
            CounterField::TotalTasks => "total_tasks",
            CounterField::RemainedTasks => "remained_tasks",
        }
    }
}

impl fmt::Display for CounterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// Collector parameters captured at creation (filters, secret reference, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobParams(serde_json::Map<String, serde_json::Value>);

impl JobParams {
    pub fn new(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self(map)
    }

    /// Accepts a JSON object; `null` is treated as no parameters
    pub fn from_value(value: serde_json::Value) -> Result<Self, DomainError> {
        match value {
            serde_json::Value::Object(map) => Ok(Self(map)),
            serde_json::Value::Null => Ok(Self::default()),
            other => Err(DomainError::ValidationError(format!(
                "params must be a JSON object, got {}",
                other
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.0
    }

    pub fn into_map(self) -> serde_json::Map<String, serde_json::Value> {
        self.0
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.0.clone())
    }
}

/// Job Entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    // Identity (immutable after creation)
    pub job_id: JobId,
    pub domain_id: DomainId,
    pub collector_id: String,

    pub state: JobState,

    // Fan-out counters
    pub total_tasks: i64,
    pub remained_tasks: i64,

    pub errors: Vec<ErrorEntry>,

    pub created_at: i64, // epoch ms
    pub params: JobParams,
}

impl Job {
    /// Create a new Job in CREATED state
    ///
    /// # Arguments
    ///
    /// * `job_id` - Unique job ID (injected, not generated)
    /// * `domain_id` - Tenant scope
    /// * `collector_id` - Collector that owns the job
    /// * `expected_tasks` - Initial `remained_tasks`
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `params` - Collector parameters
    pub fn new(
        job_id: impl Into<String>,
        domain_id: impl Into<String>,
        collector_id: impl Into<String>,
        expected_tasks: i64,
        created_at: i64,
        params: JobParams,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            domain_id: domain_id.into(),
            collector_id: collector_id.into(),
            state: JobState::Created,
            total_tasks: 0,
            remained_tasks: expected_tasks,
            errors: Vec::new(),
            created_at,
            params,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.state == JobState::Canceled
    }
}
