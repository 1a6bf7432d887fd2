// Job Store Port (Interface)

use crate::domain::{CounterField, ErrorEntry, Job, JobParams, JobState};
use crate::error::Result;
use async_trait::async_trait;

/// Caller-facing param key that storage engines cannot keep as-is
pub const RESERVED_FILTER_KEY: &str = "filter";

/// Key the caller's `filter` param is persisted under
pub const STORED_FILTER_KEY: &str = "filters";

/// Filter for `JobStore::query`. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub domain_id: Option<String>,
    pub collector_id: Option<String>,
    pub state: Option<JobState>,
    /// Only jobs with `created_at` strictly before this epoch ms
    pub created_before: Option<i64>,
    pub limit: Option<i64>,
}

impl JobQuery {
    pub fn in_domain(domain_id: impl Into<String>) -> Self {
        Self {
            domain_id: Some(domain_id.into()),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: JobState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn created_before(mut self, epoch_ms: i64) -> Self {
        self.created_before = Some(epoch_ms);
        self
    }

    pub fn with_collector(mut self, collector_id: impl Into<String>) -> Self {
        self.collector_id = Some(collector_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// In-process evaluation, for stores that cannot push the filter down
    pub fn matches(&self, job: &Job) -> bool {
        self.domain_id.as_ref().map_or(true, |d| &job.domain_id == d)
            && self
                .collector_id
                .as_ref()
                .map_or(true, |c| &job.collector_id == c)
            && self.state.map_or(true, |s| job.state == s)
            && self.created_before.map_or(true, |t| job.created_at < t)
    }
}

/// Rename the reserved `filter` key to `filters` before persisting.
///
/// If both keys are present the caller's `filter` wins.
pub fn normalize_params(params: &JobParams) -> JobParams {
    let mut map = params.as_map().clone();
    if let Some(filter) = map.remove(RESERVED_FILTER_KEY) {
        map.insert(STORED_FILTER_KEY.to_string(), filter);
    }
    JobParams::new(map)
}

/// Storage interface for Job records.
///
/// Every mutating call is scoped by `(job_id, domain_id)`; a job outside the
/// given domain behaves exactly like a missing one.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job (adapters apply `normalize_params`)
    async fn insert(&self, job: &Job) -> Result<()>;

    /// Find job by ID within a domain, errors included in append order
    async fn get(&self, job_id: &str, domain_id: &str) -> Result<Option<Job>>;

    /// Jobs matching the filter (oldest first) and the total match count ignoring `limit`
    async fn query(&self, query: &JobQuery) -> Result<(Vec<Job>, i64)>;

    /// Atomically add `delta` to a counter and return the new value.
    ///
    /// Must be a single storage-level operation, never a read followed by a write.
    /// Returns `AppError::NotFound` if the job does not exist.
    async fn atomic_increment(
        &self,
        job_id: &str,
        domain_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<i64>;

    /// Compare-and-swap the state: write `next` only if the stored state is still `expected`.
    ///
    /// Returns `false` when another writer changed the state first.
    async fn persist_state(
        &self,
        job_id: &str,
        domain_id: &str,
        expected: JobState,
        next: JobState,
    ) -> Result<bool>;

    /// Append an error entry unless the job already holds `max_entries` entries.
    ///
    /// Returns `false` when the log is full.
    async fn append_error(
        &self,
        job_id: &str,
        domain_id: &str,
        entry: &ErrorEntry,
        max_entries: usize,
    ) -> Result<bool>;
}
