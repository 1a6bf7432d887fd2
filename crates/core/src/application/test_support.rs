//! In-memory JobStore for unit tests

use crate::domain::{CounterField, ErrorEntry, Job, JobState};
use crate::error::{AppError, Result};
use crate::port::{normalize_params, JobQuery, JobStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Every mutation happens under one mutex, which makes each call atomic.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, Job>>,
    /// Successful compare-and-swaps, in order: (job_id, from, to)
    transitions: Mutex<Vec<(String, JobState, JobState)>>,
    /// Simulated concurrent writers: each persist_state pops one state, writes it and loses the swap
    interference: Mutex<Vec<JobState>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transitions_to(&self, job_id: &str, state: JobState) -> usize {
        self.transitions
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, to)| id == job_id && *to == state)
            .count()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.lock().unwrap().len()
    }

    pub fn interfere_with(&self, states: Vec<JobState>) {
        *self.interference.lock().unwrap() = states;
    }

    /// Overwrite a stored job directly (fixtures only)
    pub fn put(&self, job: Job) {
        self.jobs.lock().unwrap().insert(job.job_id.clone(), job);
    }

    fn not_found(job_id: &str) -> AppError {
        AppError::NotFound(format!("Job {} not found", job_id))
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap();
        if jobs.contains_key(&job.job_id) {
            return Err(AppError::Conflict(format!("Job {} already exists", job.job_id)));
        }
        let mut stored = job.clone();
        stored.params = normalize_params(&job.params);
        jobs.insert(stored.job_id.clone(), stored);
        Ok(())
    }

    async fn get(&self, job_id: &str, domain_id: &str) -> Result<Option<Job>> {
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .get(job_id)
            .filter(|job| job.domain_id == domain_id)
            .cloned())
    }

    async fn query(&self, query: &JobQuery) -> Result<(Vec<Job>, i64)> {
        let jobs = self.jobs.lock().unwrap();
        let mut matched: Vec<Job> = jobs.values().filter(|j| query.matches(j)).cloned().collect();
        matched.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.job_id.cmp(&b.job_id)));
        let total = matched.len() as i64;
        if let Some(limit) = query.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok((matched, total))
    }

    async fn atomic_increment(
        &self,
        job_id: &str,
        domain_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<i64> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .filter(|job| job.domain_id == domain_id)
            .ok_or_else(|| Self::not_found(job_id))?;
        let counter = match field {
            CounterField::TotalTasks => &mut job.total_tasks,
            CounterField::RemainedTasks => &mut job.remained_tasks,
        };
        *counter += delta;
        Ok(*counter)
    }

    async fn persist_state(
        &self,
        job_id: &str,
        domain_id: &str,
        expected: JobState,
        next: JobState,
    ) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .filter(|job| job.domain_id == domain_id)
            .ok_or_else(|| Self::not_found(job_id))?;

        if let Some(racing) = self.interference.lock().unwrap().pop() {
            job.state = racing;
            return Ok(false);
        }

        if job.state != expected {
            return Ok(false);
        }
        job.state = next;
        self.transitions
            .lock()
            .unwrap()
            .push((job_id.to_string(), expected, next));
        Ok(true)
    }

    async fn append_error(
        &self,
        job_id: &str,
        domain_id: &str,
        entry: &ErrorEntry,
        max_entries: usize,
    ) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .get_mut(job_id)
            .filter(|job| job.domain_id == domain_id)
            .ok_or_else(|| Self::not_found(job_id))?;
        if job.errors.len() >= max_entries {
            return Ok(false);
        }
        job.errors.push(entry.clone());
        Ok(true)
    }
}
