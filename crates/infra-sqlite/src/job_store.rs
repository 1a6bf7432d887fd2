// SQLite JobStore Implementation

use async_trait::async_trait;
use fanout_core::domain::{CounterField, ErrorEntry, Job, JobParams, JobState};
use fanout_core::error::{AppError, Result};
use fanout_core::port::{normalize_params, JobQuery, JobStore};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some("2067") | Some("1555") => AppError::Conflict(format!(
                    "Unique constraint violation: {}",
                    db_err.message()
                )),
                Some("787") | Some("3850") => AppError::Database(format!(
                    "Foreign key constraint violation: {}",
                    db_err.message()
                )),
                Some("5") => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                Some("13") => AppError::Database(format!("Database full: {}", db_err.message())),
                Some(code) => {
                    AppError::Database(format!("Database error [{}]: {}", code, db_err.message()))
                }
                None => AppError::Database(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        // Connection, pool, protocol errors
        _ => AppError::Database(err.to_string()),
    }
}

fn not_found(job_id: &str, domain_id: &str) -> AppError {
    AppError::NotFound(format!("Job {} not found in domain {}", job_id, domain_id))
}

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, job_id: &str, domain_id: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM jobs WHERE job_id = ? AND domain_id = ?")
                .bind(job_id)
                .bind(domain_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        Ok(found.is_some())
    }

    async fn load_errors(&self, job_id: &str) -> Result<Vec<ErrorEntry>> {
        let rows: Vec<ErrorRow> = sqlx::query_as(
            "SELECT error_code, message, additional FROM job_errors WHERE job_id = ? ORDER BY id ASC",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(ErrorRow::into_entry).collect()
    }

    async fn hydrate(&self, row: JobRow) -> Result<Job> {
        let errors = self.load_errors(&row.job_id).await?;
        row.into_job(errors)
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, query: &JobQuery) {
    if let Some(domain_id) = &query.domain_id {
        builder.push(" AND domain_id = ").push_bind(domain_id.clone());
    }
    if let Some(collector_id) = &query.collector_id {
        builder
            .push(" AND collector_id = ")
            .push_bind(collector_id.clone());
    }
    if let Some(state) = query.state {
        builder.push(" AND state = ").push_bind(state.as_str());
    }
    if let Some(created_before) = query.created_before {
        builder.push(" AND created_at < ").push_bind(created_before);
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let params = serde_json::to_string(&normalize_params(&job.params))?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                job_id, domain_id, collector_id, state,
                total_tasks, remained_tasks, params, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.domain_id)
        .bind(&job.collector_id)
        .bind(job.state.as_str())
        .bind(job.total_tasks)
        .bind(job.remained_tasks)
        .bind(params)
        .bind(job.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    async fn get(&self, job_id: &str, domain_id: &str) -> Result<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE job_id = ? AND domain_id = ?",
        )
        .bind(job_id)
        .bind(domain_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        match row {
            Some(row) => Ok(Some(self.hydrate(row).await?)),
            None => Ok(None),
        }
    }

    async fn query(&self, query: &JobQuery) -> Result<(Vec<Job>, i64)> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM jobs WHERE 1 = 1");
        push_filters(&mut count, query);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut select = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs WHERE 1 = 1");
        push_filters(&mut select, query);
        select.push(" ORDER BY created_at ASC, job_id ASC");
        if let Some(limit) = query.limit {
            select.push(" LIMIT ").push_bind(limit);
        }
        let rows: Vec<JobRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(self.hydrate(row).await?);
        }
        Ok((jobs, total))
    }

    async fn atomic_increment(
        &self,
        job_id: &str,
        domain_id: &str,
        field: CounterField,
        delta: i64,
    ) -> Result<i64> {
        // Single statement: the add and the read-back cannot interleave with another writer
        let sql = format!(
            "UPDATE jobs SET {col} = {col} + ? WHERE job_id = ? AND domain_id = ? RETURNING {col}",
            col = field.column()
        );

        let value: Option<i64> = sqlx::query_scalar(&sql)
            .bind(delta)
            .bind(job_id)
            .bind(domain_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        debug!(job_id = %job_id, field = %field, delta, value = ?value, "Counter updated");
        value.ok_or_else(|| not_found(job_id, domain_id))
    }

    async fn persist_state(
        &self,
        job_id: &str,
        domain_id: &str,
        expected: JobState,
        next: JobState,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?
            WHERE job_id = ? AND domain_id = ? AND state = ?
            "#,
        )
        .bind(next.as_str())
        .bind(job_id)
        .bind(domain_id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        // Either the job is gone or another writer moved it first
        if self.exists(job_id, domain_id).await? {
            Ok(false)
        } else {
            Err(not_found(job_id, domain_id))
        }
    }

    async fn append_error(
        &self,
        job_id: &str,
        domain_id: &str,
        entry: &ErrorEntry,
        max_entries: usize,
    ) -> Result<bool> {
        let additional = entry
            .additional
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let max_entries = i64::try_from(max_entries).unwrap_or(i64::MAX);

        // The capacity check and the insert run as one statement
        let result = sqlx::query(
            r#"
            INSERT INTO job_errors (job_id, error_code, message, additional)
            SELECT j.job_id, ?, ?, ?
            FROM jobs j
            WHERE j.job_id = ? AND j.domain_id = ?
              AND (SELECT COUNT(*) FROM job_errors e WHERE e.job_id = j.job_id) < ?
            "#,
        )
        .bind(&entry.error_code)
        .bind(&entry.message)
        .bind(additional)
        .bind(job_id)
        .bind(domain_id)
        .bind(max_entries)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        if self.exists(job_id, domain_id).await? {
            Ok(false)
        } else {
            Err(not_found(job_id, domain_id))
        }
    }
}

/// SQLite row representation
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    job_id: String,
    domain_id: String,
    collector_id: String,
    state: String,
    total_tasks: i64,
    remained_tasks: i64,
    params: String, // JSON object
    created_at: i64,
}

impl JobRow {
    fn into_job(self, errors: Vec<ErrorEntry>) -> Result<Job> {
        let state = self.state.parse::<JobState>().map_err(|_| {
            AppError::Database(format!(
                "Job {} has unknown state {}",
                self.job_id, self.state
            ))
        })?;

        let params = JobParams::from_value(serde_json::from_str(&self.params)?)?;

        Ok(Job {
            job_id: self.job_id,
            domain_id: self.domain_id,
            collector_id: self.collector_id,
            state,
            total_tasks: self.total_tasks,
            remained_tasks: self.remained_tasks,
            errors,
            created_at: self.created_at,
            params,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ErrorRow {
    error_code: String,
    message: String,
    additional: Option<String>,
}

impl ErrorRow {
    fn into_entry(self) -> Result<ErrorEntry> {
        let additional = self
            .additional
            .map(|raw| serde_json::from_str(&raw))
            .transpose()?;

        Ok(ErrorEntry {
            error_code: self.error_code,
            message: self.message,
            additional,
        })
    }
}
