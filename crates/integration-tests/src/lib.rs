//! Shared fixtures for the SQLite-backed integration tests

use fanout_core::application::{CreateJobRequest, JobLifecycleManager, LifecycleConfig};
use fanout_core::port::id_provider::UuidProvider;
use fanout_core::port::TimeProvider;
use fanout_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};
use std::path::PathBuf;
use std::sync::Arc;

/// A throwaway database file, removed (with its WAL files) on drop
pub struct TempDb {
    path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("fanout-test-{}.db", uuid::Uuid::new_v4()));
        Self { path }
    }

    pub fn url(&self) -> String {
        self.path.display().to_string()
    }
}

impl Default for TempDb {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = std::fs::remove_file(file);
        }
    }
}

/// Lifecycle manager over a migrated SQLite database at `database_url`
pub async fn manager_at(
    database_url: &str,
    time_provider: Arc<dyn TimeProvider>,
) -> Arc<JobLifecycleManager> {
    let pool = create_pool(database_url).await.unwrap();
    run_migrations(&pool).await.unwrap();

    Arc::new(JobLifecycleManager::new(
        Arc::new(SqliteJobStore::new(pool)),
        Arc::new(UuidProvider),
        time_provider,
        LifecycleConfig::default(),
    ))
}

pub fn collect_request(expected_tasks: i64) -> CreateJobRequest {
    CreateJobRequest {
        collector_id: "collector-aws-ec2".to_string(),
        expected_tasks,
        params: serde_json::json!({
            "secret_id": "secret-123",
            "filter": {"region_name": "ap-northeast-2"}
        }),
    }
}
