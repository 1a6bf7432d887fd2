//! Fanout Job Tracker - Daemon Entry Point
//! Keeps the job database migrated and runs the periodic stale-job sweep.

mod settings;

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::DaemonConfig;
use fanout_core::application::{JobLifecycleManager, ReconcileScheduler, StaleJobReconciler};
use fanout_core::port::id_provider::UuidProvider;
use fanout_core::port::time_provider::SystemTimeProvider;
use fanout_infra_sqlite::{create_pool, run_migrations, SqliteJobStore};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_logging(log_format: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("fanout=info"))
        .context("Failed to create env filter")?;

    match log_format {
        "json" => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        _ => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = DaemonConfig::from_env()?;

    // 2. Initialize logging
    init_logging(&config.log_format)?;
    info!("Fanout job tracker v{} starting...", VERSION);

    // 3. Initialize database
    let database_url = config.database_url();
    if let Some(parent) = std::path::Path::new(&database_url).parent() {
        if !database_url.contains(":memory:") && !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
    }

    info!(db_path = %database_url, "Initializing database...");
    let pool = create_pool(&database_url)
        .await
        .context("DB pool creation failed")?;
    run_migrations(&pool).await.context("Migration failed")?;

    // 4. Setup dependencies (DI wiring)
    let store = Arc::new(SqliteJobStore::new(pool.clone()));
    let manager = Arc::new(JobLifecycleManager::new(
        store,
        Arc::new(UuidProvider),
        Arc::new(SystemTimeProvider),
        config.lifecycle(),
    ));

    // 5. Start the stale job sweep
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweep_handle = if config.sweep_domains.is_empty() {
        warn!("FANOUT_SWEEP_DOMAINS is empty, stale job sweep disabled");
        None
    } else {
        let scheduler = ReconcileScheduler::new(
            StaleJobReconciler::new(manager.clone()),
            config.sweep_domains.clone(),
            config.stale_threshold(),
            config.sweep_interval(),
        );
        Some(tokio::spawn(scheduler.run(shutdown_rx)))
    };

    info!("System ready. Press Ctrl+C to shutdown");

    // 6. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    // 7. Graceful shutdown
    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweep_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(5), handle).await;
    }
    pool.close().await;

    info!("Shutdown complete.");
    Ok(())
}
