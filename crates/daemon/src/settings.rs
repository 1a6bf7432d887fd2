//! Daemon configuration loaded from `FANOUT_*` environment variables

use anyhow::{ensure, Context, Result};
use config::{Config, Environment};
use fanout_core::application::constants::{DEFAULT_STALE_THRESHOLD, DEFAULT_SWEEP_INTERVAL};
use fanout_core::application::LifecycleConfig;
use fanout_core::domain::{ErrorLogLimits, DEFAULT_MAX_ERROR_ENTRIES, DEFAULT_MAX_MESSAGE_LEN};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "FANOUT";
const DEFAULT_DB_PATH: &str = "~/.fanout/jobs.db";

fn default_db_path() -> String {
    DEFAULT_DB_PATH.to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_stale_threshold_hours() -> u64 {
    DEFAULT_STALE_THRESHOLD.as_secs() / 3600
}

fn default_sweep_interval_secs() -> u64 {
    DEFAULT_SWEEP_INTERVAL.as_secs()
}

fn default_max_error_message_len() -> usize {
    DEFAULT_MAX_MESSAGE_LEN
}

fn default_max_error_entries() -> usize {
    DEFAULT_MAX_ERROR_ENTRIES
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    /// SQLite file path (`~` is expanded) or `sqlite::memory:`
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// `pretty` or `json`
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Domains swept for stale jobs (comma separated in the environment)
    #[serde(default)]
    pub sweep_domains: Vec<String>,

    #[serde(default = "default_stale_threshold_hours")]
    pub stale_threshold_hours: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_max_error_message_len")]
    pub max_error_message_len: usize,

    #[serde(default = "default_max_error_entries")]
    pub max_error_entries: usize,
}

impl DaemonConfig {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_environment(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_environment(env: Environment) -> Result<Self> {
        let config: DaemonConfig = Config::builder()
            .add_source(
                env.try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("sweep_domains"),
            )
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.stale_threshold_hours > 0,
            "FANOUT_STALE_THRESHOLD_HOURS must be positive"
        );
        ensure!(
            self.sweep_interval_secs > 0,
            "FANOUT_SWEEP_INTERVAL_SECS must be positive"
        );
        ensure!(
            self.max_error_entries > 0,
            "FANOUT_MAX_ERROR_ENTRIES must be positive"
        );
        Ok(())
    }

    pub fn database_url(&self) -> String {
        shellexpand::tilde(&self.db_path).into_owned()
    }

    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_hours * 3600)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn lifecycle(&self) -> LifecycleConfig {
        LifecycleConfig {
            error_log: ErrorLogLimits {
                max_message_len: self.max_error_message_len,
                max_entries: self.max_error_entries,
            },
            ..Default::default()
        }
    }
}
