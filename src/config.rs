use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

/// Settings used to construct and start a scheduler engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub thread_pool: ThreadPoolSettings,
}

/// Scheduler identity and startup behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Scheduler name, used as the prefix of the instance id (default: a3s-scheduler)
    #[serde(default = "default_scheduler_name")]
    pub scheduler_name: String,

    /// Start the engine right after construction (default: true)
    #[serde(default = "default_auto_startup")]
    pub auto_startup: bool,

    /// Seconds to wait before starting (default: 5)
    #[serde(default = "default_startup_delay_secs")]
    pub startup_delay_secs: u64,

    /// Overwrite jobs that already exist when loading declared jobs (default: true)
    #[serde(default = "default_overwrite_existing_jobs")]
    pub overwrite_existing_jobs: bool,
}

/// Worker pool for job executions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadPoolSettings {
    /// Maximum number of concurrently executing handlers (default: 10)
    #[serde(default = "default_core_pool_size")]
    pub core_pool_size: usize,

    /// Capacity of the job outcome channel (default: 100)
    #[serde(default = "default_outcome_capacity")]
    pub outcome_capacity: usize,
}

fn default_scheduler_name() -> String {
    "a3s-scheduler".to_string()
}

fn default_auto_startup() -> bool {
    true
}

fn default_startup_delay_secs() -> u64 {
    5
}

fn default_overwrite_existing_jobs() -> bool {
    true
}

fn default_core_pool_size() -> usize {
    10
}

fn default_outcome_capacity() -> usize {
    100
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            scheduler_name: default_scheduler_name(),
            auto_startup: default_auto_startup(),
            startup_delay_secs: default_startup_delay_secs(),
            overwrite_existing_jobs: default_overwrite_existing_jobs(),
        }
    }
}

impl Default for ThreadPoolSettings {
    fn default() -> Self {
        Self {
            core_pool_size: default_core_pool_size(),
            outcome_capacity: default_outcome_capacity(),
        }
    }
}

impl SchedulerConfig {
    /// Parse a TOML document. Missing sections and keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SchedulerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    /// Returns default config if the file does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|e| {
                ScheduleError::Config(format!(
                    "Failed to read config file {}: {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the configuration as TOML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScheduleError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject settings no engine can run with.
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.scheduler_name.trim().is_empty() {
            return Err(ScheduleError::Config(
                "scheduler_name must not be empty".to_string(),
            ));
        }
        if self.thread_pool.core_pool_size == 0 {
            return Err(ScheduleError::Config(
                "core_pool_size must be at least 1".to_string(),
            ));
        }
        if self.thread_pool.outcome_capacity == 0 {
            return Err(ScheduleError::Config(
                "outcome_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
