use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::DEFAULT_MAX_RETRIES;
use crate::error::SchedulerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub scheduler: SchedulerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Worker pool and lifecycle settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Number of worker tasks, also the cap on concurrently RUNNING tasks
    pub workers: usize,
    /// How long an idle worker waits on the queue before re-checking shutdown
    pub poll_interval_ms: u64,
    /// Applied to submissions that do not set `max_retries`
    pub default_max_retries: u32,
    /// How long `stop` waits for workers to finish their current task
    pub shutdown_grace_ms: u64,
    /// Reject submissions naming an unregistered function at enqueue time
    pub strict_functions: bool,
    pub cleanup: CleanupConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            poll_interval_ms: 1000,
            default_max_retries: DEFAULT_MAX_RETRIES,
            shutdown_grace_ms: 5000,
            strict_functions: false,
            cleanup: CleanupConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_poll_interval_ms(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn with_strict_functions(mut self, strict: bool) -> Self {
        self.strict_functions = strict;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.workers == 0 {
            return Err(SchedulerError::Config("workers must be at least 1".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(SchedulerError::Config("poll_interval_ms must be greater than 0".into()));
        }
        if self.cleanup.interval_secs == Some(0) {
            return Err(SchedulerError::Config("cleanup.interval_secs must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Background removal of old terminal tasks; off unless `interval_secs` is set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    pub interval_secs: Option<u64>,
    pub max_age_hours: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: None,
            max_age_hours: 24,
        }
    }
}

impl CleanupConfig {
    pub fn interval(&self) -> Option<Duration> {
        self.interval_secs.map(Duration::from_secs)
    }

    pub fn max_age(&self) -> Duration {
        Duration::from_secs(self.max_age_hours.saturating_mul(3600))
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config.scheduler.validate().context("Invalid scheduler config")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}
