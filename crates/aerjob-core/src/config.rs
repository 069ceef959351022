//! Controller configuration.
//!
//! Loaded from TOML; every field has a default so an empty file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::queue::RetryPolicy;

/// Upper bound for every interval setting (one week).
pub const MAX_INTERVAL_SECS: u64 = 7 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Backoff settings for transient reconciliation failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 500,
            multiplier: 2.0,
            max_delay_secs: 300,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            Duration::from_millis(self.base_delay_ms),
            self.multiplier,
            Duration::from_secs(self.max_delay_secs),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ControllerConfig {
    /// Number of concurrent reconciliation workers.
    pub workers: usize,

    /// Deadline for a single reconciliation pass. Unrelated to `spec.timeout`.
    pub reconcile_timeout_secs: u64,

    /// Requeue interval while execution resources are starting.
    pub pending_requeue_secs: u64,

    /// Requeue interval while the backend job is running.
    pub poll_interval_secs: u64,

    /// Delete execution resources once a job is terminal.
    pub cleanup_on_completion: bool,

    /// Image for execution units when the job does not override it.
    pub execution_image: String,

    /// Prefix for the names of execution resources.
    pub name_prefix: String,

    pub retry: RetryConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            reconcile_timeout_secs: 30,
            pending_requeue_secs: 5,
            poll_interval_secs: 10,
            cleanup_on_completion: true,
            execution_image: "aer-simulator:latest".to_string(),
            name_prefix: "aerjob".to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ControllerConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: ControllerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::Invalid("workers must be at least 1".into()));
        }
        if self.reconcile_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "reconcile_timeout_secs must be positive".into(),
            ));
        }
        for (field, secs) in [
            ("reconcile_timeout_secs", self.reconcile_timeout_secs),
            ("pending_requeue_secs", self.pending_requeue_secs),
            ("poll_interval_secs", self.poll_interval_secs),
            ("retry.max_delay_secs", self.retry.max_delay_secs),
            ("retry.base_delay_ms", self.retry.base_delay_ms / 1000),
        ] {
            if secs > MAX_INTERVAL_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{field} must not exceed {MAX_INTERVAL_SECS} seconds"
                )));
            }
        }
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.multiplier must be >= 1.0".into(),
            ));
        }
        if self.name_prefix.is_empty() {
            return Err(ConfigError::Invalid("name_prefix must not be empty".into()));
        }
        Ok(())
    }

    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    pub fn pending_requeue(&self) -> Duration {
        Duration::from_secs(self.pending_requeue_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
