//! Configuration management for batchers.

use crate::{BatchError, BatchResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Construction-time configuration for a [`Batcher`](crate::Batcher)
///
/// # Structure
/// - **Triggers**: `capacity` (size trigger) and `timeout` (time trigger, zero disables it;
///   read from and written to files as `timeout_ms`)
/// - **Failure handling**: `failure_policy`, `unhealthy_after`
/// - **Observability**: `name` (log/metric label), `log_level`
///
/// The configuration is consumed when the batcher is built; there is no
/// runtime reconfiguration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatcherConfig {
    /// Name used to label logs and metrics
    #[serde(default = "default_name")]
    pub name: String,

    /// Maximum pending group length before a size-triggered flush (must be > 0)
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Time after a group's first item before a time-triggered flush (zero = disabled)
    #[serde(default, rename = "timeout_ms", with = "millis")]
    pub timeout: Duration,

    /// What the worker does when the flush handler fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Consecutive flush failures before the batcher reports `Unhealthy`
    #[serde(default = "default_unhealthy_after")]
    pub unhealthy_after: usize,

    /// Log level used by `init_tracing` when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_name() -> String {
    "batcher".to_string()
}
fn default_capacity() -> usize {
    100
}
fn default_unhealthy_after() -> usize {
    3
}
fn default_log_level() -> String {
    "info".to_string()
}

impl BatcherConfig {
    /// Create a configuration with the given triggers and defaults for everything else
    pub fn new(capacity: usize, timeout: Duration) -> Self {
        Self {
            capacity,
            timeout,
            ..Self::default()
        }
    }

    /// Set the name used in logs and metrics
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the flush failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the consecutive failure threshold for `Unhealthy`
    pub fn with_unhealthy_after(mut self, failures: usize) -> Self {
        self.unhealthy_after = failures;
        self
    }

    /// The time trigger as a `Duration` (`Duration::ZERO` when disabled)
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Load configuration from environment variables
    ///
    /// - `BATCHER_CAPACITY`: maximum group size (required)
    /// - `BATCHER_TIMEOUT_MS`: group timeout in milliseconds (optional, default 0)
    /// - `BATCHER_NAME`: name for logs and metrics (optional)
    pub fn from_env() -> BatchResult<Self> {
        let capacity = env::var("BATCHER_CAPACITY")
            .map_err(|_| BatchError::config("BATCHER_CAPACITY is required"))?;
        let capacity = parse_var("BATCHER_CAPACITY", &capacity)?;

        let mut config = Self {
            capacity,
            ..Self::default()
        };

        if let Ok(val) = env::var("BATCHER_TIMEOUT_MS") {
            config.timeout = Duration::from_millis(parse_var("BATCHER_TIMEOUT_MS", &val)?);
        }
        if let Ok(val) = env::var("BATCHER_NAME") {
            config.name = val;
        }

        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> BatchResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BatchError::config(format!("Failed to read config file {}: {}", path, e))
        })?;

        toml::from_str(&content).map_err(|e| {
            BatchError::config(format!("Failed to parse config file {}: {}", path, e))
        })
    }

    /// Apply environment variable overrides on top of a loaded configuration
    ///
    /// Unparseable values are ignored and the loaded value is kept.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = env::var("BATCHER_NAME") {
            self.name = val;
        }
        if let Some(capacity) = env::var("BATCHER_CAPACITY")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.capacity = capacity;
        }
        if let Some(timeout_ms) = env::var("BATCHER_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.trim().parse().ok())
        {
            self.timeout = Duration::from_millis(timeout_ms);
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> BatchResult<()> {
        if self.capacity == 0 {
            return Err(BatchError::config("capacity must be > 0"));
        }

        if self.name.is_empty() {
            return Err(BatchError::config("name cannot be empty"));
        }

        if self.unhealthy_after == 0 {
            return Err(BatchError::config("unhealthy_after must be > 0"));
        }

        Ok(())
    }
}

fn parse_var<V: std::str::FromStr>(key: &str, value: &str) -> BatchResult<V> {
    value
        .trim()
        .parse()
        .map_err(|_| BatchError::config(format!("{} has an invalid value: {:?}", key, value)))
}

/// `timeout_ms` on disk, `Duration` in memory
///
/// A non-zero timeout below one millisecond is written as 1 so it never
/// reads back as disabled.
mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S>(timeout: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        if ms == 0 && !timeout.is_zero() {
            ms = 1;
        }
        serializer.serialize_u64(ms)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            capacity: default_capacity(),
            timeout: Duration::ZERO,
            failure_policy: FailurePolicy::default(),
            unhealthy_after: default_unhealthy_after(),
            log_level: default_log_level(),
        }
    }
}

/// What the worker does when a flush handler returns an error or panics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log and count the failure, drop the failed group, keep accepting items
    #[default]
    Isolate,
    /// Stop the worker; the failure is returned by `close()`
    Terminate,
}
