use crate::error::{Result, SpikegateError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Retention policy for the bucketed history store
///
/// The store grows by one bucket per second that sees traffic. `KeepAll`
/// reproduces the historical behavior of never deleting anything;
/// `Sweep` runs a background task that prunes buckets older than
/// `max_age_secs`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Keep every bucket for the lifetime of the process (unbounded growth)
    #[default]
    KeepAll,
    /// Periodically delete buckets older than `max_age_secs`
    Sweep { max_age_secs: u64 },
}

/// Gate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Informational baseline of requests per second; not enforced by the gate
    #[serde(default = "default_ratelimit")]
    pub default_ratelimit: u32,
    /// Percentage the in-window peak may reach relative to the trough
    /// before a path is blocked; must exceed 100
    #[serde(default = "default_percent_increase")]
    pub block_after_percent_increase: u32,
    /// Number of most recent one-second buckets the detector inspects
    #[serde(default = "default_window_secs")]
    pub check_last_n_seconds: u32,
    /// Minimum per-bucket request count before the spike check is enabled
    #[serde(default = "default_min_requests")]
    pub enable_check_after_n_requests: u64,
    /// How long a flagged path stays banned (in seconds)
    #[serde(default = "default_ban_secs")]
    pub ban_secs: u64,
    /// History retention policy
    #[serde(default)]
    pub retention: RetentionPolicy,
}

fn default_ratelimit() -> u32 {
    60
}

fn default_percent_increase() -> u32 {
    200
}

fn default_window_secs() -> u32 {
    10
}

fn default_min_requests() -> u64 {
    100
}

fn default_ban_secs() -> u64 {
    60
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            default_ratelimit: default_ratelimit(),
            block_after_percent_increase: default_percent_increase(),
            check_last_n_seconds: default_window_secs(),
            enable_check_after_n_requests: default_min_requests(),
            ban_secs: default_ban_secs(),
            retention: RetentionPolicy::default(),
        }
    }
}

impl GateConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SpikegateError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| SpikegateError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Get the ban duration as a Duration
    pub fn ban_duration(&self) -> Duration {
        Duration::from_secs(self.ban_secs)
    }

    /// Validate configuration
    ///
    /// Out-of-range values are a caller contract violation and are
    /// rejected here rather than left to misbehave at request time.
    pub fn validate(&self) -> Result<()> {
        if self.block_after_percent_increase <= 100 {
            return Err(SpikegateError::Config(format!(
                "block_after_percent_increase must exceed 100, got {}",
                self.block_after_percent_increase
            )));
        }

        if self.block_after_percent_increase <= 101 {
            // 101 makes any single-bucket path whose count sits above the
            // floor eligible for blocking
            warn!(
                "block_after_percent_increase {} is degenerate; values above 101 are recommended",
                self.block_after_percent_increase
            );
        }

        if self.check_last_n_seconds == 0 {
            return Err(SpikegateError::Config(
                "check_last_n_seconds must be > 0".to_string(),
            ));
        }

        if self.enable_check_after_n_requests == 0 {
            return Err(SpikegateError::Config(
                "enable_check_after_n_requests must be > 0".to_string(),
            ));
        }

        if let RetentionPolicy::Sweep { max_age_secs } = self.retention {
            if max_age_secs < self.check_last_n_seconds as u64 {
                return Err(SpikegateError::Config(format!(
                    "retention max_age_secs {} is shorter than the {} second detection window",
                    max_age_secs, self.check_last_n_seconds
                )));
            }
        }

        Ok(())
    }
}
