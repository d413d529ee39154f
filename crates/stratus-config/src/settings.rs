//! Orchestrator settings
//!
//! Every field has a default so a partial (or absent) settings file is valid.
//! Durations are plain millisecond integers.

use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Backoff between retried mutation attempts
    pub retry: RetrySettings,

    /// Resource state polling defaults
    pub poll: PollSettings,

    /// Async job status vocabulary and cadence
    pub job: JobSettings,

    /// Billing order status vocabulary and cadence
    pub order: OrderSettings,
}

impl Settings {
    pub fn from_yaml_str(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Reject values that would make the orchestrator spin or never wait.
    pub fn validate(&self) -> Result<()> {
        if self.retry.multiplier < 1.0 {
            return Err(ConfigError::Invalid {
                field: "retry.multiplier",
                reason: format!("must be >= 1.0, got {}", self.retry.multiplier),
            });
        }
        if self.retry.initial_delay_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "retry.initial_delay_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Invalid {
                field: "retry.initial_delay_ms",
                reason: "must not exceed retry.max_delay_ms".to_string(),
            });
        }
        for (field, interval) in [
            ("poll.interval_ms", self.poll.interval_ms),
            ("job.interval_ms", self.job.interval_ms),
            ("order.interval_ms", self.order.interval_ms),
        ] {
            if interval == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.job.target.is_empty() {
            return Err(ConfigError::Invalid {
                field: "job.target",
                reason: "at least one target status is required".to_string(),
            });
        }
        if self.order.target.is_empty() {
            return Err(ConfigError::Invalid {
                field: "order.target",
                reason: "at least one target status is required".to_string(),
            });
        }
        Ok(())
    }
}

/// Exponential backoff between retried attempts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound for a single delay
    pub max_delay_ms: u64,
    /// Growth factor per attempt
    pub multiplier: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2.0,
        }
    }
}

impl RetrySettings {
    /// Delay in milliseconds before retry number `attempt` (0-indexed), capped at `max_delay_ms`.
    pub fn delay_for_attempt(&self, attempt: u32) -> u64 {
        let delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt.min(32) as i32);
        if delay >= self.max_delay_ms as f64 {
            self.max_delay_ms
        } else {
            delay as u64
        }
    }

    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.delay_for_attempt(attempt))
    }
}

/// Resource state polling defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSettings {
    pub interval_ms: u64,
    pub initial_delay_ms: u64,
    /// Used when a request does not carry its own timeout
    pub timeout_ms: u64,
    /// Statuses that end a resource poll with a failure
    pub error_statuses: Vec<String>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            initial_delay_ms: 10_000,
            timeout_ms: 30 * 60 * 1000,
            error_statuses: ["abnormal", "createfail", "enlargefail", "ERROR", "FAILED"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// Async job status lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobSettings {
    pub status_path: String,
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub failure: Vec<String>,
    /// Where the job's own diagnostic lives, reported on failure
    pub detail_path: Option<String>,
    pub interval_ms: u64,
    pub initial_delay_ms: u64,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            status_path: "job.status".to_string(),
            pending: vec!["Pending".to_string(), "Running".to_string()],
            target: vec!["Completed".to_string()],
            failure: vec!["Failed".to_string()],
            detail_path: Some("job.fail_reason".to_string()),
            interval_ms: 10_000,
            initial_delay_ms: 10_000,
        }
    }
}

/// Billing order status lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderSettings {
    pub status_path: String,
    pub pending: Vec<String>,
    /// `5`: the order has been executed
    pub target: Vec<String>,
    /// `4`: the order was cancelled
    pub failure: Vec<String>,
    pub interval_ms: u64,
    pub initial_delay_ms: u64,
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            status_path: "order_info.status".to_string(),
            pending: ["1", "3", "6", "9"].into_iter().map(String::from).collect(),
            target: vec!["5".to_string()],
            failure: vec!["4".to_string()],
            interval_ms: 10_000,
            initial_delay_ms: 5_000,
        }
    }
}
