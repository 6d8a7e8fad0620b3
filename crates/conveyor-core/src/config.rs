//! Scheduler configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::QueueError;
use crate::queue::RetryPolicy;

/// Where a retried item re-enters the pending queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPlacement {
    /// Keep the original sequence number (ahead of later arrivals in its tier).
    #[default]
    OriginalSequence,

    /// Take a fresh sequence number, as if newly added.
    Requeue,
}

/// Scheduler configuration. Fixed once the scheduler is built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Max tasks executing at once
    pub max_concurrent: usize,

    /// Order pending work by task priority instead of arrival
    #[serde(default)]
    pub enable_priority: bool,

    /// Extra executions allowed after the first failure
    #[serde(default)]
    pub max_retries: u32,

    /// Delay before the first retry is re-enqueued (0 = immediately)
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Growth factor applied to the retry delay per attempt
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    #[serde(default)]
    pub retry_placement: RetryPlacement,
}

fn default_retry_multiplier() -> f64 {
    2.0
}

impl QueueConfig {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            enable_priority: false,
            max_retries: 0,
            retry_delay_ms: 0,
            retry_multiplier: default_retry_multiplier(),
            retry_placement: RetryPlacement::default(),
        }
    }

    pub fn with_priority(mut self, enabled: bool) -> Self {
        self.enable_priority = enabled;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_retry_multiplier(mut self, multiplier: f64) -> Self {
        self.retry_multiplier = multiplier;
        self
    }

    pub fn with_retry_placement(mut self, placement: RetryPlacement) -> Self {
        self.retry_placement = placement;
        self
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, QueueError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| QueueError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, QueueError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            QueueError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), QueueError> {
        if self.max_concurrent == 0 {
            return Err(QueueError::InvalidConfig(
                "max_concurrent must be a positive number".to_string(),
            ));
        }
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            return Err(QueueError::InvalidConfig(format!(
                "retry_multiplier must be a finite number >= 1.0 (got {})",
                self.retry_multiplier
            )));
        }
        Ok(())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: self.retry_delay(),
            multiplier: self.retry_multiplier,
        }
    }
}
