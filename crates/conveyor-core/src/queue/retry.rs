//! Retry policy: decides whether and when a failed item runs again.

use std::time::Duration;

/// Retry policy for failed tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries granted after the first failure.
    pub max_retries: u32,

    /// Delay before the first retry. Zero re-enqueues immediately.
    pub base_delay: Duration,

    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
}

impl RetryPolicy {
    /// Fail fast: no retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
            multiplier: 2.0,
        }
    }

    /// # Arguments
    /// * `attempts` - Retries already granted to the item (0-indexed).
    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// Delay before re-enqueueing an item that has already been retried
    /// `attempts` times: `base_delay * multiplier^attempts`.
    ///
    /// Example with base_delay=100ms, multiplier=2.0:
    /// - first retry (attempts=0): 100ms
    /// - second retry (attempts=1): 200ms
    /// - third retry (attempts=2): 400ms
    pub fn delay_for(&self, attempts: u32) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let nanos = (self.base_delay.as_nanos() as f64 * self.multiplier.powi(exponent)).round();
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Duration::MAX;
        }
        Duration::from_nanos(nanos as u64)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
