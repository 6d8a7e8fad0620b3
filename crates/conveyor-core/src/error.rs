use thiserror::Error;

/// Errors surfaced synchronously by the scheduler's control surface.
///
/// Task failures are never reported through this type; they end up in a
/// [`TaskResult`](crate::domain::TaskResult) instead.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid task: {0}")]
    InvalidTask(String),
}
