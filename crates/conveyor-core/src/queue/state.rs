//! Per-item state machine.

use serde::{Deserialize, Serialize};

/// Item state.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> RetryPending -> Pending (while attempts < max_retries)
/// - Pending -> Running -> Failed (retry budget exhausted)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemState {
    /// Waiting in the ordering structure.
    Pending,

    /// Dispatched; holds a concurrency slot.
    Running,

    /// Failed with budget left; waiting to be re-inserted.
    RetryPending,

    /// Finished successfully.
    Completed,

    /// Failed permanently.
    Failed,
}

impl ItemState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, ItemState::Completed | ItemState::Failed)
    }

    /// Is this item eligible for dispatch?
    pub fn is_runnable(self) -> bool {
        matches!(self, ItemState::Pending)
    }
}
