//! Queue item: a task plus the bookkeeping the scheduler needs.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::ItemState;
use crate::domain::{Task, TaskId};

/// Wrapper owned by the queue from `add()` until the terminal outcome.
///
/// - `seq` is assigned once at add time and breaks ties in dispatch order.
/// - `attempts` counts retries already granted, so it only grows and never
///   exceeds `max_retries`.
pub struct QueueItem {
    pub task: Arc<dyn Task>,
    pub seq: u64,
    pub attempts: u32,
    pub state: ItemState,

    /// When the item last entered the pending queue.
    pub enqueued_at: Instant,
}

impl QueueItem {
    pub fn new(task: Arc<dyn Task>, seq: u64) -> Self {
        Self {
            task,
            seq,
            attempts: 0,
            state: ItemState::Pending,
            enqueued_at: Instant::now(),
        }
    }

    pub fn id(&self) -> &TaskId {
        self.task.id()
    }

    /// Priority as used for ordering (missing counts as 0).
    pub fn priority(&self) -> i64 {
        self.task.priority().unwrap_or(0)
    }

    /// Executions performed so far, counting the one in flight.
    pub fn executions(&self) -> u32 {
        self.attempts + 1
    }

    /// Mark as running.
    pub fn start(&mut self) {
        self.state = ItemState::Running;
    }

    /// Record a failed attempt that will be retried.
    pub fn schedule_retry(&mut self) {
        self.attempts += 1;
        self.state = ItemState::RetryPending;
    }

    /// Move from RetryPending back to Pending.
    pub fn requeue(&mut self) {
        self.state = ItemState::Pending;
        self.enqueued_at = Instant::now();
    }

    pub fn mark_completed(&mut self) {
        self.state = ItemState::Completed;
    }

    pub fn mark_failed(&mut self) {
        self.state = ItemState::Failed;
    }
}

impl fmt::Debug for QueueItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueItem")
            .field("id", self.id())
            .field("seq", &self.seq)
            .field("attempts", &self.attempts)
            .field("state", &self.state)
            .finish()
    }
}
