//! Status snapshots and completion observers.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::TaskResult;

/// Point-in-time counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub running: usize,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStatus {
    /// Nothing waiting and nothing in flight.
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.running == 0
    }

    /// Items that reached a terminal outcome.
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }
}

/// Lifetime statistics for the scheduler
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerStats {
    pub total_dispatched: u64,
    pub total_retries: u64,
    pub peak_running: usize,
}

/// Handle returned when an observer is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(usize);

type Callback = Arc<dyn Fn(&TaskResult) + Send + Sync>;

/// Registered completion observers, invoked in registration order.
#[derive(Default)]
pub(crate) struct Observers {
    callbacks: RwLock<Vec<(ObserverId, Callback)>>,
}

impl Observers {
    pub(crate) fn register(&self, callback: Callback) -> ObserverId {
        let mut callbacks = self
            .callbacks
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let id = ObserverId(callbacks.len());
        callbacks.push((id, callback));
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Deliver one result to every observer.
    ///
    /// The list is snapshotted first so an observer may register another
    /// one (it will see the next result, not this one). A panicking observer
    /// is logged and skipped.
    pub(crate) fn notify(&self, result: &TaskResult) {
        let snapshot: Vec<(ObserverId, Callback)> = self
            .callbacks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (id, callback) in snapshot {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(result))) {
                warn!(
                    observer = id.0,
                    task_id = %result.id,
                    panic = %panic_message(panic.as_ref()),
                    "Observer panicked while handling task result"
                );
            }
        }
    }
}

/// Best-effort text for a panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
