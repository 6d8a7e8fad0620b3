//! Bounded-concurrency task scheduler.
//!
//! Tasks are ordered in a [`PendingQueue`], admitted while the lifecycle is
//! `Active` and fewer than `max_concurrent` are running, executed on the
//! Tokio runtime, and either retried or reported to observers.
//!
//! All bookkeeping lives in one `SchedulerState` behind a `std::sync::Mutex`.
//! The lock is held only for short synchronous sections and never across an
//! `.await`, a task body, or an observer callback.

mod lifecycle;
mod worker;

pub use lifecycle::Lifecycle;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use tracing::debug;

use crate::config::{QueueConfig, RetryPlacement};
use crate::domain::{Task, TaskId, TaskResult};
use crate::error::QueueError;
use crate::observability::{ObserverId, Observers, QueueStatus, SchedulerStats};
use crate::queue::{PendingQueue, QueueItem, RetryPolicy};

/// Internal state protected by mutex
struct SchedulerState {
    /// Items waiting for a slot, in dispatch order
    pending: PendingQueue,

    /// Retried items waiting out their backoff delay
    delayed: usize,

    running: usize,
    completed: u64,
    failed: u64,

    lifecycle: Lifecycle,

    /// Next sequence number to hand out
    next_seq: u64,

    stats: SchedulerStats,
}

impl SchedulerState {
    fn new(priority_enabled: bool) -> Self {
        Self {
            pending: PendingQueue::new(priority_enabled),
            delayed: 0,
            running: 0,
            completed: 0,
            failed: 0,
            lifecycle: Lifecycle::Created,
            next_seq: 0,
            stats: SchedulerStats::default(),
        }
    }

    fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            pending: self.pending.len() + self.delayed,
            running: self.running,
            completed: self.completed,
            failed: self.failed,
        }
    }

    /// Put a retried item back in line.
    fn requeue(&mut self, mut item: QueueItem, placement: RetryPlacement) {
        if placement == RetryPlacement::Requeue {
            item.seq = self.allocate_seq();
        }
        item.requeue();
        self.pending.push(item);
    }
}

/// State shared between the handle and in-flight executions.
struct Shared {
    config: QueueConfig,
    retry_policy: RetryPolicy,
    state: Mutex<SchedulerState>,
    observers: Observers,
    status_tx: watch::Sender<QueueStatus>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SchedulerState) {
        self.status_tx.send_replace(state.snapshot());
    }
}

/// Move items from pending to running while capacity and lifecycle allow.
///
/// Safe to call redundantly: it only ever moves pending -> running.
fn dispatch(shared: &Arc<Shared>) {
    let batch = {
        let mut state = shared.lock();
        if !state.lifecycle.admits() {
            debug!(lifecycle = ?state.lifecycle, "Scheduler::dispatch: admission closed");
            return;
        }

        let mut batch = Vec::new();
        while state.running < shared.config.max_concurrent {
            let Some(mut item) = state.pending.pop() else {
                break;
            };
            item.start();
            state.running += 1;
            state.stats.total_dispatched += 1;
            state.stats.peak_running = state.stats.peak_running.max(state.running);
            batch.push(item);
        }

        if !batch.is_empty() {
            shared.publish(&state);
        }
        batch
    };

    for item in batch {
        debug!(
            task_id = %item.id(),
            seq = item.seq,
            attempts = item.attempts,
            waited_ms = u64::try_from(item.enqueued_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scheduler::dispatch: launching"
        );
        worker::launch(Arc::clone(shared), item);
    }
}

/// Handle to a scheduler. Cloning is cheap and every clone drives the same
/// queue.
///
/// `start`, `resume` and `add` launch work with `tokio::spawn`, so once the
/// scheduler is started they must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Fails with `InvalidConfig` when the configuration does not validate.
    pub fn new(config: QueueConfig) -> Result<Self, QueueError> {
        debug!(?config, "Scheduler::new: called");
        config.validate()?;

        let state = SchedulerState::new(config.enable_priority);
        let (status_tx, _) = watch::channel(state.snapshot());

        Ok(Self {
            shared: Arc::new(Shared {
                retry_policy: config.retry_policy(),
                config,
                state: Mutex::new(state),
                observers: Observers::default(),
                status_tx,
            }),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Queue a task. Dispatches immediately if the scheduler is active and
    /// has a free slot.
    pub fn add<T: Task + 'static>(&self, task: T) -> Result<(), QueueError> {
        self.add_shared(Arc::new(task))
    }

    /// Queue a task that is already behind an `Arc`.
    pub fn add_shared(&self, task: Arc<dyn Task>) -> Result<(), QueueError> {
        if task.id().is_empty() {
            return Err(QueueError::InvalidTask(
                "task id must not be empty".to_string(),
            ));
        }

        let admits = {
            let mut state = self.shared.lock();
            let seq = state.allocate_seq();
            debug!(task_id = %task.id(), seq, priority = ?task.priority(), "Scheduler::add: queued");
            state.pending.push(QueueItem::new(task, seq));
            self.shared.publish(&state);
            state.lifecycle.admits()
        };

        if admits {
            dispatch(&self.shared);
        }
        Ok(())
    }

    /// Open admission. The first call moves `Created -> Active`; later calls
    /// clear a stop or pause.
    pub fn start(&self) {
        {
            let mut state = self.shared.lock();
            debug!(from = ?state.lifecycle, "Scheduler::start: called");
            state.lifecycle.start();
        }
        dispatch(&self.shared);
    }

    /// Block new admissions. Running tasks finish; pending tasks stay queued.
    pub fn stop(&self) {
        let mut state = self.shared.lock();
        debug!(from = ?state.lifecycle, "Scheduler::stop: called");
        state.lifecycle.stop();
    }

    /// Block new admissions until `resume()`.
    pub fn pause(&self) {
        let mut state = self.shared.lock();
        debug!(from = ?state.lifecycle, "Scheduler::pause: called");
        state.lifecycle.pause();
    }

    pub fn resume(&self) {
        let admits = {
            let mut state = self.shared.lock();
            debug!(from = ?state.lifecycle, "Scheduler::resume: called");
            state.lifecycle.resume()
        };
        if admits {
            dispatch(&self.shared);
        }
    }

    /// Current counters, read straight from the live state.
    pub fn status(&self) -> QueueStatus {
        self.shared.lock().snapshot()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.shared.lock().lifecycle
    }

    pub fn stats(&self) -> SchedulerStats {
        self.shared.lock().stats.clone()
    }

    /// Ids of queued tasks in the order they would be dispatched. Items
    /// waiting out a retry delay are not included.
    pub fn pending_ids(&self) -> Vec<TaskId> {
        self.shared.lock().pending.ids()
    }

    /// Register a completion observer.
    ///
    /// Observers receive exactly one `TaskResult` per task, in registration
    /// order. A panicking observer is logged and does not affect the others
    /// or the queue.
    pub fn on_task_complete<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(&TaskResult) + Send + Sync + 'static,
    {
        let id = self.shared.observers.register(Arc::new(observer));
        debug!(?id, "Scheduler::on_task_complete: registered");
        id
    }

    /// Receiver that sees a fresh snapshot after every state change.
    pub fn watch_status(&self) -> watch::Receiver<QueueStatus> {
        self.shared.status_tx.subscribe()
    }

    /// Wait for the first snapshot satisfying `predicate`.
    pub async fn wait_for_status<F>(&self, predicate: F) -> QueueStatus
    where
        F: FnMut(&QueueStatus) -> bool,
    {
        let mut rx = self.watch_status();
        match rx.wait_for(predicate).await {
            Ok(status) => *status,
            // unreachable while `self` keeps the sender alive
            Err(_) => self.status(),
        }
    }

    /// Wait until nothing is pending or running. Never resolves while work
    /// is held back by `stop()` or `pause()`.
    pub async fn wait_idle(&self) -> QueueStatus {
        self.wait_for_status(QueueStatus::is_idle).await
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("config", &self.shared.config)
            .field("status", &self.status())
            .field("observers", &self.shared.observers.len())
            .finish()
    }
}
