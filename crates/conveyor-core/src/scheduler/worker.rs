//! Execution of a single dispatched item: run the task body, then resolve
//! the outcome (complete, retry, or fail).

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{Shared, dispatch};
use crate::domain::{TaskResult, describe_failure};
use crate::observability::panic_message;
use crate::queue::QueueItem;

/// Spawn the execution of an item that already holds a running slot.
pub(super) fn launch(shared: Arc<Shared>, item: QueueItem) {
    tokio::spawn(run(shared, item));
}

async fn run(shared: Arc<Shared>, item: QueueItem) {
    let started = Instant::now();
    let outcome = execute(&item).await;
    let duration = started.elapsed();

    match outcome {
        Ok(value) => {
            let result = TaskResult::completed(item.id().clone(), duration, item.executions(), value);
            finish(&shared, item, result);
        }
        Err(error) if shared.retry_policy.should_retry(item.attempts) => {
            retry(&shared, item, error).await;
        }
        Err(error) => {
            let result = TaskResult::failed(item.id().clone(), duration, item.executions(), error);
            finish(&shared, item, result);
        }
    }

    // backfill the slot this item released
    dispatch(&shared);
}

/// Run the task body on its own Tokio task so a panic is contained and
/// reported as a failure. Control returns here exactly once.
async fn execute(item: &QueueItem) -> Result<serde_json::Value, String> {
    let task = Arc::clone(&item.task);
    match tokio::spawn(async move { task.execute().await }).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(describe_failure(err.as_ref())),
        Err(join_err) if join_err.is_panic() => {
            let message = panic_message(join_err.into_panic().as_ref());
            warn!(task_id = %item.id(), panic = %message, "Task panicked during execution");
            Err(message)
        }
        Err(_) => Err("task was cancelled before completing".to_string()),
    }
}

/// Record a terminal outcome, notify observers, then release the slot.
///
/// The counter is bumped before observers run so one calling `status()`
/// sees its own task counted. The running slot is held until every observer
/// has returned, and only then is a snapshot published, so `wait_idle()`
/// never resolves ahead of a delivery.
fn finish(shared: &Shared, mut item: QueueItem, result: TaskResult) {
    if result.is_completed() {
        item.mark_completed();
    } else {
        item.mark_failed();
    }
    debug_assert!(item.state.is_terminal());

    {
        let mut state = shared.lock();
        if result.is_completed() {
            state.completed += 1;
        } else {
            state.failed += 1;
        }
    }

    match &result.error {
        None => info!(
            task_id = %result.id,
            state = ?item.state,
            duration_ms = result.duration_ms,
            attempts = result.attempts,
            "Task completed"
        ),
        Some(error) => info!(
            task_id = %result.id,
            state = ?item.state,
            duration_ms = result.duration_ms,
            attempts = result.attempts,
            %error,
            "Task failed permanently"
        ),
    }

    shared.observers.notify(&result);

    let mut state = shared.lock();
    state.running -= 1;
    shared.publish(&state);
}

/// Put a failed item back in line. No result is reported for the attempt.
async fn retry(shared: &Arc<Shared>, mut item: QueueItem, error: String) {
    let delay = shared.retry_policy.delay_for(item.attempts);
    item.schedule_retry();
    warn!(
        task_id = %item.id(),
        attempts = item.attempts,
        max_retries = shared.retry_policy.max_retries,
        ?delay,
        %error,
        "Task failed, scheduling retry"
    );

    let waiting = {
        let mut state = shared.lock();
        state.running -= 1;
        state.stats.total_retries += 1;
        let waiting = if delay.is_zero() {
            state.requeue(item, shared.config.retry_placement);
            None
        } else {
            state.delayed += 1;
            Some(item)
        };
        shared.publish(&state);
        waiting
    };

    if let Some(item) = waiting {
        wait_and_requeue(shared, item, delay).await;
    }
}

async fn wait_and_requeue(shared: &Arc<Shared>, item: QueueItem, delay: Duration) {
    // let other work use the slot while this item backs off
    dispatch(shared);
    tokio::time::sleep(delay).await;

    let mut state = shared.lock();
    debug!(task_id = %item.id(), attempts = item.attempts, "Scheduler::retry: backoff elapsed");
    state.delayed -= 1;
    state.requeue(item, shared.config.retry_placement);
    shared.publish(&state);
}
