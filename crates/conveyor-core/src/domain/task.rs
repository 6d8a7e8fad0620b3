//! Task contract: the unit of asynchronous work handed to the scheduler.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use super::TaskId;
use crate::error::QueueError;

/// Error type returned by a failing task body.
pub type TaskError = Box<dyn std::error::Error + Send + Sync>;

/// Value produced by a successful task body.
pub type TaskOutput = Result<serde_json::Value, TaskError>;

/// A unit of work the scheduler can run.
///
/// `execute` may be invoked more than once when retries are enabled, so any
/// side effects should be idempotent. The scheduler only borrows the task
/// for the duration of an execution; it never inspects the result.
#[async_trait]
pub trait Task: Send + Sync {
    fn id(&self) -> &TaskId;

    /// Dispatch priority. Higher runs first; `None` counts as 0.
    fn priority(&self) -> Option<i64> {
        None
    }

    async fn execute(&self) -> TaskOutput;
}

type ExecuteFuture = Pin<Box<dyn Future<Output = TaskOutput> + Send>>;
type ExecuteFn = dyn Fn() -> ExecuteFuture + Send + Sync;

/// Closure-backed task.
///
/// ```ignore
/// let task = FnTask::builder("fetch")
///     .priority(2)
///     .execute(|| async { Ok(serde_json::json!({ "data": "fetched" })) })
///     .build()?;
/// scheduler.add(task)?;
/// ```
#[derive(Clone)]
pub struct FnTask {
    id: TaskId,
    priority: Option<i64>,
    execute: Arc<ExecuteFn>,
}

impl FnTask {
    pub fn builder(id: impl Into<TaskId>) -> FnTaskBuilder {
        FnTaskBuilder {
            id: id.into(),
            priority: None,
            execute: None,
        }
    }
}

impl fmt::Debug for FnTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTask")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Task for FnTask {
    fn id(&self) -> &TaskId {
        &self.id
    }

    fn priority(&self) -> Option<i64> {
        self.priority
    }

    async fn execute(&self) -> TaskOutput {
        (self.execute)().await
    }
}

pub struct FnTaskBuilder {
    id: TaskId,
    priority: Option<i64>,
    execute: Option<Arc<ExecuteFn>>,
}

impl FnTaskBuilder {
    pub fn priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn execute<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = TaskOutput> + Send + 'static,
    {
        let execute: Arc<ExecuteFn> = Arc::new(move || -> ExecuteFuture { Box::pin(f()) });
        self.execute = Some(execute);
        self
    }

    /// Fails with `InvalidTask` when no body was supplied.
    pub fn build(self) -> Result<FnTask, QueueError> {
        let execute = self.execute.ok_or_else(|| {
            QueueError::InvalidTask(format!("task {} has no execute function", self.id))
        })?;
        Ok(FnTask {
            id: self.id,
            priority: self.priority,
            execute,
        })
    }
}

/// Text reported for a failed execution: the error's message, or its debug
/// rendering when the message is blank.
pub fn describe_failure(err: &(dyn std::error::Error + Send + Sync)) -> String {
    let message = err.to_string();
    if message.trim().is_empty() {
        format!("{err:?}")
    } else {
        message
    }
}
