//! conveyor-core
//!
//! In-process task scheduler: accepts asynchronous tasks, runs at most N at
//! once, optionally orders them by priority, retries failures within a
//! budget, and reports each task's terminal outcome to observers.
//!
//! # Modules
//! - **domain**: task ids, the `Task` contract, terminal `TaskResult`s
//! - **queue**: per-item state, retry policy, pending-work ordering
//! - **scheduler**: lifecycle, admission/dispatch, execution and retry
//! - **observability**: status snapshots, stats, completion observers
//! - **config**: `QueueConfig` (serde, validated at construction)
//!
//! ```ignore
//! let scheduler = Scheduler::new(QueueConfig::new(2).with_max_retries(1))?;
//! scheduler.on_task_complete(|r| println!("Task {} {} in {}ms", r.id, r.status, r.duration_ms));
//! scheduler.add(FnTask::builder("fetch").execute(|| async { Ok(json!("ok")) }).build()?)?;
//! scheduler.start();
//! scheduler.wait_idle().await;
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod queue;
pub mod scheduler;

pub use config::{QueueConfig, RetryPlacement};
pub use domain::{FnTask, Task, TaskError, TaskId, TaskOutput, TaskResult, TaskStatus};
pub use error::QueueError;
pub use observability::{ObserverId, QueueStatus, SchedulerStats};
pub use scheduler::{Lifecycle, Scheduler};
