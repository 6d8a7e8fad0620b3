//! Domain model: task ids, the task contract, and terminal outcome reports.

pub mod ids;
pub mod outcome;
pub mod task;

pub use ids::TaskId;
pub use outcome::{TaskResult, TaskStatus};
pub use task::{FnTask, FnTaskBuilder, Task, TaskError, TaskOutput, describe_failure};
