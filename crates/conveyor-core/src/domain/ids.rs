//! Task identifiers.
//!
//! A `TaskId` is opaque to the scheduler: it is only carried through to the
//! completion report. Callers usually supply their own ("fetch-users",
//! "42"), but `TaskId::generate()` hands out a ULID-backed id when there is
//! no natural one. ULIDs sort by creation time, which keeps generated ids
//! readable in logs.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh id with a `task-` prefix.
    pub fn generate() -> Self {
        Self::from(Ulid::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self(format!("task-{ulid}"))
    }
}
