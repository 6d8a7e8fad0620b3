//! Lifecycle state gating admission.

use serde::{Deserialize, Serialize};

/// Scheduler lifecycle.
///
/// State transitions:
/// - Created -> (start) -> Active
/// - Active <-> (pause / resume) <-> Paused
/// - Created | Active | Paused -> (stop) -> Stopped
/// - Stopped | Paused -> (start) -> Active
///
/// Only `Active` admits new work. Nothing here touches in-flight tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    #[default]
    Created,
    Active,
    Paused,
    Stopped,
}

impl Lifecycle {
    pub fn admits(self) -> bool {
        matches!(self, Lifecycle::Active)
    }

    pub(crate) fn start(&mut self) {
        *self = Lifecycle::Active;
    }

    pub(crate) fn stop(&mut self) {
        *self = Lifecycle::Stopped;
    }

    pub(crate) fn pause(&mut self) {
        if *self == Lifecycle::Active {
            *self = Lifecycle::Paused;
        }
    }

    /// Returns true when admission is open again.
    pub(crate) fn resume(&mut self) -> bool {
        if *self == Lifecycle::Paused {
            *self = Lifecycle::Active;
        }
        self.admits()
    }
}
