//! Observable state of the task manager

use crate::task::Task;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The blocking condition recorded after a failed task
///
/// Only one is tracked at a time; a newer failure replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerError {
    pub code: u16,
    pub message: String,
    /// Earliest time the manager retries
    pub continue_at: DateTime<Utc>,
}

impl fmt::Display for SchedulerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "error {}: {} (continuing at {})",
            self.code,
            self.message,
            self.continue_at.to_rfc3339()
        )
    }
}

/// What the manager is doing right now
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ManagerStatus {
    /// No pending task and no error
    Idle,
    /// A task is current
    Running { task: Task },
    /// Waiting for `continue_at` after a failure
    Blocked { error: SchedulerError },
}

impl ManagerStatus {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn error(&self) -> Option<&SchedulerError> {
        match self {
            Self::Blocked { error } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for ManagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("no tasks pending"),
            Self::Running { task } => write!(f, "running {}", task),
            Self::Blocked { error } => write!(f, "blocked: {}", error),
        }
    }
}
