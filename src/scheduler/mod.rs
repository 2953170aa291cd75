//! Task manager
//!
//! Drives the task queue one task at a time: picks the oldest pending task,
//! runs it, and on failure applies the retry or removal policy.

mod manager;
mod status;

pub use manager::TaskManager;
pub use status::{ManagerStatus, SchedulerError};
