//! Checkpointed units of harvesting work
//!
//! This module handles everything about a single task:
//! - The persisted [`Task`] model and its [`TaskKind`]
//! - The shared run lifecycle and checkpoint discipline ([`TaskRunner`])
//! - One harvesting strategy per kind, chosen by [`TaskFactory`]

mod factory;
pub mod kinds;
mod model;
mod runner;

pub use factory::TaskFactory;
pub use model::{Task, TaskKind};
pub use runner::{Checkpoint, RunOutcome, TaskFailure, TaskRunner};
