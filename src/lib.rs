//! Pull-Harvest: a resumable GitHub pull request harvester
//!
//! This crate harvests a repository's pull requests, reviews, review comments
//! and the users behind them into a local SQLite store. Work is split into
//! checkpointed tasks run one at a time, so a crash or a rate-limit pause
//! resumes exactly where it stopped.

pub mod clock;
pub mod config;
pub mod github;
pub mod paging;
pub mod scheduler;
pub mod storage;
pub mod task;

use thiserror::Error;

/// Main error type for Pull-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Remote API error: {0}")]
    Remote(#[from] github::RemoteError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Pull-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

// Re-export commonly used types
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use scheduler::{ManagerStatus, SchedulerError, TaskManager};
pub use task::{RunOutcome, Task, TaskKind};
