//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - The task repository (checkpointed units of work)
//! - Harvested repositories, pull requests, reviews, review comments and users
//! - Aggregate counts used to derive statistics

mod records;
mod schema;
mod sqlite;
mod traits;

pub use records::{
    PullRequestRecord, RepositoryRecord, ReviewCommentRecord, ReviewRecord, UserRecord, UserStats,
};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage handle shared by the task manager and the running task
///
/// Only one task runs at a time, so the lock is uncontended; it is never held
/// across an `.await`.
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing between the manager and runners
pub fn shared<S: Storage + Send + 'static>(storage: S) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Runs `f` with exclusive access to the shared storage
pub fn with_storage<T>(
    storage: &SharedStorage,
    f: impl FnOnce(&mut dyn Storage) -> StorageResult<T>,
) -> StorageResult<T> {
    let mut guard = storage.lock().map_err(|_| StorageError::Poisoned)?;
    f(&mut *guard)
}
