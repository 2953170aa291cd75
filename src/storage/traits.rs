//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    PullRequestRecord, RepositoryRecord, ReviewCommentRecord, ReviewRecord, UserRecord, UserStats,
};
use crate::task::Task;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Task not found: {0}")]
    TaskNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines every local persistence operation the task manager and
/// the task runners need. Listings are paginated with a fixed page size of
/// [`PAGE_SIZE`](crate::paging::PAGE_SIZE); `after` arguments are exclusive
/// lower bounds used to resume from a task's `last_processed` cursor.
pub trait Storage {
    // ===== Task Repository =====

    /// Atomically creates a main task plus one subtask per
    /// [`TaskKind::SUBTASKS`](crate::task::TaskKind::SUBTASKS) entry
    ///
    /// Either the whole family is persisted or nothing is.
    ///
    /// # Returns
    ///
    /// The persisted main task
    fn insert_task_family(
        &mut self,
        owner: &str,
        repository: &str,
        created_at: DateTime<Utc>,
    ) -> StorageResult<Task>;

    /// Gets a task by ID
    fn get_task(&self, task_id: i64) -> StorageResult<Option<Task>>;

    /// Persists a task's mutable fields
    ///
    /// # Returns
    ///
    /// The number of affected rows
    fn update_task(&mut self, task: &Task) -> StorageResult<usize>;

    /// Gets the oldest non-completed task, ordered by creation date then ID
    fn find_next_task(&self) -> StorageResult<Option<Task>>;

    /// Gets any non-completed task for the given target
    ///
    /// Owner and repository match case-insensitively, as GitHub names do.
    fn find_pending_task(&self, owner: &str, repository: &str) -> StorageResult<Option<Task>>;

    /// Lists tasks one page at a time (pages start at 1)
    fn list_tasks(&self, pending_only: bool, page: u32) -> StorageResult<Vec<Task>>;

    /// Gets a main task and its subtasks in creation order
    fn get_task_family(&self, family_id: i64) -> StorageResult<Vec<Task>>;

    /// Deletes a main task and all of its subtasks
    ///
    /// # Returns
    ///
    /// The number of deleted tasks
    fn remove_task_family(&mut self, family_id: i64) -> StorageResult<usize>;

    // ===== Repositories =====

    /// Inserts or replaces a repository record
    fn upsert_repository(&mut self, repository: &RepositoryRecord) -> StorageResult<()>;

    /// Gets a repository by its `(owner, name)` key
    fn get_repository(&self, owner: &str, name: &str) -> StorageResult<Option<RepositoryRecord>>;

    // ===== Pull Requests =====

    /// Inserts or updates a pull request
    ///
    /// Detail fields that are `None` in the record keep their stored value,
    /// and the locally derived counters are never overwritten.
    fn upsert_pull_request(&mut self, pull: &PullRequestRecord) -> StorageResult<()>;

    /// Gets a pull request by number
    fn get_pull_request(
        &self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> StorageResult<Option<PullRequestRecord>>;

    /// Counts pull requests with a number greater than `after`
    fn count_pull_requests(&self, owner: &str, repository: &str, after: i64)
        -> StorageResult<u64>;

    /// Lists pull requests with a number greater than `after`, by ascending number
    fn pull_requests_after(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
        page: u32,
    ) -> StorageResult<Vec<PullRequestRecord>>;

    /// Recomputes a pull request's review count from stored reviews
    fn refresh_pull_review_count(
        &mut self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> StorageResult<u64>;

    /// Recomputes a pull request's review comment count from stored comments
    fn refresh_pull_review_comment_count(
        &mut self,
        owner: &str,
        repository: &str,
        number: i64,
    ) -> StorageResult<u64>;

    // ===== Reviews =====

    /// Inserts or replaces a review
    fn upsert_review(&mut self, review: &ReviewRecord) -> StorageResult<()>;

    /// Counts reviews with an ID greater than `after`
    fn count_reviews(&self, owner: &str, repository: &str, after: i64) -> StorageResult<u64>;

    /// Lists reviews with an ID greater than `after`, by ascending ID
    fn reviews_after(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
        page: u32,
    ) -> StorageResult<Vec<ReviewRecord>>;

    // ===== Review Comments =====

    /// Inserts or replaces a review comment
    fn upsert_review_comment(&mut self, comment: &ReviewCommentRecord) -> StorageResult<()>;

    /// Counts review comments with an ID greater than `after`
    fn count_review_comments(&self, owner: &str, repository: &str, after: i64)
        -> StorageResult<u64>;

    /// Lists review comments with an ID greater than `after`, by ascending ID
    fn review_comments_after(
        &self,
        owner: &str,
        repository: &str,
        after: i64,
        page: u32,
    ) -> StorageResult<Vec<ReviewCommentRecord>>;

    // ===== Users =====

    /// Gets a user by login
    fn get_user(&self, login: &str) -> StorageResult<Option<UserRecord>>;

    /// Inserts or updates a user's profile, leaving its statistics untouched
    fn upsert_user(&mut self, user: &UserRecord) -> StorageResult<()>;

    /// Recomputes a user's statistics from stored pull requests, reviews
    /// and review comments
    fn refresh_user_stats(&mut self, login: &str) -> StorageResult<UserStats>;
}
