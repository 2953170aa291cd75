//! Shared task lifecycle
//!
//! Every task, whatever its kind, goes through the same steps:
//!
//! 1. `start_task`: stamp `start_date` on the first attempt and persist
//! 2. kind-specific iteration, persisting a checkpoint after every item
//! 3. `complete_task`: stamp `end_date`, mark completed and persist
//!
//! A failure at any step ends the run early with the checkpoint left at its
//! last persisted value. Nothing escapes [`TaskRunner::run`]; the outcome is
//! always a [`RunOutcome`].

use crate::clock::Clock;
use crate::github::RemoteError;
use crate::storage::{with_storage, SharedStorage, StorageError, StorageResult};
use crate::task::kinds::Harvest;
use crate::task::Task;
use std::sync::Arc;
use thiserror::Error;

/// Classified failure of a task run
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("remote failure: {0}")]
    Remote(#[from] RemoteError),
}

/// Result of running a task
#[derive(Debug)]
pub enum RunOutcome {
    Completed,
    Failed(TaskFailure),
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Resume cursors of the running task, persisted on every move
pub struct Checkpoint<'a> {
    task: &'a mut Task,
    storage: &'a SharedStorage,
}

impl<'a> Checkpoint<'a> {
    pub fn new(task: &'a mut Task, storage: &'a SharedStorage) -> Self {
        Self { task, storage }
    }

    pub fn task(&self) -> &Task {
        &*self.task
    }

    /// `(owner, repository)` of the task
    pub fn target(&self) -> (String, String) {
        (self.task.owner.clone(), self.task.repository.clone())
    }

    pub fn current_page(&self) -> u32 {
        self.task.current_page
    }

    pub fn last_processed(&self) -> i64 {
        self.task.last_processed
    }

    /// Records that the remote cursor moved to `page` within the current item
    pub fn save_page(&mut self, page: u32) -> StorageResult<()> {
        self.task.current_page = page;
        self.persist()
    }

    /// Records that the local item keyed `key` is fully processed
    ///
    /// The remote cursor goes back to 1 for the next item. Keys lower than the
    /// stored cursor are ignored so the cursor never moves backwards.
    pub fn save_processed(&mut self, key: i64) -> StorageResult<()> {
        self.task.last_processed = self.task.last_processed.max(key);
        self.task.current_page = 1;
        self.persist()
    }

    fn persist(&mut self) -> StorageResult<()> {
        persist_task(self.storage, &*self.task)
    }
}

fn persist_task(storage: &SharedStorage, task: &Task) -> StorageResult<()> {
    let affected = with_storage(storage, |s| s.update_task(task))?;
    if affected == 0 {
        return Err(StorageError::TaskNotFound(task.id));
    }
    Ok(())
}

/// A task bound to the strategy for its kind
pub struct TaskRunner {
    task: Task,
    storage: SharedStorage,
    clock: Arc<dyn Clock>,
    harvest: Harvest,
}

impl TaskRunner {
    pub fn new(task: Task, storage: SharedStorage, clock: Arc<dyn Clock>, harvest: Harvest) -> Self {
        Self {
            task,
            storage,
            clock,
            harvest,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Runs the task to completion or to its first failure
    pub async fn run(mut self) -> RunOutcome {
        tracing::info!(
            "Running task {} (page {}, after {})",
            self.task,
            self.task.current_page,
            self.task.last_processed
        );

        if let Err(e) = self.start_task() {
            return RunOutcome::Failed(e.into());
        }

        let result = {
            let mut checkpoint = Checkpoint::new(&mut self.task, &self.storage);
            self.harvest.execute(&mut checkpoint).await
        };

        if let Err(failure) = result {
            tracing::warn!("Task {} failed: {}", self.task, failure);
            return RunOutcome::Failed(failure);
        }

        match self.complete_task() {
            Ok(()) => {
                tracing::info!("Task {} completed", self.task);
                RunOutcome::Completed
            }
            Err(e) => RunOutcome::Failed(e.into()),
        }
    }

    fn start_task(&mut self) -> StorageResult<()> {
        if self.task.start_date.is_none() {
            self.task.start_date = Some(self.clock.now());
        }
        persist_task(&self.storage, &self.task)
    }

    fn complete_task(&mut self) -> StorageResult<()> {
        let now = self.clock.now();
        // end_date never precedes start_date, even if the clock went backwards
        let end = self.task.start_date.map_or(now, |start| start.max(now));
        self.task.end_date = Some(end);
        self.task.is_completed = true;
        persist_task(&self.storage, &self.task)
    }
}
