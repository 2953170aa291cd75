//! Task manager - the single-worker scheduling loop
//!
//! The manager owns the current task and the blocking error, if any:
//! - `Idle`: nothing pending
//! - `Running`: a task is being run
//! - `Blocked`: the last run failed and `continue_at` has not elapsed yet
//!
//! Completion chains straight into the next pending task. A failure is
//! classified by [`TaskManager::handle_failure`]; the retry deadline it sets
//! is only honoured by [`TaskManager::tick`], so tests drive time through a
//! [`ManualClock`](crate::clock::ManualClock) instead of sleeping.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::github::GitHubClient;
use crate::scheduler::{ManagerStatus, SchedulerError};
use crate::storage::{open_storage, shared, with_storage, SharedStorage, StorageResult};
use crate::task::{RunOutcome, Task, TaskFactory, TaskFailure};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

/// Status code recorded for local persistence failures
const STORAGE_FAILURE_CODE: u16 = 503;

/// What the manager does after classifying a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Disposition {
    /// Run the next pending task right away
    Advance,
    /// Wait for the recorded `continue_at`
    Block,
}

pub struct TaskManager {
    storage: SharedStorage,
    client: GitHubClient,
    factory: TaskFactory,
    clock: Arc<dyn Clock>,
    retry_delay: Duration,
    current: Option<Task>,
    error: Option<SchedulerError>,
    status_tx: watch::Sender<ManagerStatus>,
}

impl TaskManager {
    pub fn new(
        storage: SharedStorage,
        client: GitHubClient,
        clock: Arc<dyn Clock>,
        retry_delay: Duration,
    ) -> Self {
        let factory = TaskFactory::new(storage.clone(), client.clone(), clock.clone());
        let (status_tx, _) = watch::channel(ManagerStatus::Idle);

        Self {
            storage,
            client,
            factory,
            clock,
            retry_delay,
            current: None,
            error: None,
            status_tx,
        }
    }

    /// Opens the configured database and builds a manager on the system clock
    pub fn from_config(config: &Config) -> crate::Result<Self> {
        let storage = shared(open_storage(Path::new(&config.storage.database_path))?);
        let client = GitHubClient::new(&config.github)?;
        let retry_delay = Duration::seconds(config.scheduler.retry_delay_secs as i64);

        Ok(Self::new(storage, client, Arc::new(SystemClock), retry_delay))
    }

    /// Schedules a harvest of `owner/repository`
    ///
    /// Returns true when a harvest for the pair is already pending, or when a
    /// new task family was persisted. Returns false when the repository could
    /// not be confirmed to exist or the family could not be stored.
    pub async fn create_task(&mut self, owner: &str, repository: &str) -> bool {
        match with_storage(&self.storage, |s| s.find_pending_task(owner, repository)) {
            Ok(Some(task)) => {
                tracing::info!(
                    "{}/{} already has pending task {}",
                    owner,
                    repository,
                    task.id
                );
                return true;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Failed to look up tasks for {}/{}: {}", owner, repository, e);
                return false;
            }
        }

        let remote = match self.client.find_repository(owner, repository).await {
            Ok(Some(remote)) => remote,
            Ok(None) => {
                tracing::warn!("Repository {}/{} does not exist", owner, repository);
                return false;
            }
            Err(e) => {
                tracing::warn!("Could not check {}/{}: {}", owner, repository, e);
                return false;
            }
        };

        // Key tasks by the names as GitHub spells them
        let (owner, repository) = (remote.owner.login.as_str(), remote.name.as_str());

        let now = self.clock.now();
        let main = match with_storage(&self.storage, |s| {
            s.insert_task_family(owner, repository, now)
        }) {
            Ok(main) => main,
            Err(e) => {
                tracing::error!("Failed to create tasks for {}/{}: {}", owner, repository, e);
                return false;
            }
        };
        tracing::info!("Created harvest {} for {}/{}", main.id, owner, repository);

        if self.current.is_none() && self.error.is_none() {
            self.advance().await;
        }

        true
    }

    /// Starts driving the queue unless the manager is blocked
    pub async fn start(&mut self) {
        if self.error.is_none() {
            self.advance().await;
        }
    }

    /// Retries once the blocking deadline has elapsed
    ///
    /// Returns true if the deadline had elapsed and the queue was driven again.
    pub async fn tick(&mut self) -> bool {
        let due = self
            .error
            .as_ref()
            .is_some_and(|e| self.clock.now() >= e.continue_at);

        if due {
            tracing::info!("Retry deadline reached, resuming");
            self.error = None;
            self.advance().await;
        }
        due
    }

    /// Drives the queue until no task is pending, sleeping through every block
    pub async fn run(&mut self) {
        self.start().await;

        while let Some(deadline) = self.continue_at() {
            let wait = (deadline - self.clock.now()).to_std().unwrap_or_default();
            tracing::info!(
                "Waiting {}s until {}",
                wait.as_secs(),
                deadline.to_rfc3339()
            );
            tokio::time::sleep(wait).await;
            self.tick().await;
        }
    }

    /// Current status, also published to [`subscribe`](Self::subscribe) receivers
    pub fn status(&self) -> ManagerStatus {
        self.status_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ManagerStatus> {
        self.status_tx.subscribe()
    }

    /// When the manager resumes after a failure, if it is blocked
    pub fn continue_at(&self) -> Option<DateTime<Utc>> {
        self.error.as_ref().map(|e| e.continue_at)
    }

    pub fn current_task(&self) -> Option<&Task> {
        self.current.as_ref()
    }

    pub fn pending_tasks(&self, page: u32) -> StorageResult<Vec<Task>> {
        with_storage(&self.storage, |s| s.list_tasks(true, page))
    }

    pub fn all_tasks(&self, page: u32) -> StorageResult<Vec<Task>> {
        with_storage(&self.storage, |s| s.list_tasks(false, page))
    }

    /// Runs pending tasks oldest first until the queue is empty or a task fails
    async fn advance(&mut self) {
        loop {
            let next = match with_storage(&self.storage, |s| s.find_next_task()) {
                Ok(Some(task)) => task,
                Ok(None) => {
                    tracing::info!("No tasks pending");
                    self.current = None;
                    self.error = None;
                    self.publish();
                    return;
                }
                Err(e) => {
                    self.block(STORAGE_FAILURE_CODE, e.to_string(), self.retry_at());
                    return;
                }
            };

            self.current = Some(next.clone());
            self.publish();

            let outcome = self.factory.build(next.clone()).run().await;
            if let RunOutcome::Failed(failure) = outcome {
                if self.handle_failure(&next, failure) == Disposition::Block {
                    return;
                }
            }
        }
    }

    /// Applies the retry or removal policy to a failed task
    pub(crate) fn handle_failure(&mut self, task: &Task, failure: TaskFailure) -> Disposition {
        match failure {
            TaskFailure::Storage(e) => {
                self.block(STORAGE_FAILURE_CODE, e.to_string(), self.retry_at());
                Disposition::Block
            }
            TaskFailure::Remote(e) if e.is_not_found() => {
                let family = task.family_id();
                match with_storage(&self.storage, |s| s.remove_task_family(family)) {
                    Ok(removed) => {
                        tracing::warn!(
                            "{} is gone ({}), removed {} tasks of harvest {}",
                            task.target(),
                            e,
                            removed,
                            family
                        );
                        self.current = None;
                        self.error = None;
                        Disposition::Advance
                    }
                    Err(storage) => {
                        self.block(STORAGE_FAILURE_CODE, storage.to_string(), self.retry_at());
                        Disposition::Block
                    }
                }
            }
            TaskFailure::Remote(e) if e.status() == Some(403) => {
                let continue_at = e.rate_limit_reset().unwrap_or_else(|| self.retry_at());
                self.block(403, e.to_string(), continue_at);
                Disposition::Block
            }
            TaskFailure::Remote(e) => {
                self.block(e.code(), e.to_string(), self.retry_at());
                Disposition::Block
            }
        }
    }

    fn retry_at(&self) -> DateTime<Utc> {
        self.clock.now() + self.retry_delay
    }

    fn block(&mut self, code: u16, message: String, continue_at: DateTime<Utc>) {
        tracing::warn!(
            "Blocked with {} until {}: {}",
            code,
            continue_at.to_rfc3339(),
            message
        );
        self.current = None;
        self.error = Some(SchedulerError {
            code,
            message,
            continue_at,
        });
        self.publish();
    }

    fn publish(&self) {
        let status = match (&self.error, &self.current) {
            (Some(error), _) => ManagerStatus::Blocked {
                error: error.clone(),
            },
            (None, Some(task)) => ManagerStatus::Running { task: task.clone() },
            (None, None) => ManagerStatus::Idle,
        };
        self.status_tx.send_replace(status);
    }
}
