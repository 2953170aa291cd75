//! Binds persisted tasks to the strategy for their kind

use crate::clock::Clock;
use crate::github::GitHubClient;
use crate::storage::SharedStorage;
use crate::task::kinds::{
    Harvest, PullDetailHarvest, PullListHarvest, RepositoryHarvest, ReviewCommentHarvest,
    ReviewHarvest, UserHarvest, UserSource,
};
use crate::task::{Task, TaskKind, TaskRunner};
use std::sync::Arc;

/// Builds a [`TaskRunner`] for any task
///
/// The match over [`TaskKind`] is exhaustive, so a new kind does not compile
/// until it has a strategy.
#[derive(Clone)]
pub struct TaskFactory {
    storage: SharedStorage,
    client: GitHubClient,
    clock: Arc<dyn Clock>,
}

impl TaskFactory {
    pub fn new(storage: SharedStorage, client: GitHubClient, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            client,
            clock,
        }
    }

    pub fn build(&self, task: Task) -> TaskRunner {
        let client = self.client.clone();
        let storage = self.storage.clone();

        let harvest = match task.kind {
            TaskKind::All => Harvest::PullList(PullListHarvest::new(client, storage)),
            TaskKind::PullRequests => {
                Harvest::PullDetails(PullDetailHarvest::new(client, storage))
            }
            TaskKind::Reviews => Harvest::Reviews(ReviewHarvest::new(client, storage)),
            TaskKind::ReviewComments => {
                Harvest::ReviewComments(ReviewCommentHarvest::new(client, storage))
            }
            TaskKind::UsersPulls => {
                Harvest::Users(UserHarvest::new(client, storage, UserSource::Pulls))
            }
            TaskKind::UsersReviews => {
                Harvest::Users(UserHarvest::new(client, storage, UserSource::Reviews))
            }
            TaskKind::UsersReviewComments => Harvest::Users(UserHarvest::new(
                client,
                storage,
                UserSource::ReviewComments,
            )),
            TaskKind::Repository => Harvest::Repository(RepositoryHarvest::new(
                client,
                storage,
                self.clock.clone(),
            )),
        };

        TaskRunner::new(task, self.storage.clone(), self.clock.clone(), harvest)
    }
}
