use crate::clock::Clock;
use crate::github::GitHubClient;
use crate::storage::{with_storage, RepositoryRecord, SharedStorage};
use crate::task::runner::{Checkpoint, TaskFailure};
use std::sync::Arc;

/// Fetches repository metadata and recomputes its counters from what has
/// been harvested locally
pub struct RepositoryHarvest {
    client: GitHubClient,
    storage: SharedStorage,
    clock: Arc<dyn Clock>,
}

impl RepositoryHarvest {
    pub fn new(client: GitHubClient, storage: SharedStorage, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            storage,
            clock,
        }
    }

    pub async fn execute(&self, checkpoint: &mut Checkpoint<'_>) -> Result<(), TaskFailure> {
        let (owner, name) = checkpoint.target();
        let remote = self.client.get_repository(&owner, &name).await?;

        let mut record = RepositoryRecord::from_api(&owner, &name, &remote, self.clock.now());
        with_storage(&self.storage, |s| {
            record.pull_request_count = s.count_pull_requests(&owner, &name, 0)?;
            record.review_count = s.count_reviews(&owner, &name, 0)?;
            record.review_comment_count = s.count_review_comments(&owner, &name, 0)?;
            s.upsert_repository(&record)
        })?;

        tracing::info!(
            "{}: {} pull requests, {} reviews, {} review comments",
            remote.full_name,
            record.pull_request_count,
            record.review_count,
            record.review_comment_count
        );

        Ok(())
    }
}
