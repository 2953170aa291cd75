use crate::github::GitHubClient;
use crate::paging::page_count;
use crate::storage::{with_storage, PullRequestRecord, SharedStorage};
use crate::task::runner::{Checkpoint, TaskFailure};

/// Fetches the full detail of each locally known pull request
pub struct PullDetailHarvest {
    client: GitHubClient,
    storage: SharedStorage,
}

impl PullDetailHarvest {
    pub fn new(client: GitHubClient, storage: SharedStorage) -> Self {
        Self { client, storage }
    }

    pub async fn execute(&self, checkpoint: &mut Checkpoint<'_>) -> Result<(), TaskFailure> {
        let (owner, repo) = checkpoint.target();
        let after = checkpoint.last_processed();

        let total = with_storage(&self.storage, |s| s.count_pull_requests(&owner, &repo, after))?;
        tracing::debug!("{}/{}: {} pull requests to detail", owner, repo, total);

        for page in 1..=page_count(total) {
            let pulls =
                with_storage(&self.storage, |s| s.pull_requests_after(&owner, &repo, after, page))?;

            for pull in pulls {
                let detail = self
                    .client
                    .get_pull_request(&owner, &repo, pull.number)
                    .await?;
                let record = PullRequestRecord::from_api(&owner, &repo, &detail);
                with_storage(&self.storage, |s| s.upsert_pull_request(&record))?;

                checkpoint.save_processed(pull.number)?;
            }
        }

        Ok(())
    }
}
