use crate::github::GitHubClient;
use crate::storage::{with_storage, PullRequestRecord, SharedStorage};
use crate::task::runner::{Checkpoint, TaskFailure};

/// Main task: lists every pull request of the repository, oldest first,
/// and stores their summaries
pub struct PullListHarvest {
    client: GitHubClient,
    storage: SharedStorage,
}

impl PullListHarvest {
    pub fn new(client: GitHubClient, storage: SharedStorage) -> Self {
        Self { client, storage }
    }

    pub async fn execute(&self, checkpoint: &mut Checkpoint<'_>) -> Result<(), TaskFailure> {
        let (owner, repo) = checkpoint.target();
        let mut page = checkpoint.current_page();

        loop {
            let batch = self.client.list_pull_requests(&owner, &repo, page).await?;

            let records: Vec<PullRequestRecord> = batch
                .items
                .iter()
                .map(|pr| PullRequestRecord::from_api(&owner, &repo, pr))
                .collect();
            with_storage(&self.storage, |s| {
                records.iter().try_for_each(|r| s.upsert_pull_request(r))
            })?;

            tracing::debug!(
                "{}/{}: stored {} pull requests from page {}",
                owner,
                repo,
                records.len(),
                page
            );

            match batch.next_page {
                // A next link that does not move forward would loop forever
                Some(next) if next > page => {
                    checkpoint.save_page(next)?;
                    page = next;
                }
                _ => return Ok(()),
            }
        }
    }
}
