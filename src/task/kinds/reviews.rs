use crate::github::GitHubClient;
use crate::paging::page_count;
use crate::storage::{with_storage, ReviewRecord, SharedStorage};
use crate::task::runner::{Checkpoint, TaskFailure};

/// Fetches every review of each locally known pull request
///
/// Two cursors are in play: `last_processed` is the last pull request whose
/// reviews are complete, `current_page` is the remote review page reached
/// within the pull request being processed.
pub struct ReviewHarvest {
    client: GitHubClient,
    storage: SharedStorage,
}

impl ReviewHarvest {
    pub fn new(client: GitHubClient, storage: SharedStorage) -> Self {
        Self { client, storage }
    }

    pub async fn execute(&self, checkpoint: &mut Checkpoint<'_>) -> Result<(), TaskFailure> {
        let (owner, repo) = checkpoint.target();
        let after = checkpoint.last_processed();

        let total = with_storage(&self.storage, |s| s.count_pull_requests(&owner, &repo, after))?;

        for local_page in 1..=page_count(total) {
            let pulls = with_storage(&self.storage, |s| {
                s.pull_requests_after(&owner, &repo, after, local_page)
            })?;

            for pull in pulls {
                let mut page = checkpoint.current_page();
                loop {
                    let batch = self
                        .client
                        .list_reviews(&owner, &repo, pull.number, page)
                        .await?;

                    with_storage(&self.storage, |s| {
                        batch.items.iter().try_for_each(|review| {
                            s.upsert_review(&ReviewRecord::from_api(&owner, &repo, pull.number, review))
                        })
                    })?;

                    match batch.next_page {
                        Some(next) if next > page => {
                            checkpoint.save_page(next)?;
                            page = next;
                        }
                        _ => break,
                    }
                }

                let count = with_storage(&self.storage, |s| {
                    s.refresh_pull_review_count(&owner, &repo, pull.number)
                })?;
                tracing::debug!("{}/{}#{}: {} reviews", owner, repo, pull.number, count);

                checkpoint.save_processed(pull.number)?;
            }
        }

        Ok(())
    }
}
