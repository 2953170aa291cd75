use crate::github::GitHubClient;
use crate::paging::page_count;
use crate::storage::{with_storage, SharedStorage, UserRecord};
use crate::task::runner::{Checkpoint, TaskFailure};

/// Local collection whose referenced logins a user task resolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSource {
    /// Pull request author, base-branch user and head-branch user
    Pulls,
    /// Review authors
    Reviews,
    /// Review comment authors
    ReviewComments,
}

/// Fetches the users referenced by a local collection, at most once per
/// harvest generation, and recomputes their statistics
pub struct UserHarvest {
    client: GitHubClient,
    storage: SharedStorage,
    source: UserSource,
}

impl UserHarvest {
    pub fn new(client: GitHubClient, storage: SharedStorage, source: UserSource) -> Self {
        Self {
            client,
            storage,
            source,
        }
    }

    pub async fn execute(&self, checkpoint: &mut Checkpoint<'_>) -> Result<(), TaskFailure> {
        let (owner, repo) = checkpoint.target();
        let after = checkpoint.last_processed();
        let generation = checkpoint.task().family_id();

        let total = with_storage(&self.storage, |s| match self.source {
            UserSource::Pulls => s.count_pull_requests(&owner, &repo, after),
            UserSource::Reviews => s.count_reviews(&owner, &repo, after),
            UserSource::ReviewComments => s.count_review_comments(&owner, &repo, after),
        })?;
        tracing::debug!(
            "{}/{}: resolving users of {} {:?} items",
            owner,
            repo,
            total,
            self.source
        );

        for page in 1..=page_count(total) {
            let items = self.load_page(&owner, &repo, after, page)?;

            for (key, logins) in items {
                for login in logins {
                    self.ensure_user(&login, generation).await?;
                }
                checkpoint.save_processed(key)?;
            }
        }

        Ok(())
    }

    /// One local page as `(cursor key, referenced logins)` pairs
    fn load_page(
        &self,
        owner: &str,
        repo: &str,
        after: i64,
        page: u32,
    ) -> Result<Vec<(i64, Vec<String>)>, TaskFailure> {
        let items: Vec<(i64, Vec<String>)> = with_storage(&self.storage, |s| {
            Ok(match self.source {
                UserSource::Pulls => s
                    .pull_requests_after(owner, repo, after, page)?
                    .into_iter()
                    .map(|pr| (pr.number, pr.referenced_logins()))
                    .collect(),
                UserSource::Reviews => s
                    .reviews_after(owner, repo, after, page)?
                    .into_iter()
                    .map(|r| (r.id, r.user_login.into_iter().collect()))
                    .collect(),
                UserSource::ReviewComments => s
                    .review_comments_after(owner, repo, after, page)?
                    .into_iter()
                    .map(|c| (c.id, c.user_login.into_iter().collect()))
                    .collect(),
            })
        })?;
        Ok(items)
    }

    async fn ensure_user(&self, login: &str, generation: i64) -> Result<(), TaskFailure> {
        let known = with_storage(&self.storage, |s| s.get_user(login))?;

        if known.map_or(true, |u| !u.is_fresh_for(generation)) {
            let user = self.client.get_user(login).await?;
            let record = UserRecord::from_api(&user, generation);
            with_storage(&self.storage, |s| s.upsert_user(&record))?;
            tracing::debug!("Fetched user {}", login);
        }

        let stats = with_storage(&self.storage, |s| s.refresh_user_stats(login))?;
        tracing::trace!(
            "{}: {} pull requests, {} reviews, {} review comments",
            login,
            stats.pull_requests,
            stats.total_reviews(),
            stats.review_comments
        );

        Ok(())
    }
}
