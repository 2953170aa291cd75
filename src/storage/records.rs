//! Locally stored entities
//!
//! Records are keyed the way the task runners iterate them: pull requests by
//! `(owner, repository, number)`, reviews and review comments by their remote
//! id, users by login.

use crate::github::{PullRequest, Repository, Review, ReviewComment, User};
use chrono::{DateTime, Utc};

/// Represents a repository in the database
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryRecord {
    pub owner: String,
    pub name: String,
    pub id: i64,
    pub full_name: String,
    pub description: Option<String>,
    pub language: Option<String>,
    pub default_branch: Option<String>,
    pub stargazers_count: i64,
    pub forks_count: i64,
    pub open_issues_count: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pull_request_count: u64,
    pub review_count: u64,
    pub review_comment_count: u64,
    pub harvested_at: DateTime<Utc>,
}

impl RepositoryRecord {
    /// Builds the record under the task's `(owner, name)` key; counters start at zero
    pub fn from_api(owner: &str, name: &str, repo: &Repository, harvested_at: DateTime<Utc>) -> Self {
        Self {
            owner: owner.to_string(),
            name: name.to_string(),
            id: repo.id,
            full_name: repo.full_name.clone(),
            description: repo.description.clone(),
            language: repo.language.clone(),
            default_branch: repo.default_branch.clone(),
            stargazers_count: repo.stargazers_count,
            forks_count: repo.forks_count,
            open_issues_count: repo.open_issues_count,
            created_at: repo.created_at,
            updated_at: repo.updated_at,
            pull_request_count: 0,
            review_count: 0,
            review_comment_count: 0,
            harvested_at,
        }
    }
}

/// Represents a pull request in the database
///
/// Detail fields stay `None` until the pull request has been fetched
/// individually; upserting a summary never erases them.
#[derive(Debug, Clone, PartialEq)]
pub struct PullRequestRecord {
    pub id: i64,
    pub owner: String,
    pub repository: String,
    pub number: i64,
    pub state: String,
    pub title: String,
    pub body: Option<String>,
    pub user_login: Option<String>,
    pub base_ref: String,
    pub base_user_login: Option<String>,
    pub head_ref: String,
    pub head_user_login: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub merged_at: Option<DateTime<Utc>>,
    pub merged: Option<bool>,
    pub comments: Option<i64>,
    pub review_comments: Option<i64>,
    pub commits: Option<i64>,
    pub additions: Option<i64>,
    pub deletions: Option<i64>,
    pub changed_files: Option<i64>,
    /// Locally harvested review count
    pub review_count: u64,
    /// Locally harvested review comment count
    pub review_comment_count: u64,
}

impl PullRequestRecord {
    pub fn from_api(owner: &str, repository: &str, pr: &PullRequest) -> Self {
        Self {
            id: pr.id,
            owner: owner.to_string(),
            repository: repository.to_string(),
            number: pr.number,
            state: pr.state.clone(),
            title: pr.title.clone(),
            body: pr.body.clone(),
            user_login: pr.user.as_ref().map(|u| u.login.clone()),
            base_ref: pr.base.ref_name.clone(),
            base_user_login: pr.base.user.as_ref().map(|u| u.login.clone()),
            head_ref: pr.head.ref_name.clone(),
            head_user_login: pr.head.user.as_ref().map(|u| u.login.clone()),
            created_at: pr.created_at,
            updated_at: pr.updated_at,
            closed_at: pr.closed_at,
            merged_at: pr.merged_at,
            merged: pr.merged,
            comments: pr.comments,
            review_comments: pr.review_comments,
            commits: pr.commits,
            additions: pr.additions,
            deletions: pr.deletions,
            changed_files: pr.changed_files,
            review_count: 0,
            review_comment_count: 0,
        }
    }

    /// Every distinct login the pull request references: author, base and head users
    pub fn referenced_logins(&self) -> Vec<String> {
        let mut logins: Vec<String> = Vec::with_capacity(3);
        for login in [&self.user_login, &self.base_user_login, &self.head_user_login]
            .into_iter()
            .flatten()
        {
            if !logins.contains(login) {
                logins.push(login.clone());
            }
        }
        logins
    }
}

/// Represents a review in the database
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewRecord {
    pub id: i64,
    pub owner: String,
    pub repository: String,
    pub pull_number: i64,
    pub user_login: Option<String>,
    pub state: String,
    pub body: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

impl ReviewRecord {
    pub fn from_api(owner: &str, repository: &str, pull_number: i64, review: &Review) -> Self {
        Self {
            id: review.id,
            owner: owner.to_string(),
            repository: repository.to_string(),
            pull_number,
            user_login: review.user.as_ref().map(|u| u.login.clone()),
            state: review.state.clone(),
            body: review.body.clone(),
            submitted_at: review.submitted_at,
        }
    }
}

/// Represents a review comment in the database
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewCommentRecord {
    pub id: i64,
    pub owner: String,
    pub repository: String,
    pub pull_number: i64,
    pub review_id: Option<i64>,
    pub user_login: Option<String>,
    pub body: String,
    pub path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReviewCommentRecord {
    pub fn from_api(
        owner: &str,
        repository: &str,
        pull_number: i64,
        comment: &ReviewComment,
    ) -> Self {
        Self {
            id: comment.id,
            owner: owner.to_string(),
            repository: repository.to_string(),
            pull_number,
            review_id: comment.pull_request_review_id,
            user_login: comment.user.as_ref().map(|u| u.login.clone()),
            body: comment.body.clone(),
            path: comment.path.clone(),
            created_at: comment.created_at,
            updated_at: comment.updated_at,
        }
    }
}

/// Per-user statistics recomputed from local aggregates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub pull_requests: u64,
    pub reviews_approved: u64,
    pub reviews_changes_requested: u64,
    pub reviews_commented: u64,
    pub reviews_dismissed: u64,
    pub review_comments: u64,
}

impl UserStats {
    pub fn total_reviews(&self) -> u64 {
        self.reviews_approved
            + self.reviews_changes_requested
            + self.reviews_commented
            + self.reviews_dismissed
    }
}

/// Represents a user in the database
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub login: String,
    pub id: i64,
    pub name: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
    pub public_repos: i64,
    pub followers: i64,
    pub following: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Main task whose generation last refreshed this user from the remote API
    pub updated_on_task: Option<i64>,
    pub stats: UserStats,
}

impl UserRecord {
    pub fn from_api(user: &User, updated_on_task: i64) -> Self {
        Self {
            login: user.login.clone(),
            id: user.id,
            name: user.name.clone(),
            company: user.company.clone(),
            location: user.location.clone(),
            email: user.email.clone(),
            public_repos: user.public_repos,
            followers: user.followers,
            following: user.following,
            created_at: user.created_at,
            updated_at: user.updated_at,
            updated_on_task: Some(updated_on_task),
            stats: UserStats::default(),
        }
    }

    /// True when the user was already refreshed by the given harvest generation
    pub fn is_fresh_for(&self, main_task_id: i64) -> bool {
        self.updated_on_task == Some(main_task_id)
    }
}
