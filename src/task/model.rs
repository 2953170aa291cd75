//! Task definitions for the checkpointed harvest
//!
//! A task is one persisted unit of harvesting work for an
//! `(owner, repository, kind)` triple, carrying the cursors it needs to
//! resume after a crash or a throttling pause.
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// The kind of harvesting work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TaskKind {
    /// Main task: lists every pull request of the repository
    All,

    /// Fetches the full detail of each known pull request
    PullRequests,

    /// Fetches the reviews of each known pull request
    Reviews,

    /// Fetches the review comments of each known pull request
    ReviewComments,

    /// Refreshes the users referenced by pull requests
    UsersPulls,

    /// Refreshes the users who wrote reviews
    UsersReviews,

    /// Refreshes the users who wrote review comments
    UsersReviewComments,

    /// Fetches repository metadata and recomputes its counters
    Repository,
}

impl TaskKind {
    /// Subtasks spawned with every main task, in creation (and therefore
    /// execution) order
    pub const SUBTASKS: [TaskKind; 7] = [
        Self::PullRequests,
        Self::Reviews,
        Self::ReviewComments,
        Self::UsersPulls,
        Self::UsersReviews,
        Self::UsersReviewComments,
        Self::Repository,
    ];

    /// Returns true for the main task of a harvest generation
    pub fn is_main(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Converts the kind to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::PullRequests => "PULL_REQUESTS",
            Self::Reviews => "REVIEWS",
            Self::ReviewComments => "REVIEW_COMMENTS",
            Self::UsersPulls => "USERS_PULLS",
            Self::UsersReviews => "USERS_REVIEWS",
            Self::UsersReviewComments => "USERS_REVIEW_COMMENTS",
            Self::Repository => "REPOSITORY",
        }
    }

    /// Parses a kind from its database string representation
    ///
    /// Returns None if the string doesn't match any known kind.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "ALL" => Some(Self::All),
            "PULL_REQUESTS" => Some(Self::PullRequests),
            "REVIEWS" => Some(Self::Reviews),
            "REVIEW_COMMENTS" => Some(Self::ReviewComments),
            "USERS_PULLS" => Some(Self::UsersPulls),
            "USERS_REVIEWS" => Some(Self::UsersReviews),
            "USERS_REVIEW_COMMENTS" => Some(Self::UsersReviewComments),
            "REPOSITORY" => Some(Self::Repository),
            _ => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A persisted unit of harvesting work
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    pub id: i64,
    pub kind: TaskKind,
    pub owner: String,
    pub repository: String,
    pub is_completed: bool,
    pub creation_date: DateTime<Utc>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,

    /// Cursor into the remote paginated API
    pub current_page: u32,

    /// Cursor into the locally stored collection being iterated
    pub last_processed: i64,

    /// Owning main task (subtasks only)
    pub parent: Option<i64>,
}

impl Task {
    /// Id of the main task of this task's harvest generation
    ///
    /// Used as the dedup scope for user refreshes and as the removal scope
    /// when the remote target disappears.
    pub fn family_id(&self) -> i64 {
        self.parent.unwrap_or(self.id)
    }

    /// `owner/repository` for log lines
    pub fn target(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} {}", self.id, self.kind, self.target())
    }
}
