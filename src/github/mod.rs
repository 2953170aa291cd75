//! Remote API module
//!
//! This module wraps the GitHub REST endpoints the harvester consumes:
//! - Repository metadata (also used as the existence check)
//! - Pull request listing and detail
//! - Reviews and review comments per pull request
//! - User profiles

mod client;
mod types;

pub use client::{GitHubClient, RateLimit, RemoteError};
pub use types::{BranchRef, Page, PullRequest, Repository, Review, ReviewComment, User, UserRef};
