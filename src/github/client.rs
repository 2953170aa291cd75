//! HTTP client for the GitHub REST API
//!
//! This module handles all remote calls made by task runners, including:
//! - Building an HTTP client with the configured user agent and token
//! - Paging through collection endpoints via the `Link` header
//! - Reading rate-limit metadata from every response
//! - Classifying failures into [`RemoteError`]

use crate::config::GitHubConfig;
use crate::github::types::{Page, PullRequest, Repository, Review, ReviewComment, User};
use crate::paging::{next_page, PAGE_SIZE};
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors returned by the remote API
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("GitHub returned HTTP {status} for {url}: {message}")]
    Status {
        url: String,
        status: u16,
        message: String,
        /// When the rate-limit window resets, if the response said so
        rate_limit_reset: Option<DateTime<Utc>>,
    },

    #[error("Request to {url} failed: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Invalid API URL: {0}")]
    InvalidUrl(String),
}

impl RemoteError {
    /// HTTP status of the failure, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Status code reported to operators; failures without a response count as 500
    pub fn code(&self) -> u16 {
        self.status().unwrap_or(500)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn rate_limit_reset(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Status {
                rate_limit_reset, ..
            } => *rate_limit_reset,
            _ => None,
        }
    }
}

/// Rate-limit metadata carried by every GitHub response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: Option<u32>,
    pub reset: Option<DateTime<Utc>>,
}

impl RateLimit {
    /// Reads `x-ratelimit-remaining` and `x-ratelimit-reset` (epoch seconds)
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };

        Self {
            remaining: header("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset: header("x-ratelimit-reset")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        }
    }
}

/// GitHub REST client shared by all task runners
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: Client,
    base_url: Url,
}

impl GitHubClient {
    /// Builds a client from the `[github]` configuration section
    ///
    /// # Example
    ///
    /// ```no_run
    /// use pull_harvest::config::GitHubConfig;
    /// use pull_harvest::github::GitHubClient;
    ///
    /// let config = GitHubConfig {
    ///     api_url: "https://api.github.com".to_string(),
    ///     user_agent: "pull-harvest/1.0".to_string(),
    ///     token: None,
    /// };
    ///
    /// let client = GitHubClient::new(&config).unwrap();
    /// ```
    pub fn new(config: &GitHubConfig) -> Result<Self, RemoteError> {
        let base_url = Url::parse(&config.api_url)
            .map_err(|e| RemoteError::InvalidUrl(format!("{}: {}", config.api_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token) = config.resolved_token() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| RemoteError::InvalidUrl("token contains invalid characters".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|source| RemoteError::Transport {
                url: config.api_url.clone(),
                source,
            })?;

        Ok(Self { client, base_url })
    }

    /// Side-channel existence check used before a harvest is created
    ///
    /// Returns `Ok(None)` on 404 and an error for any other failure. The
    /// repository carries GitHub's canonical spelling of owner and name.
    pub async fn find_repository(
        &self,
        owner: &str,
        repo: &str,
    ) -> Result<Option<Repository>, RemoteError> {
        match self.get_repository(owner, repo).await {
            Ok(repository) => Ok(Some(repository)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<Repository, RemoteError> {
        let url = self.endpoint(&["repos", owner, repo])?;
        Ok(self.get_json(url).await?.0)
    }

    /// Lists pull requests in creation order, oldest first
    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        page: u32,
    ) -> Result<Page<PullRequest>, RemoteError> {
        let mut url = self.endpoint(&["repos", owner, repo, "pulls"])?;
        url.query_pairs_mut()
            .append_pair("state", "all")
            .append_pair("sort", "created")
            .append_pair("direction", "asc");
        self.get_page(url, page).await
    }

    pub async fn get_pull_request(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
    ) -> Result<PullRequest, RemoteError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "pulls", &number])?;
        Ok(self.get_json(url).await?.0)
    }

    pub async fn list_reviews(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        page: u32,
    ) -> Result<Page<Review>, RemoteError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "pulls", &number, "reviews"])?;
        self.get_page(url, page).await
    }

    pub async fn list_review_comments(
        &self,
        owner: &str,
        repo: &str,
        number: i64,
        page: u32,
    ) -> Result<Page<ReviewComment>, RemoteError> {
        let number = number.to_string();
        let url = self.endpoint(&["repos", owner, repo, "pulls", &number, "comments"])?;
        self.get_page(url, page).await
    }

    pub async fn get_user(&self, login: &str) -> Result<User, RemoteError> {
        let url = self.endpoint(&["users", login])?;
        Ok(self.get_json(url).await?.0)
    }

    /// Appends path segments (percent-encoded) to the base URL
    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_page<T: DeserializeOwned>(
        &self,
        mut url: Url,
        page: u32,
    ) -> Result<Page<T>, RemoteError> {
        url.query_pairs_mut()
            .append_pair("per_page", &PAGE_SIZE.to_string())
            .append_pair("page", &page.to_string());

        let (items, link) = self.get_json::<Vec<T>>(url).await?;
        Ok(Page {
            items,
            next_page: link.as_deref().and_then(next_page),
        })
    }

    /// Sends a GET and decodes the JSON body, returning the raw `Link` header too
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<(T, Option<String>), RemoteError> {
        let url_str = url.to_string();
        tracing::debug!("GET {}", url_str);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                url: url_str.clone(),
                source,
            })?;

        let status = response.status();
        let rate_limit = RateLimit::from_headers(response.headers());
        if let Some(remaining) = rate_limit.remaining {
            tracing::trace!("Rate limit remaining: {}", remaining);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                url: url_str,
                status: status.as_u16(),
                message: error_message(status, &body),
                rate_limit_reset: rate_limit.reset,
            });
        }

        let link = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Decode {
                url: url_str,
                message: e.to_string(),
            })?;

        Ok((body, link))
    }
}

/// Prefers GitHub's JSON `message` field over the bare reason phrase
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown status")
                .to_string()
        })
}
