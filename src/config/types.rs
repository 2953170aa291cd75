use serde::Deserialize;

/// Main configuration structure for pull-harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub github: GitHubConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Remote API access configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the GitHub REST API
    #[serde(rename = "api-url", default = "default_api_url")]
    pub api_url: String,

    /// User-Agent header sent with every request (GitHub rejects requests without one)
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Personal access token; falls back to the GITHUB_TOKEN environment variable
    #[serde(default)]
    pub token: Option<String>,
}

/// Local store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// Task manager configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before retrying after a store error or a non rate-limit remote error
    #[serde(rename = "retry-delay-secs", default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl GitHubConfig {
    /// Token from the config file, or from the environment when the file has none
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.is_empty())
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_retry_delay_secs() -> u64 {
    60
}
