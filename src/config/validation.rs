use crate::config::types::{Config, GitHubConfig, SchedulerConfig, StorageConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_github_config(&config.github)?;
    validate_storage_config(&config.storage)?;
    validate_scheduler_config(&config.scheduler)?;
    Ok(())
}

/// Validates remote API configuration
fn validate_github_config(config: &GitHubConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.api_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api-url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "api-url '{}' must use http or https",
            config.api_url
        )));
    }

    validate_user_agent(&config.user_agent)?;

    Ok(())
}

/// GitHub requires a non-empty User-Agent made of visible ASCII
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if !user_agent.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
        return Err(ConfigError::Validation(format!(
            "user-agent must contain only printable ASCII characters, got '{}'",
            user_agent
        )));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates task manager configuration
fn validate_scheduler_config(config: &SchedulerConfig) -> Result<(), ConfigError> {
    if config.retry_delay_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "retry-delay-secs must be >= 1, got {}",
            config.retry_delay_secs
        )));
    }

    Ok(())
}
