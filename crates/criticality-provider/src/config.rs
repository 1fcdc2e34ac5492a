use std::time::Duration;

use crate::credentials::QUOTA_SAFETY_FLOOR;

pub const GITHUB_TOKEN_ENV: &str = "GITHUB_AUTH_TOKEN";
pub const GITHUB_TOKEN_FALLBACK_ENV: &str = "GITHUB_TOKEN";
pub const GITLAB_TOKEN_ENV: &str = "GITLAB_AUTH_TOKEN";

const USER_AGENT: &str = concat!("criticality-score/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct GitHubConfig {
    pub tokens: Vec<String>,
    pub api_base: String,
    pub user_agent: String,
    pub timeout: Duration,
    /// Credentials with fewer remaining calls than this are rotated out.
    pub quota_floor: u64,
    /// Upper bound on a single sleep waiting for quota reset.
    pub max_quota_wait: Duration,
    pub stats_poll_attempts: u32,
    pub stats_poll_delay: Duration,
}

impl GitHubConfig {
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            api_base: "https://api.github.com".to_string(),
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
            quota_floor: QUOTA_SAFETY_FLOOR,
            max_quota_wait: Duration::from_secs(3600),
            stats_poll_attempts: 5,
            stats_poll_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GitLabConfig {
    pub token: Option<String>,
    pub user_agent: String,
    pub timeout: Duration,
}

impl GitLabConfig {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token,
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DependentsConfig {
    pub web_base: String,
    pub token: Option<String>,
    pub retries: u32,
    pub base_delay: Duration,
    pub user_agent: String,
    pub timeout: Duration,
}

impl DependentsConfig {
    pub fn new(token: Option<String>) -> Self {
        Self {
            web_base: "https://github.com".to_string(),
            token,
            retries: 3,
            base_delay: Duration::from_secs(1),
            user_agent: USER_AGENT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// `None` when no GitHub token is configured.
    pub github: Option<GitHubConfig>,
    pub gitlab: GitLabConfig,
    pub dependents: DependentsConfig,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let tokens = std::env::var(GITHUB_TOKEN_ENV)
            .or_else(|_| std::env::var(GITHUB_TOKEN_FALLBACK_ENV))
            .map(|raw| split_tokens(&raw))
            .unwrap_or_default();
        let timeout = Duration::from_secs(env_u64("CRITICALITY_HTTP_TIMEOUT_SECS", 30, 1, 600));

        let github = (!tokens.is_empty()).then(|| {
            let mut cfg = GitHubConfig::new(tokens.clone());
            if let Some(base) = env_string("CRITICALITY_GITHUB_API_URL") {
                cfg.api_base = base;
            }
            cfg.timeout = timeout;
            cfg
        });

        let mut gitlab = GitLabConfig::new(env_string(GITLAB_TOKEN_ENV));
        gitlab.timeout = timeout;

        let mut dependents = DependentsConfig::new(tokens.into_iter().next());
        if let Some(base) = env_string("CRITICALITY_GITHUB_WEB_URL") {
            dependents.web_base = base;
        }
        dependents.timeout = timeout;

        Self {
            github,
            gitlab,
            dependents,
        }
    }
}

/// Splits a comma-separated token list, dropping blanks.
pub fn split_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
        .clamp(min, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_lists_split_on_commas() {
        assert_eq!(split_tokens("a, b,,c "), vec!["a", "b", "c"]);
        assert!(split_tokens(" , ").is_empty());
    }
}
