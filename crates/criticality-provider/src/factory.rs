use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{GITHUB_TOKEN_ENV, GitLabConfig, SessionConfig};
use crate::error::ProviderError;
use crate::github_client::GitHubClient;
use crate::gitlab_client::GitLabClient;
use crate::providers::{DependentsScraper, GitHubRepository, GitLabRepository};
use crate::traits::{Repository, RepositoryResolver};
use crate::types::{Platform, RepoLocator};

/// Owns the per-run clients. One GitHub client (and its credential pool) is
/// shared by every handle; GitLab clients are created once per instance.
pub struct ProviderSession {
    github: Option<Arc<GitHubClient>>,
    gitlab_config: GitLabConfig,
    gitlab_clients: Mutex<HashMap<String, Arc<GitLabClient>>>,
    dependents: Arc<DependentsScraper>,
}

impl ProviderSession {
    pub fn new(cfg: SessionConfig) -> Result<Self, ProviderError> {
        let github = cfg
            .github
            .map(GitHubClient::new)
            .transpose()?
            .map(Arc::new);
        Ok(Self {
            github,
            gitlab_config: cfg.gitlab,
            gitlab_clients: Mutex::new(HashMap::new()),
            dependents: Arc::new(DependentsScraper::new(cfg.dependents)?),
        })
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Self::new(SessionConfig::from_env())
    }

    pub fn github(&self) -> Option<&Arc<GitHubClient>> {
        self.github.as_ref()
    }

    /// Validates an identifier without touching the network. GitHub
    /// identifiers additionally require a configured token.
    pub fn check_identifier(&self, raw: &str) -> Result<RepoLocator, ProviderError> {
        let locator = RepoLocator::parse(raw)?;
        if locator.platform == Platform::GitHub && self.github.is_none() {
            return Err(ProviderError::Config(format!(
                "{GITHUB_TOKEN_ENV} must be set to a valid GitHub token"
            )));
        }
        Ok(locator)
    }

    async fn gitlab_client(&self, origin: &str) -> Result<Arc<GitLabClient>, ProviderError> {
        let mut clients = self.gitlab_clients.lock().await;
        if let Some(client) = clients.get(origin) {
            return Ok(Arc::clone(client));
        }
        let client = Arc::new(GitLabClient::connect(origin, &self.gitlab_config).await?);
        debug!(host = origin, authenticated = client.is_authenticated(), "gitlab client ready");
        clients.insert(origin.to_string(), Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl RepositoryResolver for ProviderSession {
    async fn resolve(&self, identifier: &str) -> Result<Arc<dyn Repository>, ProviderError> {
        let locator = self.check_identifier(identifier)?;
        debug!(%locator, platform = %locator.platform, "resolving repository");
        match locator.platform {
            Platform::GitHub => {
                let client = self.github.clone().ok_or_else(|| {
                    ProviderError::Config(format!("{GITHUB_TOKEN_ENV} is not set"))
                })?;
                let (owner, repo) = locator
                    .owner_and_name()
                    .ok_or_else(|| ProviderError::InvalidIdentifier(identifier.to_string()))?;
                let handle =
                    GitHubRepository::resolve(client, Arc::clone(&self.dependents), owner, repo)
                        .await?;
                Ok(Arc::new(handle))
            }
            Platform::GitLab => {
                let client = self.gitlab_client(&locator.origin()).await?;
                let handle =
                    GitLabRepository::resolve(client, Arc::clone(&self.dependents), &locator.path)
                        .await?;
                Ok(Arc::new(handle))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DependentsConfig, GitHubConfig};

    fn session(tokens: Vec<String>) -> ProviderSession {
        let github = (!tokens.is_empty()).then(|| GitHubConfig::new(tokens));
        ProviderSession::new(SessionConfig {
            github,
            gitlab: GitLabConfig::new(None),
            dependents: DependentsConfig::new(None),
        })
        .expect("session")
    }

    #[test]
    fn github_identifiers_need_a_token() {
        let err = session(Vec::new())
            .check_identifier("github.com/acme/widget")
            .expect_err("missing token");
        assert!(err.is_fatal());
        assert!(err.to_string().contains(GITHUB_TOKEN_ENV));
    }

    #[test]
    fn gitlab_identifiers_work_anonymously() {
        let locator = session(Vec::new())
            .check_identifier("https://gitlab.com/group/sub/project")
            .expect("gitlab");
        assert_eq!(locator.platform, Platform::GitLab);
    }

    #[test]
    fn unknown_hosts_are_rejected_before_any_request() {
        let err = session(vec!["t".to_string()])
            .check_identifier("bitbucket.org/acme/widget")
            .expect_err("unsupported");
        assert!(matches!(err, ProviderError::UnsupportedPlatform(_)));
    }
}
