use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use criticality_core::constants::{
    ISSUE_LOOKBACK_DAYS, MAX_CONTRIBUTOR_COUNT, MAX_ISSUES_COUNT, RELEASE_LOOKBACK_DAYS,
};
use reqwest::StatusCode;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ProviderError;
use crate::gitlab_client::GitLabClient;
use crate::github_client::ensure_success;
use crate::providers::DependentsScraper;
use crate::signals::{comment_frequency, months_since, weekly_commit_frequency};
use crate::traits::Repository;
use crate::types::{CommitInfo, Platform};

/// Membership data is admin-only on GitLab, so every project reports one org.
const GITLAB_ORG_COUNT: u64 = 1;
const MAX_LIST_PAGES: u64 = 50;

pub struct GitLabRepository {
    client: Arc<GitLabClient>,
    dependents: Arc<DependentsScraper>,
    path: String,
    meta: ProjectMetadata,
    language: Option<String>,
    last_commit: OnceCell<Option<CommitInfo>>,
    created_since: OnceCell<u64>,
}

impl GitLabRepository {
    pub async fn resolve(
        client: Arc<GitLabClient>,
        dependents: Arc<DependentsScraper>,
        path: &str,
    ) -> Result<Self, ProviderError> {
        let encoded = path.replace('/', "%2F");
        let res = client.get(&format!("projects/{encoded}"), &[]).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::RepositoryNotFound(path.to_string()));
        }
        let meta: ProjectMetadata = ensure_success(res).await?.json().await?;
        let languages: HashMap<String, f64> = client
            .get_json(&format!("projects/{}/languages", meta.id), &[])
            .await?;
        Ok(Self {
            client,
            dependents,
            path: path.to_string(),
            meta,
            language: dominant_language(&languages),
            last_commit: OnceCell::new(),
            created_since: OnceCell::new(),
        })
    }

    fn project_path(&self, suffix: &str) -> String {
        format!("projects/{}/{suffix}", self.meta.id)
    }

    fn since(days: i64) -> String {
        (Utc::now() - TimeDelta::days(days)).to_rfc3339()
    }

    async fn fetch_last_commit(&self) -> Result<Option<CommitInfo>, ProviderError> {
        let commits: Vec<CommitItem> = self
            .client
            .get_json(
                &self.project_path("repository/commits"),
                &[("per_page", "1".to_string())],
            )
            .await?;
        Ok(commits.into_iter().next().map(|c| CommitInfo {
            sha: c.id,
            committed_at: c.created_at,
        }))
    }

    async fn compute_created_since(&self) -> Result<u64, ProviderError> {
        let mut created = self.meta.created_at;
        let path = self.project_path("repository/commits");
        let until = [("until", created.to_rfc3339())];
        let oldest: Option<CommitItem> = self.client.last_item(&path, &until).await?;
        if let Some(first) = oldest.map(|c| c.created_at) {
            debug!(repo = %self.path, "using first commit as creation time");
            created = created.min(first);
        }
        Ok(months_since(created, Utc::now()))
    }

    async fn issue_statistics(&self) -> Result<IssueCounts, ProviderError> {
        let query = [("updated_after", Self::since(ISSUE_LOOKBACK_DAYS))];
        let stats: IssueStatistics = self
            .client
            .get_json(&self.project_path("issues_statistics"), &query)
            .await?;
        Ok(stats.statistics.counts)
    }

    async fn count_in_window<T, F>(
        &self,
        suffix: &str,
        cutoff: DateTime<Utc>,
        timestamp: F,
    ) -> Result<u64, ProviderError>
    where
        T: DeserializeOwned + Send,
        F: Fn(&T) -> DateTime<Utc> + Send + Sync,
    {
        let mut count = 0u64;
        self.client
            .for_each_page(&self.project_path(suffix), &[], MAX_LIST_PAGES, |items: Vec<T>| {
                // Listings are newest first; stop at the first entry past the window.
                for item in &items {
                    if timestamp(item) < cutoff {
                        return false;
                    }
                    count += 1;
                }
                true
            })
            .await?;
        Ok(count)
    }
}

fn dominant_language(languages: &HashMap<String, f64>) -> Option<String> {
    languages
        .iter()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(name, _)| name.to_lowercase())
}

#[async_trait]
impl Repository for GitLabRepository {
    fn platform(&self) -> Platform {
        Platform::GitLab
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn url(&self) -> &str {
        &self.meta.web_url
    }

    fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    async fn last_commit(&self) -> Result<Option<CommitInfo>, ProviderError> {
        self.last_commit
            .get_or_try_init(|| self.fetch_last_commit())
            .await
            .cloned()
    }

    async fn created_since(&self) -> Result<u64, ProviderError> {
        self.created_since
            .get_or_try_init(|| self.compute_created_since())
            .await
            .copied()
    }

    async fn updated_since(&self) -> Result<u64, ProviderError> {
        let last = self
            .last_commit()
            .await?
            .ok_or_else(|| ProviderError::EmptyRepository(self.meta.web_url.clone()))?;
        Ok(months_since(last.committed_at, Utc::now()))
    }

    async fn contributor_count(&self) -> Result<u64, ProviderError> {
        let total = self
            .client
            .total(&self.project_path("repository/contributors"), &[])
            .await?;
        Ok(total.min(MAX_CONTRIBUTOR_COUNT))
    }

    async fn org_count(&self) -> Result<u64, ProviderError> {
        Ok(GITLAB_ORG_COUNT)
    }

    async fn commit_frequency(&self) -> Result<f64, ProviderError> {
        let query = [("since", Self::since(365))];
        let commits = self
            .client
            .total(&self.project_path("repository/commits"), &query)
            .await?;
        Ok(weekly_commit_frequency(commits))
    }

    async fn recent_releases_count(&self) -> Result<u64, ProviderError> {
        let cutoff = Utc::now() - TimeDelta::days(RELEASE_LOOKBACK_DAYS);
        let releases = self
            .count_in_window("releases", cutoff, |r: &ReleaseItem| r.released_at)
            .await?;
        if releases > 0 {
            return Ok(releases);
        }
        // Projects that only tag: count tags whose commit falls in the window.
        self.count_in_window("repository/tags", cutoff, |t: &TagItem| {
            t.commit.created_at
        })
        .await
    }

    async fn updated_issues_count(&self) -> Result<u64, ProviderError> {
        Ok(self.issue_statistics().await?.all.min(MAX_ISSUES_COUNT))
    }

    async fn closed_issues_count(&self) -> Result<u64, ProviderError> {
        Ok(self.issue_statistics().await?.closed.min(MAX_ISSUES_COUNT))
    }

    async fn comment_frequency(&self) -> Result<f64, ProviderError> {
        let issues = self.updated_issues_count().await?;
        if issues == 0 {
            return Ok(0.0);
        }

        let mut iids = Vec::new();
        let query = [("updated_after", Self::since(ISSUE_LOOKBACK_DAYS))];
        self.client
            .for_each_page(
                &self.project_path("issues"),
                &query,
                MAX_LIST_PAGES,
                |page: Vec<IssueItem>| {
                    iids.extend(page.into_iter().map(|i| i.iid));
                    true
                },
            )
            .await?;

        let mut comments = 0u64;
        for iid in iids {
            // Notes may be hidden from anonymous callers; those count as zero.
            match self
                .client
                .total(&self.project_path(&format!("issues/{iid}/notes")), &[])
                .await
            {
                Ok(n) => comments += n,
                Err(e) => debug!(repo = %self.path, iid, error = %e, "issue notes unavailable"),
            }
        }
        Ok(comment_frequency(comments, issues))
    }

    async fn dependents_count(&self) -> Result<u64, ProviderError> {
        self.dependents.count(&self.path).await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectMetadata {
    id: u64,
    name: String,
    web_url: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    id: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ReleaseItem {
    released_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TagItem {
    commit: TagCommit,
}

#[derive(Debug, Deserialize)]
struct TagCommit {
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct IssueStatistics {
    statistics: IssueStatisticsBody,
}

#[derive(Debug, Deserialize)]
struct IssueStatisticsBody {
    counts: IssueCounts,
}

#[derive(Debug, Deserialize)]
struct IssueCounts {
    #[serde(default)]
    all: u64,
    #[serde(default)]
    closed: u64,
}

#[derive(Debug, Deserialize)]
struct IssueItem {
    iid: u64,
}
