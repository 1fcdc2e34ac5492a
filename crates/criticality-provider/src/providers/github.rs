use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use criticality_core::constants::{
    ISSUE_LOOKBACK_DAYS, MAX_CONTRIBUTOR_COUNT, MAX_ISSUES_COUNT, RECENT_RELEASES_CAP,
    RELEASE_LOOKBACK_DAYS, TOO_MANY_CONTRIBUTORS_ORG_COUNT, TOP_CONTRIBUTOR_COUNT,
};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::error::ProviderError;
use crate::github_client::{GitHubClient, ensure_success};
use crate::pagination::last_page;
use crate::providers::DependentsScraper;
use crate::signals::{
    comment_frequency, extrapolate_releases, months_since, normalize_org_name,
    weekly_commit_frequency,
};
use crate::traits::Repository;
use crate::types::{CommitInfo, Platform};

/// Comment frequency reported when the comments listing is too large to count.
const TOO_MANY_COMMENTS_FREQUENCY: f64 = 2.0;
const RELEASES_PER_PAGE: u64 = 100;
const MAX_RELEASE_PAGES: u64 = 20;

pub struct GitHubRepository {
    client: Arc<GitHubClient>,
    dependents: Arc<DependentsScraper>,
    owner: String,
    repo: String,
    meta: RepoMetadata,
    last_commit: OnceCell<Option<CommitInfo>>,
    created_since: OnceCell<u64>,
}

impl GitHubRepository {
    pub async fn resolve(
        client: Arc<GitHubClient>,
        dependents: Arc<DependentsScraper>,
        owner: &str,
        repo: &str,
    ) -> Result<Self, ProviderError> {
        let url = client.api_url(&format!("repos/{owner}/{repo}"));
        let res = client.get(&url, &[]).await?;
        if res.status() == StatusCode::NOT_FOUND {
            return Err(ProviderError::RepositoryNotFound(format!("{owner}/{repo}")));
        }
        let meta: RepoMetadata = ensure_success(res).await?.json().await?;
        Ok(Self {
            client,
            dependents,
            owner: owner.to_string(),
            repo: repo.to_string(),
            meta,
            last_commit: OnceCell::new(),
            created_since: OnceCell::new(),
        })
    }

    fn repo_url(&self, suffix: &str) -> String {
        self.client
            .api_url(&format!("repos/{}/{}/{suffix}", self.owner, self.repo))
    }

    fn lookback(days: i64) -> String {
        (Utc::now() - TimeDelta::days(days)).to_rfc3339()
    }

    /// Commits listed at `per_page=1` up to `until`; the last page holds the
    /// earliest one. 409 means the git repository is empty.
    async fn earliest_commit_before(
        &self,
        until: DateTime<Utc>,
    ) -> Result<Option<DateTime<Utc>>, ProviderError> {
        let url = self.repo_url("commits");
        let query = [("until", until.to_rfc3339()), ("per_page", "1".to_string())];
        let res = self.client.get(&url, &query).await?;
        if res.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let res = ensure_success(res).await?;
        let last = last_page(res.headers());
        let mut commits: Vec<CommitItem> = res.json().await?;
        if let Some(page) = last.filter(|p| *p > 1) {
            let mut query = query.to_vec();
            query.push(("page", page.to_string()));
            commits = self.client.get_json(&url, &query).await?;
        }
        Ok(commits.pop().map(|c| c.commit.committer.date))
    }

    async fn fetch_last_commit(&self) -> Result<Option<CommitInfo>, ProviderError> {
        let url = self.repo_url("commits");
        let res = self
            .client
            .get(&url, &[("per_page", "1".to_string())])
            .await?;
        if res.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let commits: Vec<CommitItem> = ensure_success(res).await?.json().await?;
        Ok(commits.into_iter().next().map(|c| CommitInfo {
            sha: c.sha,
            committed_at: c.commit.author.date,
        }))
    }

    async fn compute_created_since(&self) -> Result<u64, ProviderError> {
        let mut created = self.meta.created_at;
        // History older than the platform record means the project was
        // imported; its first commit is the real origin.
        if let Some(first) = self.earliest_commit_before(created).await? {
            if first < created {
                debug!(repo = %self.meta.full_name, "using first commit as creation time");
                created = first;
            }
        }
        Ok(months_since(created, Utc::now()))
    }

    async fn issue_count(&self, state: &str) -> Result<u64, ProviderError> {
        let query = [
            ("state", state.to_string()),
            ("since", Self::lookback(ISSUE_LOOKBACK_DAYS)),
        ];
        match self.client.count(&self.repo_url("issues"), &query).await {
            Err(ProviderError::Api { status, .. }) if (500..600).contains(&status) => {
                // The issues listing answers 5xx for very large projects.
                Ok(MAX_ISSUES_COUNT)
            }
            other => other,
        }
    }

    async fn recent_release_total(&self) -> Result<u64, ProviderError> {
        let cutoff = Utc::now() - TimeDelta::days(RELEASE_LOOKBACK_DAYS);
        let url = self.repo_url("releases");
        let mut total = 0;
        for page in 1..=MAX_RELEASE_PAGES {
            let query = [
                ("per_page", RELEASES_PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            let releases: Vec<ReleaseItem> = self.client.get_json(&url, &query).await?;
            let fetched = releases.len() as u64;
            total += releases.iter().filter(|r| r.created_at >= cutoff).count() as u64;
            if fetched < RELEASES_PER_PAGE {
                break;
            }
        }
        Ok(total)
    }

    async fn tag_count(&self) -> Result<u64, ProviderError> {
        self.client.count(&self.repo_url("tags"), &[]).await
    }
}

fn is_list_too_large(err: &ProviderError) -> bool {
    matches!(err, ProviderError::Api { status: 403, body } if body.contains("too large"))
}

#[async_trait]
impl Repository for GitHubRepository {
    fn platform(&self) -> Platform {
        Platform::GitHub
    }

    fn name(&self) -> &str {
        &self.meta.name
    }

    fn url(&self) -> &str {
        &self.meta.html_url
    }

    fn language(&self) -> Option<&str> {
        self.meta.language.as_deref()
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
            .ok_or_else(|| ProviderError::EmptyRepository(self.meta.html_url.clone()))?;
        Ok(months_since(last.committed_at, Utc::now()))
    }

    async fn contributor_count(&self) -> Result<u64, ProviderError> {
        let query = [("anon", "1".to_string())];
        match self.client.count(&self.repo_url("contributors"), &query).await {
            Ok(total) => Ok(total.min(MAX_CONTRIBUTOR_COUNT)),
            Err(e) if is_list_too_large(&e) => Ok(MAX_CONTRIBUTOR_COUNT),
            Err(e) => Err(e),
        }
    }

    async fn org_count(&self) -> Result<u64, ProviderError> {
        let query = [("per_page", TOP_CONTRIBUTOR_COUNT.to_string())];
        let res = self.client.get(&self.repo_url("contributors"), &query).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }
        let contributors: Vec<ContributorItem> = match ensure_success(res).await {
            Ok(res) => res.json().await?,
            Err(e) if is_list_too_large(&e) => return Ok(TOO_MANY_CONTRIBUTORS_ORG_COUNT),
            Err(e) => return Err(e),
        };

        let mut orgs = HashSet::new();
        for login in contributors
            .iter()
            .take(TOP_CONTRIBUTOR_COUNT)
            .filter_map(|c| c.login.as_deref())
            .filter(|l| !l.ends_with("[bot]"))
        {
            let user: UserItem = self
                .client
                .get_json(&self.client.api_url(&format!("users/{login}")), &[])
                .await?;
            if let Some(company) = user.company.filter(|c| !c.trim().is_empty()) {
                orgs.insert(normalize_org_name(&company));
            }
        }
        Ok(orgs.len() as u64)
    }

    async fn commit_frequency(&self) -> Result<f64, ProviderError> {
        let url = self.repo_url("stats/commit_activity");
        let policy = self.client.config();
        for attempt in 0..policy.stats_poll_attempts {
            let res = self.client.get(&url, &[]).await?;
            match res.status() {
                StatusCode::ACCEPTED => {
                    // Statistics are still being computed.
                    debug!(repo = %self.meta.full_name, attempt, "commit activity not ready");
                    tokio::time::sleep(policy.stats_poll_delay.saturating_mul(1 << attempt.min(8)))
                        .await;
                }
                StatusCode::NO_CONTENT => return Ok(0.0),
                _ => {
                    let weeks: Vec<WeekActivity> = ensure_success(res).await?.json().await?;
                    let total = weeks.iter().map(|w| w.total).sum();
                    return Ok(weekly_commit_frequency(total));
                }
            }
        }
        Err(ProviderError::Unavailable(format!(
            "commit activity for {} not computed after {} polls",
            self.meta.full_name, policy.stats_poll_attempts
        )))
    }

    async fn recent_releases_count(&self) -> Result<u64, ProviderError> {
        let total = self.recent_release_total().await?;
        if total > 0 {
            return Ok(total);
        }
        // No releases: estimate from the tag history prorated by age.
        let days_since_creation = self.created_since().await? * 30;
        if days_since_creation == 0 {
            return Ok(0);
        }
        match self.tag_count().await {
            Ok(tags) => Ok(extrapolate_releases(
                tags,
                days_since_creation,
                RELEASE_LOOKBACK_DAYS,
            )),
            Err(e) if is_list_too_large(&e) || matches!(e, ProviderError::Api { status: 500..=599, .. }) => {
                error!(repo = %self.meta.full_name, error = %e, "tag listing failed");
                Ok(RECENT_RELEASES_CAP)
            }
            Err(e) => Err(e),
        }
    }

    async fn updated_issues_count(&self) -> Result<u64, ProviderError> {
        self.issue_count("all").await
    }

    async fn closed_issues_count(&self) -> Result<u64, ProviderError> {
        self.issue_count("closed").await
    }

    async fn comment_frequency(&self) -> Result<f64, ProviderError> {
        let issues = self.updated_issues_count().await?;
        if issues == 0 {
            return Ok(0.0);
        }
        let query = [("since", Self::lookback(ISSUE_LOOKBACK_DAYS))];
        match self
            .client
            .count(&self.repo_url("issues/comments"), &query)
            .await
        {
            Ok(comments) => Ok(comment_frequency(comments, issues)),
            Err(ProviderError::Api { status: 500..=599, .. }) => Ok(TOO_MANY_COMMENTS_FREQUENCY),
            Err(e) => Err(e),
        }
    }

    async fn dependents_count(&self) -> Result<u64, ProviderError> {
        self.dependents.count(&self.meta.full_name).await
    }
}

#[derive(Debug, Clone, Deserialize)]
struct RepoMetadata {
    name: String,
    full_name: String,
    html_url: String,
    #[serde(default)]
    language: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CommitItem {
    #[serde(default)]
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Signature,
    committer: Signature,
}

#[derive(Debug, Deserialize)]
struct Signature {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ContributorItem {
    #[serde(default)]
    login: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserItem {
    #[serde(default)]
    company: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReleaseItem {
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct WeekActivity {
    total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_listing_is_detected() {
        let e = ProviderError::Api {
            status: 403,
            body: r#"{"message":"The history or contributor list is too large to list contributors for this repository via the API."}"#.to_string(),
        };
        assert!(is_list_too_large(&e));
        let e = ProviderError::Api {
            status: 403,
            body: "rate limited".to_string(),
        };
        assert!(!is_list_too_large(&e));
    }

    #[test]
    fn commit_payload_parses() {
        let raw = r#"[{"sha":"abc","commit":{"author":{"date":"2024-01-02T03:04:05Z"},"committer":{"date":"2024-01-03T03:04:05Z"}}}]"#;
        let items: Vec<CommitItem> = serde_json::from_str(raw).expect("parse");
        assert_eq!(items[0].sha, "abc");
        assert!(items[0].commit.committer.date > items[0].commit.author.date);
    }
}
