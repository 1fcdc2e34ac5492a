use std::sync::Arc;

use async_trait::async_trait;
use criticality_core::{Metric, MetricValue};

use crate::error::ProviderError;
use crate::types::{CommitInfo, Platform};

/// The metric contract every hosting platform implements.
///
/// Each signal is independently computable: implementations must not rely
/// on call order or share mutable scratch state between signals, because
/// the collector evaluates them concurrently. Memoized fields (last commit,
/// creation age) are computed at most once per handle.
#[async_trait]
pub trait Repository: Send + Sync {
    fn platform(&self) -> Platform;

    fn name(&self) -> &str;

    fn url(&self) -> &str;

    fn language(&self) -> Option<&str>;

    async fn last_commit(&self) -> Result<Option<CommitInfo>, ProviderError>;

    async fn created_since(&self) -> Result<u64, ProviderError>;

    async fn updated_since(&self) -> Result<u64, ProviderError>;

    async fn contributor_count(&self) -> Result<u64, ProviderError>;

    async fn org_count(&self) -> Result<u64, ProviderError>;

    async fn commit_frequency(&self) -> Result<f64, ProviderError>;

    async fn recent_releases_count(&self) -> Result<u64, ProviderError>;

    async fn updated_issues_count(&self) -> Result<u64, ProviderError>;

    async fn closed_issues_count(&self) -> Result<u64, ProviderError>;

    async fn comment_frequency(&self) -> Result<f64, ProviderError>;

    async fn dependents_count(&self) -> Result<u64, ProviderError>;

    /// Evaluates one canonical metric by name.
    async fn metric(&self, metric: Metric) -> Result<MetricValue, ProviderError> {
        Ok(match metric {
            Metric::CreatedSince => MetricValue::Count(self.created_since().await?),
            Metric::UpdatedSince => MetricValue::Count(self.updated_since().await?),
            Metric::ContributorCount => MetricValue::Count(self.contributor_count().await?),
            Metric::OrgCount => MetricValue::Count(self.org_count().await?),
            Metric::CommitFrequency => MetricValue::Frequency(self.commit_frequency().await?),
            Metric::RecentReleasesCount => {
                MetricValue::Count(self.recent_releases_count().await?)
            }
            Metric::UpdatedIssuesCount => MetricValue::Count(self.updated_issues_count().await?),
            Metric::ClosedIssuesCount => MetricValue::Count(self.closed_issues_count().await?),
            Metric::CommentFrequency => MetricValue::Frequency(self.comment_frequency().await?),
            Metric::DependentsCount => MetricValue::Count(self.dependents_count().await?),
        })
    }
}

/// Turns a repository identifier into a live handle.
#[async_trait]
pub trait RepositoryResolver: Send + Sync {
    async fn resolve(&self, identifier: &str) -> Result<Arc<dyn Repository>, ProviderError>;
}
