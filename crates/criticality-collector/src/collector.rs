use std::sync::Arc;

use criticality_core::{
    criticality_score, ExtraParam, Metric, MetricVector, MetricVectorBuilder, ScoreResult,
    WeightConfig,
};
use criticality_provider::{ProviderError, Repository};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::debug;

use crate::error::CollectError;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound on metric tasks in flight for one repository.
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: Metric::ALL.len(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Evaluates the ten canonical metrics of a repository concurrently and
/// reduces them to a score.
pub struct MetricCollector {
    config: CollectorConfig,
    weights: WeightConfig,
    extras: Vec<ExtraParam>,
}

impl MetricCollector {
    pub const fn new(config: CollectorConfig, weights: WeightConfig, extras: Vec<ExtraParam>) -> Self {
        Self {
            config,
            weights,
            extras,
        }
    }

    pub const fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collects a complete vector, redoing the whole pass on transient
    /// failures. No partial vector ever escapes.
    pub async fn collect(&self, repo: Arc<dyn Repository>) -> Result<MetricVector, CollectError> {
        let url = repo.url().to_string();
        self.config
            .retry
            .run(&url, |attempt| {
                debug!(url = %url, attempt, "collecting metrics");
                self.collect_pass(Arc::clone(&repo))
            })
            .await
    }

    pub async fn score(&self, repo: Arc<dyn Repository>) -> Result<ScoreResult, CollectError> {
        let metrics = self.collect(Arc::clone(&repo)).await?;
        let score = criticality_score(&metrics, &self.weights, &self.extras);
        Ok(ScoreResult {
            name: repo.name().to_string(),
            url: repo.url().to_string(),
            language: repo.language().map(ToString::to_string),
            metrics,
            criticality_score: score,
        })
    }

    async fn collect_pass(&self, repo: Arc<dyn Repository>) -> Result<MetricVector, CollectError> {
        if repo.last_commit().await?.is_none() {
            return Err(ProviderError::EmptyRepository(repo.url().to_string()).into());
        }

        let permits = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut tasks = JoinSet::new();
        for metric in Metric::ALL {
            let repo = Arc::clone(&repo);
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| CollectError::Join(e.to_string()))?;
                let value = repo
                    .metric(metric)
                    .await
                    .map_err(|source| CollectError::Metric { metric, source })?;
                Ok::<_, CollectError>((metric, value))
            });
        }

        // Join barrier: every task finishes before the vector is assembled.
        let mut builder = MetricVectorBuilder::new();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok((metric, value))) => builder.insert(metric, value),
                Ok(Err(e)) => {
                    debug!(url = repo.url(), error = %e, "metric failed");
                    keep_decisive(&mut failure, e);
                }
                Err(e) => keep_decisive(&mut failure, CollectError::Join(e.to_string())),
            }
        }
        if let Some(e) = failure {
            return Err(e);
        }
        builder.build().map_err(CollectError::Incomplete)
    }
}

/// A permanent failure outranks a transient one: redoing the pass cannot help.
fn keep_decisive(slot: &mut Option<CollectError>, err: CollectError) {
    if slot.as_ref().is_none_or(CollectError::is_transient) {
        *slot = Some(err);
    }
}
