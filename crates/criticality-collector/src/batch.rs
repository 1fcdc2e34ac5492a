use std::sync::Arc;

use criticality_core::ScoreResult;
use criticality_provider::RepositoryResolver;
use tracing::{error, info};

use crate::collector::MetricCollector;
use crate::error::CollectError;

#[derive(Debug)]
pub struct BatchFailure {
    pub identifier: String,
    pub error: CollectError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<ScoreResult>,
    pub failures: Vec<BatchFailure>,
    pub attempted: usize,
}

impl BatchReport {
    pub fn scored(&self) -> usize {
        self.results.len()
    }

    /// Results ordered by descending score; ties keep input order.
    pub fn ranked(&self) -> Vec<ScoreResult> {
        let mut ranked = self.results.clone();
        ranked.sort_by(|a, b| b.criticality_score.total_cmp(&a.criticality_score));
        ranked
    }
}

/// Scores repositories one after another. A repository that cannot be
/// scored is logged and left out; only configuration errors stop the run.
pub struct BatchDriver {
    resolver: Arc<dyn RepositoryResolver>,
    collector: MetricCollector,
}

impl BatchDriver {
    pub fn new(resolver: Arc<dyn RepositoryResolver>, collector: MetricCollector) -> Self {
        Self {
            resolver,
            collector,
        }
    }

    pub async fn run<I, S>(&self, identifiers: I) -> Result<BatchReport, CollectError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = BatchReport::default();
        for identifier in identifiers {
            let identifier = identifier.as_ref();
            report.attempted += 1;
            match self.score_one(identifier).await {
                Ok(result) => {
                    info!(
                        name = %result.name,
                        url = %result.url,
                        score = result.criticality_score,
                        "scored repository"
                    );
                    report.results.push(result);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(url = identifier, error = %e, "skipping repository");
                    report.failures.push(BatchFailure {
                        identifier: identifier.to_string(),
                        error: e,
                    });
                }
            }
        }
        info!(
            attempted = report.attempted,
            scored = report.scored(),
            "batch complete"
        );
        Ok(report)
    }

    async fn score_one(&self, identifier: &str) -> Result<ScoreResult, CollectError> {
        let repo = self
            .collector
            .config()
            .retry
            .run(identifier, |_| async {
                self.resolver
                    .resolve(identifier)
                    .await
                    .map_err(CollectError::from)
            })
            .await?;
        self.collector.score(repo).await
    }
}
