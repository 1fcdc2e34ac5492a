use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::ConfigError;
use crate::metric::Metric;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricWeight {
    pub weight: f64,
    pub threshold: f64,
}

impl MetricWeight {
    pub const fn new(weight: f64, threshold: f64) -> Self {
        Self { weight, threshold }
    }

    fn validate(self, label: &str) -> Result<Self, ConfigError> {
        if !self.weight.is_finite() {
            return Err(ConfigError::InvalidWeight {
                metric: label.to_string(),
                reason: "weight must be a finite number".to_string(),
            });
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(ConfigError::InvalidWeight {
                metric: label.to_string(),
                reason: "threshold must be greater than zero".to_string(),
            });
        }
        Ok(self)
    }
}

pub const fn default_weight(metric: Metric) -> MetricWeight {
    match metric {
        Metric::CreatedSince => MetricWeight::new(CREATED_SINCE_WEIGHT, CREATED_SINCE_THRESHOLD),
        Metric::UpdatedSince => MetricWeight::new(UPDATED_SINCE_WEIGHT, UPDATED_SINCE_THRESHOLD),
        Metric::ContributorCount => {
            MetricWeight::new(CONTRIBUTOR_COUNT_WEIGHT, CONTRIBUTOR_COUNT_THRESHOLD)
        }
        Metric::OrgCount => MetricWeight::new(ORG_COUNT_WEIGHT, ORG_COUNT_THRESHOLD),
        Metric::CommitFrequency => {
            MetricWeight::new(COMMIT_FREQUENCY_WEIGHT, COMMIT_FREQUENCY_THRESHOLD)
        }
        Metric::RecentReleasesCount => {
            MetricWeight::new(RECENT_RELEASES_WEIGHT, RECENT_RELEASES_THRESHOLD)
        }
        Metric::UpdatedIssuesCount => {
            MetricWeight::new(UPDATED_ISSUES_WEIGHT, UPDATED_ISSUES_THRESHOLD)
        }
        Metric::ClosedIssuesCount => {
            MetricWeight::new(CLOSED_ISSUES_WEIGHT, CLOSED_ISSUES_THRESHOLD)
        }
        Metric::CommentFrequency => {
            MetricWeight::new(COMMENT_FREQUENCY_WEIGHT, COMMENT_FREQUENCY_THRESHOLD)
        }
        Metric::DependentsCount => {
            MetricWeight::new(DEPENDENTS_COUNT_WEIGHT, DEPENDENTS_COUNT_THRESHOLD)
        }
    }
}

/// Weight and threshold for every canonical metric. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightConfig {
    entries: BTreeMap<Metric, MetricWeight>,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            entries: Metric::ALL
                .into_iter()
                .map(|m| (m, default_weight(m)))
                .collect(),
        }
    }
}

impl WeightConfig {
    /// Starts from the defaults and replaces the named entries.
    pub fn with_overrides<I, K>(overrides: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, MetricWeight)>,
        K: AsRef<str>,
    {
        let mut cfg = Self::default();
        for (name, weight) in overrides {
            let metric: Metric = name.as_ref().parse()?;
            cfg.entries
                .insert(metric, weight.validate(metric.as_str())?);
        }
        Ok(cfg)
    }

    pub fn get(&self, metric: Metric) -> MetricWeight {
        self.entries
            .get(&metric)
            .copied()
            .unwrap_or_else(|| default_weight(metric))
    }

    pub fn total_weight(&self) -> f64 {
        Metric::ALL.into_iter().map(|m| self.get(m).weight).sum()
    }
}

/// Ad-hoc `value:weight:max_threshold` triple supplied alongside the
/// canonical metrics. Counts toward the total weight only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtraParam {
    pub value: i64,
    pub weight: i64,
    pub threshold: i64,
}

impl FromStr for ExtraParam {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ConfigError::MalformedParam(s.to_string());
        let parts = s
            .split(':')
            .map(|p| p.trim().parse::<i64>().map_err(|_| malformed()))
            .collect::<Result<Vec<_>, _>>()?;
        let [value, weight, threshold] = parts.as_slice() else {
            return Err(malformed());
        };
        if *value < 0 || *threshold <= 0 {
            return Err(malformed());
        }
        Ok(Self {
            value: *value,
            weight: *weight,
            threshold: *threshold,
        })
    }
}

/// Parses every triple; the first malformed one aborts.
pub fn parse_extra_params<I, S>(raw: I) -> Result<Vec<ExtraParam>, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|s| s.as_ref().parse()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_metric() {
        let cfg = WeightConfig::default();
        assert!((cfg.total_weight() - 8.5).abs() < 1e-12);
        assert!(cfg.get(Metric::UpdatedSince).weight < 0.0);
        assert!((cfg.get(Metric::DependentsCount).threshold - 500_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn overrides_validate_thresholds() {
        let cfg = WeightConfig::with_overrides([("org_count", MetricWeight::new(3.0, 20.0))])
            .expect("valid override");
        assert!((cfg.get(Metric::OrgCount).weight - 3.0).abs() < f64::EPSILON);

        let err = WeightConfig::with_overrides([("org_count", MetricWeight::new(1.0, 0.0))]);
        assert!(matches!(err, Err(ConfigError::InvalidWeight { .. })));

        let err = WeightConfig::with_overrides([("stars", MetricWeight::new(1.0, 1.0))]);
        assert!(matches!(err, Err(ConfigError::UnknownMetric(_))));
    }

    #[test]
    fn extra_params_parse_triples() {
        let p: ExtraParam = "7:2:10".parse().expect("triple");
        assert_eq!(
            p,
            ExtraParam {
                value: 7,
                weight: 2,
                threshold: 10
            }
        );
    }

    #[test]
    fn extra_params_reject_bad_syntax() {
        for raw in ["1:2", "1:2:3:4", "a:1:2", "1.5:1:2", "", "1:1:0"] {
            let err = raw.parse::<ExtraParam>();
            assert!(
                matches!(err, Err(ConfigError::MalformedParam(_))),
                "{raw:?} should be malformed"
            );
        }
        assert!(parse_extra_params(["1:1:1", "oops"]).is_err());
    }
}
