use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The closed set of signals a repository is scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CreatedSince,
    UpdatedSince,
    ContributorCount,
    OrgCount,
    CommitFrequency,
    RecentReleasesCount,
    UpdatedIssuesCount,
    ClosedIssuesCount,
    CommentFrequency,
    DependentsCount,
}

impl Metric {
    /// Canonical serialization order.
    pub const ALL: [Self; 10] = [
        Self::CreatedSince,
        Self::UpdatedSince,
        Self::ContributorCount,
        Self::OrgCount,
        Self::CommitFrequency,
        Self::RecentReleasesCount,
        Self::UpdatedIssuesCount,
        Self::ClosedIssuesCount,
        Self::CommentFrequency,
        Self::DependentsCount,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CreatedSince => "created_since",
            Self::UpdatedSince => "updated_since",
            Self::ContributorCount => "contributor_count",
            Self::OrgCount => "org_count",
            Self::CommitFrequency => "commit_frequency",
            Self::RecentReleasesCount => "recent_releases_count",
            Self::UpdatedIssuesCount => "updated_issues_count",
            Self::ClosedIssuesCount => "closed_issues_count",
            Self::CommentFrequency => "comment_frequency",
            Self::DependentsCount => "dependents_count",
        }
    }

    /// Frequencies carry one decimal place; everything else is a count.
    pub const fn is_fractional(self) -> bool {
        matches!(self, Self::CommitFrequency | Self::CommentFrequency)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| ConfigError::UnknownMetric(wanted.to_string()))
    }
}

/// A single collected value before it is slotted into a [`MetricVector`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Count(u64),
    Frequency(f64),
}

impl MetricValue {
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Count(v) => v as f64,
            Self::Frequency(v) => v,
        }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn as_count(self) -> u64 {
        match self {
            Self::Count(v) => v,
            Self::Frequency(v) => v.max(0.0).round() as u64,
        }
    }
}

/// Values for every canonical metric. Absent data is encoded by the
/// collecting adapter as zero or a capped sentinel, never as a missing field.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricVector {
    pub created_since: u64,
    pub updated_since: u64,
    pub contributor_count: u64,
    pub org_count: u64,
    pub commit_frequency: f64,
    pub recent_releases_count: u64,
    pub updated_issues_count: u64,
    pub closed_issues_count: u64,
    pub comment_frequency: f64,
    pub dependents_count: u64,
}

impl MetricVector {
    pub const fn get(&self, metric: Metric) -> MetricValue {
        match metric {
            Metric::CreatedSince => MetricValue::Count(self.created_since),
            Metric::UpdatedSince => MetricValue::Count(self.updated_since),
            Metric::ContributorCount => MetricValue::Count(self.contributor_count),
            Metric::OrgCount => MetricValue::Count(self.org_count),
            Metric::CommitFrequency => MetricValue::Frequency(self.commit_frequency),
            Metric::RecentReleasesCount => MetricValue::Count(self.recent_releases_count),
            Metric::UpdatedIssuesCount => MetricValue::Count(self.updated_issues_count),
            Metric::ClosedIssuesCount => MetricValue::Count(self.closed_issues_count),
            Metric::CommentFrequency => MetricValue::Frequency(self.comment_frequency),
            Metric::DependentsCount => MetricValue::Count(self.dependents_count),
        }
    }

    pub fn set(&mut self, metric: Metric, value: MetricValue) {
        match metric {
            Metric::CreatedSince => self.created_since = value.as_count(),
            Metric::UpdatedSince => self.updated_since = value.as_count(),
            Metric::ContributorCount => self.contributor_count = value.as_count(),
            Metric::OrgCount => self.org_count = value.as_count(),
            Metric::CommitFrequency => self.commit_frequency = value.as_f64().max(0.0),
            Metric::RecentReleasesCount => self.recent_releases_count = value.as_count(),
            Metric::UpdatedIssuesCount => self.updated_issues_count = value.as_count(),
            Metric::ClosedIssuesCount => self.closed_issues_count = value.as_count(),
            Metric::CommentFrequency => self.comment_frequency = value.as_f64().max(0.0),
            Metric::DependentsCount => self.dependents_count = value.as_count(),
        }
    }
}

/// Accumulates values that arrive in any order. `build` only succeeds once
/// every canonical metric has been supplied.
#[derive(Debug, Default)]
pub struct MetricVectorBuilder {
    vector: MetricVector,
    seen: Vec<Metric>,
}

impl MetricVectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, metric: Metric, value: MetricValue) {
        self.vector.set(metric, value);
        if !self.seen.contains(&metric) {
            self.seen.push(metric);
        }
    }

    pub fn missing(&self) -> Vec<Metric> {
        Metric::ALL
            .into_iter()
            .filter(|m| !self.seen.contains(m))
            .collect()
    }

    pub fn build(self) -> Result<MetricVector, Vec<Metric>> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(self.vector)
        } else {
            Err(missing)
        }
    }
}
