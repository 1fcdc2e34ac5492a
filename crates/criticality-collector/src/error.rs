use criticality_core::Metric;
use criticality_provider::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("metric {metric} failed: {source}")]
    Metric {
        metric: Metric,
        source: ProviderError,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("metric vector incomplete, missing: {0:?}")]
    Incomplete(Vec<Metric>),

    #[error("metric task aborted: {0}")]
    Join(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        last: Box<CollectError>,
    },
}

impl CollectError {
    /// Failures worth redoing the whole collection pass for.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Metric { source, .. } | Self::Provider(source) => source.is_transient(),
            _ => false,
        }
    }

    /// Configuration problems that should stop the batch rather than skip
    /// one repository.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::Metric { source, .. } | Self::Provider(source) => source.is_fatal(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_follows_the_provider_error() {
        let e = CollectError::Metric {
            metric: Metric::OrgCount,
            source: ProviderError::Unavailable("timeout".to_string()),
        };
        assert!(e.is_transient());
        assert!(!e.is_fatal());

        let e = CollectError::from(ProviderError::UnsupportedPlatform("x".to_string()));
        assert!(!e.is_transient());
        assert!(e.is_fatal());

        let e = CollectError::Incomplete(vec![Metric::DependentsCount]);
        assert!(!e.is_transient());
        assert!(e.to_string().contains("DependentsCount"));
    }
}
