pub mod batch;
pub mod collector;
pub mod error;
pub mod retry;

pub use batch::{BatchDriver, BatchFailure, BatchReport};
pub use collector::{CollectorConfig, MetricCollector};
pub use criticality_core::*;
pub use criticality_provider::{
    CommitInfo, DependentsConfig, GitHubConfig, GitLabConfig, Platform, ProviderError,
    ProviderSession, RepoLocator, Repository, RepositoryResolver, SessionConfig,
};
pub use error::CollectError;
pub use retry::RetryPolicy;
