pub mod config;
pub mod credentials;
pub mod error;
pub mod factory;
pub mod github_client;
pub mod gitlab_client;
pub mod pagination;
pub mod providers;
pub mod signals;
pub mod traits;
pub mod types;

pub use config::*;
pub use credentials::{CredentialPool, RateLimitState, QUOTA_SAFETY_FLOOR};
pub use error::ProviderError;
pub use factory::*;
pub use github_client::GitHubClient;
pub use gitlab_client::GitLabClient;
pub use providers::{DependentsScraper, GitHubRepository, GitLabRepository};
pub use traits::*;
pub use types::*;
