pub mod dependents;
pub mod github;
pub mod gitlab;

pub use dependents::DependentsScraper;
pub use github::GitHubRepository;
pub use gitlab::GitLabRepository;
