use regex::Regex;
use reqwest::Client;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use crate::config::DependentsConfig;
use crate::error::ProviderError;

/// Matches the result count on the platform-wide commit search page.
const DEPENDENTS_PATTERN: &str = r"(?s).*[^0-9,]([0-9,]+).*commit results";

/// Estimates dependents by counting commit-search hits that mention the
/// repository path. Shared by both adapters.
pub struct DependentsScraper {
    http: Client,
    config: DependentsConfig,
    pattern: Regex,
}

impl DependentsScraper {
    pub fn new(config: DependentsConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let pattern = Regex::new(DEPENDENTS_PATTERN)
            .map_err(|e| ProviderError::Config(format!("dependents pattern: {e}")))?;
        Ok(Self {
            http,
            config,
            pattern,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}/search", self.config.web_base.trim_end_matches('/'))
    }

    /// Retries non-200 answers with exponential backoff; 0 if never matched.
    pub async fn count(&self, repo_path: &str) -> Result<u64, ProviderError> {
        let query = [
            ("q", format!("\"{repo_path}\"")),
            ("type", "commits".to_string()),
        ];
        for attempt in 0..self.config.retries {
            let mut req = self.http.get(self.search_url()).query(&query);
            if let Some(token) = &self.config.token {
                req = req.header(AUTHORIZATION, format!("token {token}"));
            }
            match req.send().await {
                Ok(res) if res.status().is_success() => {
                    let body = res.text().await?;
                    return Ok(self.extract(&body).unwrap_or(0));
                }
                Ok(res) => {
                    debug!(repo = repo_path, status = res.status().as_u16(), attempt, "dependents search refused");
                }
                Err(e) => {
                    debug!(repo = repo_path, error = %e, attempt, "dependents search failed");
                }
            }
            tokio::time::sleep(self.config.base_delay.saturating_mul(1 << attempt.min(16))).await;
        }
        warn!(repo = repo_path, "dependents search never succeeded, using 0");
        Ok(0)
    }

    pub fn extract(&self, body: &str) -> Option<u64> {
        let digits = self.pattern.captures(body)?.get(1)?.as_str().replace(',', "");
        digits.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> DependentsScraper {
        DependentsScraper::new(DependentsConfig::new(None)).expect("scraper")
    }

    #[test]
    fn extracts_comma_grouped_counts() {
        let body = "<html>\n<h3>\n  12,345 commit results\n</h3></html>";
        assert_eq!(scraper().extract(body), Some(12_345));
    }

    #[test]
    fn missing_count_is_none() {
        assert_eq!(scraper().extract("<html>We couldn't find any commits</html>"), None);
    }
}
