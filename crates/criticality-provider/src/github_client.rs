use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::GitHubConfig;
use crate::credentials::{CredentialPool, RateLimitState, soonest_reset_wait};
use crate::error::ProviderError;
use crate::pagination::last_page;

/// Rate-limited REST client. Created once per run and shared by every
/// repository handle and metric task.
pub struct GitHubClient {
    http: Client,
    config: GitHubConfig,
    pool: CredentialPool,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self, ProviderError> {
        let pool = CredentialPool::new(config.tokens.clone(), config.quota_floor)?;
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { http, config, pool })
    }

    pub const fn config(&self) -> &GitHubConfig {
        &self.config
    }

    pub const fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Returns a credential above the quota floor, checking quotas and rotating only
    /// when the cached one is unset or flagged near exhaustion. Credentials
    /// known to be exhausted are skipped until their reset. Sleeps until the
    /// soonest reset when every credential is exhausted.
    pub async fn active_credential(&self) -> Result<usize, ProviderError> {
        if let Some(idx) = self.pool.cached() {
            return Ok(idx);
        }
        let _rotation = self.pool.lock_rotation().await;
        if let Some(idx) = self.pool.cached() {
            return Ok(idx);
        }

        loop {
            let mut exhausted = Vec::with_capacity(self.pool.len());
            for idx in 0..self.pool.len() {
                // A credential that just answered quota-exceeded stays out until its reset.
                if let Some(state) = self.pool.known_exhausted(idx, Utc::now()) {
                    exhausted.push(state);
                    continue;
                }
                let state = self.fetch_quota(idx).await?;
                self.pool.record(idx, state);
                if !state.is_near_exhaustion(self.pool.floor()) {
                    debug!(credential = idx, remaining = state.remaining, "credential selected");
                    self.pool.activate(idx);
                    return Ok(idx);
                }
                exhausted.push(state);
            }

            let wait = soonest_reset_wait(&exhausted, Utc::now(), self.config.max_quota_wait);
            warn!(
                minutes = (wait.as_secs_f64() / 60.0 * 10.0).round() / 10.0,
                "rate limit exceeded, sleeping till reset"
            );
            tokio::time::sleep(wait).await;
        }
    }

    async fn fetch_quota(&self, idx: usize) -> Result<RateLimitState, ProviderError> {
        let token = self.token(idx)?;
        let res = self
            .http
            .get(self.api_url("rate_limit"))
            .header(AUTHORIZATION, format!("token {token}"))
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("rate limit check failed: {e}")))?;
        if !res.status().is_success() {
            return Err(ProviderError::Unavailable(format!(
                "rate limit check failed: status={}",
                res.status().as_u16()
            )));
        }
        let parsed: RateLimitResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Unavailable(format!("rate limit check failed: {e}")))?;
        Ok(RateLimitState {
            remaining: parsed.resources.core.remaining,
            reset_at: epoch_to_utc(parsed.resources.core.reset),
        })
    }

    fn token(&self, idx: usize) -> Result<&str, ProviderError> {
        self.pool
            .token(idx)
            .ok_or_else(|| ProviderError::Config(format!("no credential at index {idx}")))
    }

    /// GET with the active credential attached. A quota-exceeded answer
    /// invalidates that credential and the call is replayed on another one.
    pub async fn get(&self, url: &str, query: &[(&str, String)]) -> Result<Response, ProviderError> {
        for _ in 0..=self.pool.len() {
            let idx = self.active_credential().await?;
            let token = self.token(idx)?;
            let res = self
                .http
                .get(url)
                .query(query)
                .header(AUTHORIZATION, format!("token {token}"))
                .header(ACCEPT, "application/vnd.github+json")
                .send()
                .await?;

            let state = rate_limit_from_headers(res.headers());
            if let Some(state) = state {
                self.pool.record(idx, state);
            }
            if is_quota_exceeded(res.status(), state) {
                let reset_at = state.map_or_else(Utc::now, |s| s.reset_at);
                warn!(credential = idx, url, "quota exceeded, rotating credential");
                self.pool.invalidate(idx, reset_at);
                continue;
            }
            return Ok(res);
        }
        Err(ProviderError::Unavailable(format!(
            "quota exhausted on every credential for {url}"
        )))
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let res = ensure_success(self.get(url, query).await?).await?;
        Ok(res.json().await?)
    }

    /// Total records of a list endpoint, read from the `last` page number
    /// at one record per page.
    pub async fn count(&self, url: &str, query: &[(&str, String)]) -> Result<u64, ProviderError> {
        let mut query = query.to_vec();
        query.push(("per_page", "1".to_string()));
        let res = self.get(url, &query).await?;
        if res.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }
        let res = ensure_success(res).await?;
        if let Some(total) = last_page(res.headers()) {
            return Ok(total);
        }
        let items: Vec<serde_json::Value> = res.json().await?;
        Ok(items.len() as u64)
    }
}

pub(crate) async fn ensure_success(res: Response) -> Result<Response, ProviderError> {
    if res.status().is_success() {
        return Ok(res);
    }
    let status = res.status().as_u16();
    let body = res.text().await.unwrap_or_default();
    Err(ProviderError::Api { status, body })
}

fn epoch_to_utc(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

fn header_i64(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

pub fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitState> {
    let remaining = u64::try_from(header_i64(headers, "x-ratelimit-remaining")?).ok()?;
    let reset = header_i64(headers, "x-ratelimit-reset")?;
    Some(RateLimitState {
        remaining,
        reset_at: epoch_to_utc(reset),
    })
}

fn is_quota_exceeded(status: StatusCode, state: Option<RateLimitState>) -> bool {
    matches!(status, StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS)
        && state.is_some_and(|s| s.remaining == 0)
}

#[derive(Debug, Deserialize)]
struct RateLimitResponse {
    resources: RateLimitResources,
}

#[derive(Debug, Deserialize)]
struct RateLimitResources {
    core: CoreRateLimit,
}

#[derive(Debug, Deserialize)]
struct CoreRateLimit {
    remaining: u64,
    reset: i64,
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn reads_quota_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
        headers.insert("x-ratelimit-reset", HeaderValue::from_static("1700000000"));
        let state = rate_limit_from_headers(&headers).expect("state");
        assert_eq!(state.remaining, 0);
        assert_eq!(state.reset_at.timestamp(), 1_700_000_000);
        assert!(is_quota_exceeded(StatusCode::FORBIDDEN, Some(state)));
        assert!(!is_quota_exceeded(StatusCode::OK, Some(state)));
        assert!(!is_quota_exceeded(StatusCode::FORBIDDEN, None));
    }

    #[test]
    fn rate_limit_body_parses() {
        let raw = r#"{"resources":{"core":{"limit":5000,"remaining":4321,"reset":1700000000,"used":679}}}"#;
        let parsed: RateLimitResponse = serde_json::from_str(raw).expect("parse");
        assert_eq!(parsed.resources.core.remaining, 4321);
    }
}
