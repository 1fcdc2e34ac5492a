use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::GitLabConfig;
use crate::error::ProviderError;
use crate::github_client::ensure_success;
use crate::pagination::{next_page_header, total_header, total_pages_header};

/// Client for one GitLab instance. Falls back to anonymous access when the
/// configured token is missing or rejected.
pub struct GitLabClient {
    http: Client,
    base: String,
    token: Option<String>,
}

impl GitLabClient {
    pub async fn connect(base: &str, config: &GitLabConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let mut client = Self {
            http,
            base: base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        };
        if client.token.is_some() {
            let res = client.get("user", &[]).await?;
            if matches!(res.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                info!(
                    host = %client.base,
                    "auth token didn't work, trying unauthenticated; comment_frequency may be incomplete"
                );
                client.token = None;
            }
        }
        Ok(client)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    pub fn api_url(&self, path: &str) -> String {
        format!("{}/api/v4/{}", self.base, path.trim_start_matches('/'))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Response, ProviderError> {
        let mut req = self.http.get(self.api_url(path)).query(query);
        if let Some(token) = &self.token {
            req = req.header("PRIVATE-TOKEN", token);
        }
        Ok(req.send().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ProviderError> {
        let res = ensure_success(self.get(path, query).await?).await?;
        Ok(res.json().await?)
    }

    /// Total records of a list endpoint. Uses `X-Total` or `X-Total-Pages`
    /// when present and counts page by page otherwise.
    pub async fn total(&self, path: &str, query: &[(&str, String)]) -> Result<u64, ProviderError> {
        let mut q = query.to_vec();
        q.push(("per_page", "1".to_string()));
        let res = ensure_success(self.get(path, &q).await?).await?;
        let headers = res.headers();
        // At one record per page the page count is the record count.
        if let Some(total) = total_header(headers).or_else(|| total_pages_header(headers)) {
            return Ok(total);
        }
        if next_page_header(headers).is_none() {
            let items: Vec<serde_json::Value> = res.json().await?;
            return Ok(items.len() as u64);
        }
        debug!(path, "no total headers, counting pages");
        let mut total = 0u64;
        self.for_each_page(path, query, u64::MAX, |items: Vec<serde_json::Value>| {
            total += items.len() as u64;
            true
        })
        .await?;
        Ok(total)
    }

    /// Last record of a list endpoint, i.e. the oldest for newest-first listings.
    pub async fn last_item<T>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>, ProviderError>
    where
        T: DeserializeOwned + Send,
    {
        let mut q = query.to_vec();
        q.push(("per_page", "1".to_string()));
        let res = ensure_success(self.get(path, &q).await?).await?;
        let headers = res.headers();
        let pages = total_pages_header(headers).or_else(|| total_header(headers));
        let has_next = next_page_header(headers).is_some();

        match pages {
            Some(n) if n > 1 => {
                q.push(("page", n.to_string()));
                let mut items: Vec<T> = self.get_json(path, &q).await?;
                Ok(items.pop())
            }
            _ if has_next && pages.is_none() => {
                debug!(path, "no total headers, walking to the last page");
                let mut last = None;
                self.for_each_page(path, query, u64::MAX, |mut items: Vec<T>| {
                    if let Some(item) = items.pop() {
                        last = Some(item);
                    }
                    true
                })
                .await?;
                Ok(last)
            }
            _ => {
                let mut items: Vec<T> = res.json().await?;
                Ok(items.pop())
            }
        }
    }

    /// Walks pages of 100 until `keep_going` returns false, the last page is
    /// reached or `max_pages` pages have been read.
    pub async fn for_each_page<T, F>(
        &self,
        path: &str,
        query: &[(&str, String)],
        max_pages: u64,
        mut keep_going: F,
    ) -> Result<(), ProviderError>
    where
        T: DeserializeOwned + Send,
        F: FnMut(Vec<T>) -> bool + Send,
    {
        let mut page = 1u64;
        while page <= max_pages {
            let mut q = query.to_vec();
            q.push(("per_page", "100".to_string()));
            q.push(("page", page.to_string()));
            let res = ensure_success(self.get(path, &q).await?).await?;
            let next = next_page_header(res.headers());
            let items: Vec<T> = res.json().await?;
            if items.is_empty() || !keep_going(items) {
                break;
            }
            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }
        Ok(())
    }
}
