use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("invalid repository identifier: {0}")]
    InvalidIdentifier(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("repository is empty: {0}")]
    EmptyRepository(String),

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("provider returned invalid response: {0}")]
    InvalidResponse(String),

    #[error("provider API error: status={status}, body={body}")]
    Api { status: u16, body: String },
}

impl ProviderError {
    /// Network failures and server-side errors that may succeed when the
    /// whole collection pass is redone.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable(_) => true,
            Self::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.is_request()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            Self::Api { status, body } => {
                *status >= 500 || *status == 429 || (*status == 403 && is_rate_limit_body(body))
            }
            _ => false,
        }
    }

    /// Errors that make the whole run meaningless rather than one repository.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedPlatform(_) | Self::InvalidIdentifier(_) | Self::Config(_)
        )
    }
}

/// Secondary rate limits answer 403 with quota left; only the message tells.
fn is_rate_limit_body(body: &str) -> bool {
    body.to_ascii_lowercase().contains("rate limit")
}
