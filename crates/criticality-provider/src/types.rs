use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Url;

use crate::error::ProviderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    GitHub,
    GitLab,
}

impl Platform {
    /// Host-suffix dispatch: `*github.com` and any host naming gitlab.
    pub fn from_host(host: &str) -> Option<Self> {
        let host = host.to_ascii_lowercase();
        if host.ends_with("github.com") {
            Some(Self::GitHub)
        } else if host.contains("gitlab") {
            Some(Self::GitLab)
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A repository identifier resolved to its platform, before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocator {
    pub platform: Platform,
    pub scheme: String,
    pub host: String,
    /// `owner/name` for GitHub; `group/.../project` for GitLab.
    pub path: String,
}

impl RepoLocator {
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let trimmed = raw.trim();
        let with_scheme = if trimmed.contains("://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        };
        let url = Url::parse(&with_scheme)
            .map_err(|e| ProviderError::InvalidIdentifier(format!("{raw}: {e}")))?;
        let host = url
            .host_str()
            .ok_or_else(|| ProviderError::InvalidIdentifier(raw.to_string()))?;
        let platform = Platform::from_host(host)
            .ok_or_else(|| ProviderError::UnsupportedPlatform(raw.to_string()))?;

        let path = url.path().trim_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path).to_string();
        let segments = path.split('/').filter(|s| !s.is_empty()).count();
        let valid = match platform {
            Platform::GitHub => segments == 2,
            Platform::GitLab => segments >= 2,
        };
        if !valid {
            return Err(ProviderError::InvalidIdentifier(raw.to_string()));
        }

        let host = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        Ok(Self {
            platform,
            scheme: url.scheme().to_string(),
            host,
            path,
        })
    }

    pub fn origin(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }

    pub fn owner_and_name(&self) -> Option<(&str, &str)> {
        self.path.rsplit_once('/')
    }
}

impl fmt::Display for RepoLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.origin(), self.path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: String,
    pub committed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatches_on_host() {
        let gh = RepoLocator::parse("github.com/rust-lang/rust").expect("github");
        assert_eq!(gh.platform, Platform::GitHub);
        assert_eq!(gh.path, "rust-lang/rust");
        assert_eq!(gh.owner_and_name(), Some(("rust-lang", "rust")));

        let gl = RepoLocator::parse("https://gitlab.gnome.org/GNOME/gtk.git").expect("gitlab");
        assert_eq!(gl.platform, Platform::GitLab);
        assert_eq!(gl.origin(), "https://gitlab.gnome.org");
        assert_eq!(gl.path, "GNOME/gtk");
        assert_eq!(gl.to_string(), "https://gitlab.gnome.org/GNOME/gtk");

        let nested = RepoLocator::parse("https://gitlab.com/group/sub/project").expect("nested");
        assert_eq!(nested.path, "group/sub/project");
    }

    #[test]
    fn rejects_unknown_hosts_and_bad_paths() {
        assert!(matches!(
            RepoLocator::parse("https://bitbucket.org/a/b"),
            Err(ProviderError::UnsupportedPlatform(_))
        ));
        assert!(matches!(
            RepoLocator::parse("https://github.com/only-owner"),
            Err(ProviderError::InvalidIdentifier(_))
        ));
    }
}
