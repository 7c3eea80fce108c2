//! Parsing of GitHub issue and pull request URLs.

use reqwest::Url;
use thiserror::Error;

use reconcile::{ItemKind, RepositoryId};

/// Why a URL could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    /// Not a URL at all.
    #[error("invalid URL: {0}")]
    Invalid(String),
    /// The host is not github.com.
    #[error("URL is not a GitHub URL")]
    NotGithub,
    /// Fewer than four path segments.
    #[error("URL path is not in the expected format")]
    BadPath,
    /// Third segment is neither `pull` nor `issues`.
    #[error("URL type is neither a pull request nor an issue")]
    BadKind,
    /// Fourth segment is not a number.
    #[error("failed to parse number: {0}")]
    BadNumber(String),
}

/// The parts of `https://github.com/<owner>/<repo>/(pull|issues)/<n>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubItemUrl {
    /// Repository the item lives in.
    pub repo: RepositoryId,
    /// Issue or pull request.
    pub kind: ItemKind,
    /// Item number.
    pub number: u64,
}

/// Parses an issue or pull request URL.
pub fn parse_github_url(value: &str) -> Result<GithubItemUrl, UrlError> {
    let url = Url::parse(value).map_err(|e| UrlError::Invalid(e.to_string()))?;
    if !url.host_str().is_some_and(|h| h.contains("github.com")) {
        return Err(UrlError::NotGithub);
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let [owner, name, kind, number, ..] = segments.as_slice() else {
        return Err(UrlError::BadPath);
    };

    let kind = match *kind {
        "pull" => ItemKind::PullRequest,
        "issues" => ItemKind::Issue,
        _ => return Err(UrlError::BadKind),
    };
    let number = number
        .parse()
        .map_err(|_| UrlError::BadNumber((*number).to_string()))?;
    let repo = RepositoryId::new(*owner, *name).ok_or(UrlError::BadPath)?;

    Ok(GithubItemUrl { repo, kind, number })
}
