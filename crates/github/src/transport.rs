//! `reqwest` transport for the GitHub API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER, USER_AGENT};
use reqwest::Response;
use tracing::debug;

use reconcile::{GraphQlRequest, SyncError};

use crate::executor::{RawResponse, Transport, TransportError};

/// Public GitHub API root.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

const USER_AGENT_VALUE: &str = concat!("boardsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Authenticated HTTP client for one GitHub API root.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
}

impl HttpTransport {
    /// Builds a client that authenticates with `token` against `api_url`
    /// (e.g. [`DEFAULT_API_URL`]).
    pub fn new(token: &str, api_url: impl Into<String>) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            SyncError::Configuration {
                message: format!("invalid GitHub token: {e}"),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SyncError::Configuration {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// The GraphQL endpoint.
    pub fn graphql_url(&self) -> String {
        format!("{}/graphql", self.api_url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_graphql(&self, request: &GraphQlRequest) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .post(self.graphql_url())
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        read_response(response).await
    }

    async fn get(&self, path: &str) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.api_url, path);
        debug!(%url, "GET");
        let response = self.client.get(&url).send().await.map_err(transport_error)?;
        read_response(response).await
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    TransportError {
        transient: err.is_timeout() || err.is_connect(),
        message: err.to_string(),
    }
}

async fn read_response(response: Response) -> Result<RawResponse, TransportError> {
    let status = response.status().as_u16();
    let headers = response.headers();
    let rate_limit_reset = header_number(headers, "x-ratelimit-reset");
    let retry_after = header_number(headers, RETRY_AFTER.as_str())
        .and_then(|secs| u64::try_from(secs).ok())
        .map(Duration::from_secs);

    let body = response.text().await.map_err(transport_error)?;
    debug!(status, bytes = body.len(), "response received");

    Ok(RawResponse {
        status,
        body,
        rate_limit_reset,
        retry_after,
    })
}

fn header_number(headers: &HeaderMap, name: &str) -> Option<i64> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graphql_url_strips_trailing_slash() {
        let transport = HttpTransport::new("ghp_token", "http://localhost:8080/").unwrap();
        assert_eq!(transport.graphql_url(), "http://localhost:8080/graphql");
    }

    #[test]
    fn test_rejects_token_with_newline() {
        assert!(matches!(
            HttpTransport::new("bad\ntoken", DEFAULT_API_URL),
            Err(SyncError::Configuration { .. })
        ));
    }
}
