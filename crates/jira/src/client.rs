//! Jira Cloud REST client.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, info, instrument};

use reconcile::TicketRecord;

use crate::issue::{CustomFieldIds, SearchPage};

/// Tickets requested per search page.
pub const SEARCH_PAGE_SIZE: u32 = 50;

const SEARCH_PATH: &str = "/rest/api/3/search";
const USER_AGENT_VALUE: &str = concat!("boardsync/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the Jira API.
#[derive(Debug, Error)]
pub enum JiraError {
    /// The request could not be sent or its body read.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Jira answered with a non-success status.
    #[error("Jira API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The body was not the expected JSON.
    #[error("invalid Jira response: {0}")]
    Decode(String),

    #[error("invalid Jira configuration: {0}")]
    Configuration(String),
}

/// Authenticated client for one Jira instance.
#[derive(Clone)]
pub struct JiraClient {
    client: reqwest::Client,
    base_url: String,
    user: String,
    token: String,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// Builds a client that signs every request with `user` and API `token`.
    pub fn new(
        base_url: impl Into<String>,
        user: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, JiraError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(JiraError::Configuration("instance URL is empty".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url,
            user: user.into(),
            token: token.into(),
        })
    }

    /// Instance root, without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns every ticket matching `jql`, following `startAt` paging.
    #[instrument(skip(self, custom), fields(url = %self.base_url))]
    pub async fn search(
        &self,
        jql: &str,
        custom: &CustomFieldIds,
    ) -> Result<Vec<TicketRecord>, JiraError> {
        let requested = custom.request_list().join(",");
        let mut tickets = Vec::new();
        let mut start_at = 0u64;
        loop {
            let page: SearchPage = self
                .get(
                    SEARCH_PATH,
                    &[
                        ("jql", jql.to_string()),
                        ("startAt", start_at.to_string()),
                        ("maxResults", SEARCH_PAGE_SIZE.to_string()),
                        ("fields", requested.clone()),
                    ],
                )
                .await?;

            let fetched = page.issues.len() as u64;
            info!(start_at = page.start_at, fetched, total = page.total, "ticket page");
            tickets.extend(
                page.issues
                    .into_iter()
                    .map(|issue| issue.into_ticket(&self.base_url, custom)),
            );

            start_at = page.start_at + fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }
        Ok(tickets)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, JiraError> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(&self.token))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            serde_json::from_str(&text).map_err(|e| JiraError::Decode(e.to_string()))
        } else {
            Err(JiraError::Api {
                status: status.as_u16(),
                message: text,
            })
        }
    }
}
