//! Sub-command implementations.

pub mod fields;
pub mod jira;
pub mod project;
pub mod rate_limits;
pub mod sync;

use std::sync::Arc;

use anyhow::Context;
use github::{GithubClient, GraphQlExecutor, HttpTransport};

/// The retrying executor over the production transport.
pub type GithubExecutor = GraphQlExecutor<HttpTransport>;

/// Builds the production GitHub client for `api_url`. The returned executor is
/// the one the client sends through, for REST calls made outside it.
pub fn connect(token: &str, api_url: &str) -> anyhow::Result<(Arc<GithubExecutor>, GithubClient)> {
    let transport = HttpTransport::new(token, api_url).context("failed to create GitHub client")?;
    let executor = Arc::new(GraphQlExecutor::new(transport));
    let client = GithubClient::new(executor.clone());
    Ok((executor, client))
}
