//! Shared handle used by every GitHub adapter.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use reconcile::{GraphQlRequest, RequestExecutor, SyncError};

/// Cheap-to-clone wrapper around a [`RequestExecutor`] with typed decoding.
#[derive(Clone)]
pub struct GithubClient {
    executor: Arc<dyn RequestExecutor>,
}

impl GithubClient {
    /// Wraps any executor.
    pub fn new(executor: Arc<dyn RequestExecutor>) -> Self {
        Self { executor }
    }

    /// Executes the request and decodes its `data` member into `T`.
    pub async fn query<T: DeserializeOwned>(&self, request: &GraphQlRequest) -> Result<T, SyncError> {
        let data = self.executor.execute(request).await?;
        serde_json::from_value(data).map_err(|e| SyncError::Decode {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl RequestExecutor for GithubClient {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, SyncError> {
        self.executor.execute(request).await
    }
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient").finish_non_exhaustive()
    }
}
