//! REST rate-limit status.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use reconcile::SyncError;

use crate::executor::{GraphQlExecutor, Transport};

/// One rate-limit bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateBucket {
    /// Requests allowed per window.
    pub limit: u64,
    /// Requests used in the current window.
    #[serde(default)]
    pub used: u64,
    /// Requests left in the current window.
    pub remaining: u64,
    /// Window reset, in epoch seconds.
    pub reset: i64,
}

impl RateBucket {
    /// Reset time as a UTC datetime.
    pub fn reset_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.reset, 0)
    }

    /// Seconds until reset, never negative.
    pub fn seconds_until_reset(&self, now: DateTime<Utc>) -> i64 {
        (self.reset - now.timestamp()).max(0)
    }
}

/// Every bucket returned by `GET /rate_limit`, keyed by name (`core`,
/// `graphql`, `search`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimits {
    /// Buckets by name.
    pub resources: BTreeMap<String, RateBucket>,
}

impl RateLimits {
    /// The bucket GraphQL calls draw from.
    pub fn graphql(&self) -> Option<&RateBucket> {
        self.resources.get("graphql")
    }

    /// The bucket REST calls draw from.
    pub fn core(&self) -> Option<&RateBucket> {
        self.resources.get("core")
    }
}

/// Fetches the current rate-limit buckets, retrying like any other request.
#[instrument(skip_all)]
pub async fn fetch_rate_limits<T: Transport>(
    executor: &GraphQlExecutor<T>,
) -> Result<RateLimits, SyncError> {
    let body = executor.get_json("/rate_limit").await?;
    serde_json::from_value(body).map_err(|e| SyncError::Decode {
        message: format!("invalid rate_limit response: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_buckets_and_ignores_extra_members() {
        let limits: RateLimits = serde_json::from_str(
            r#"{
                "resources": {
                    "core": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1700000000 },
                    "graphql": { "limit": 5000, "used": 250, "remaining": 4750, "reset": 1700000600 },
                    "code_scanning_upload": { "limit": 1000, "used": 0, "remaining": 1000, "reset": 1700000000 }
                },
                "rate": { "limit": 5000, "used": 1, "remaining": 4999, "reset": 1700000000 }
            }"#,
        )
        .unwrap();

        assert_eq!(limits.resources.len(), 3);
        assert_eq!(limits.graphql().map(|b| b.remaining), Some(4750));

        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        assert_eq!(limits.graphql().unwrap().seconds_until_reset(now), 600);
        assert_eq!(limits.core().unwrap().seconds_until_reset(now), 0);
    }
}
