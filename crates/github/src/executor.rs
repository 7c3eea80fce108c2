//! Rate-limit-aware GraphQL executor.
//!
//! Every call to the GitHub API goes through [`GraphQlExecutor`]: GraphQL
//! requests via [`RequestExecutor::execute`], REST reads via
//! [`GraphQlExecutor::get_json`]. Each attempt's outcome falls into one of
//! three buckets:
//!
//! - **rate limited**: a 429, a 403 carrying `x-ratelimit-reset`, a GraphQL
//!   error of type `RATE_LIMITED`, or any body or transport error mentioning
//!   one of [`RATE_LIMIT_PHRASES`];
//! - **transient**: 502/503/504 and connect or timeout failures;
//! - **fatal**: everything else, returned on the first attempt.
//!
//! Each failure becomes a [`SyncError`] and its [`RetryPolicy`] decides whether
//! to go again. Rate-limited and transient attempts are retried up to
//! [`BackoffSchedule::max_attempts`] times. The wait before attempt `k + 1` is
//! `base_delay * 2^(k - 1)`, unless the server said when to come back: a
//! `retry-after` header is honoured as given, and an `x-ratelimit-reset`
//! timestamp is waited out plus [`BackoffSchedule::reset_margin`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use reconcile::{GraphQlRequest, RequestExecutor, RetryPolicy, SyncError};

/// Phrases that mark a response or error as rate limited. Matched
/// case-insensitively.
pub const RATE_LIMIT_PHRASES: [&str; 4] = [
    "rate limit",
    "api rate limit exceeded",
    "secondary rate limit",
    "abuse detection",
];

/// Returns `true` if `text` mentions rate limiting.
pub fn is_rate_limit_message(text: &str) -> bool {
    let lower = text.to_lowercase();
    RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p))
}

// ---------------------------------------------------------------------------
// Transport seam
// ---------------------------------------------------------------------------

/// What one HTTP exchange returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
    /// `x-ratelimit-reset`, in epoch seconds.
    pub rate_limit_reset: Option<i64>,
    /// `retry-after`.
    pub retry_after: Option<Duration>,
}

impl RawResponse {
    /// A 200 response with the given body.
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            ..Self::default()
        }
    }
}

/// A request that produced no HTTP response.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    /// Description of the failure.
    pub message: String,
    /// Connect failures and timeouts are worth another attempt.
    pub transient: bool,
}

/// Sends one request and reports the raw outcome.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Posts the GraphQL request once. No retries.
    async fn post_graphql(&self, request: &GraphQlRequest) -> Result<RawResponse, TransportError>;

    /// Issues one REST `GET` against `path` (e.g. `/rate_limit`). No retries.
    async fn get(&self, path: &str) -> Result<RawResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Attempt cap and delays between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffSchedule {
    /// Total attempts, the first included.
    pub max_attempts: u32,
    /// Delay after the first failed attempt; doubles each time.
    pub base_delay: Duration,
    /// Added to an advertised reset time.
    pub reset_margin: Duration,
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(60),
            reset_margin: Duration::from_secs(60),
        }
    }
}

impl BackoffSchedule {
    /// Exponential delay after the given failed attempt (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exponent)
    }

    /// Delay until an epoch-second reset time, plus the margin.
    pub fn until_reset(&self, reset_epoch: i64, now_epoch: i64) -> Duration {
        let remaining = u64::try_from(reset_epoch.saturating_sub(now_epoch)).unwrap_or(0);
        Duration::from_secs(remaining) + self.reset_margin
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// Retries rate-limited and transient failures; surfaces everything else.
pub struct GraphQlExecutor<T> {
    transport: T,
    schedule: BackoffSchedule,
}

impl<T: Transport> GraphQlExecutor<T> {
    /// Creates an executor with the default schedule.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            schedule: BackoffSchedule::default(),
        }
    }

    /// Replaces the backoff schedule.
    pub fn with_schedule(mut self, schedule: BackoffSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Issues a REST `GET` against `path` under the same retry rules as
    /// GraphQL requests and returns the decoded JSON body.
    #[instrument(skip(self))]
    pub async fn get_json(&self, path: &str) -> Result<Value, SyncError> {
        self.with_retries(|attempt| async move {
            let response = self
                .transport
                .get(path)
                .await
                .map_err(|err| transport_failure(err, attempt))?;
            let response = self.check_status(response, attempt)?;
            serde_json::from_str(&response.body).map_err(|e| SyncError::Decode {
                message: format!("invalid response from {path}: {e}"),
            })
        })
        .await
    }

    /// Runs `call` until it succeeds, fails with a non-retryable error, or the
    /// attempt cap is reached. `call` receives the 1-based attempt number.
    async fn with_retries<F, Fut>(&self, call: F) -> Result<Value, SyncError>
    where
        F: Fn(u32) -> Fut,
        Fut: Future<Output = Result<Value, SyncError>>,
    {
        let max_attempts = self.schedule.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match call(attempt).await {
                Ok(data) => {
                    debug!(attempt, "request succeeded");
                    return Ok(data);
                }
                Err(err) => err,
            };

            let after = match err.retry_policy() {
                RetryPolicy::NonRetryable => return Err(err),
                RetryPolicy::Retryable { after } => after,
            };
            if attempt >= max_attempts {
                return Err(err);
            }

            let delay = after.unwrap_or_else(|| self.schedule.delay_after(attempt));
            warn!(
                attempt,
                max_attempts,
                delay_secs = delay.as_secs(),
                error = %err,
                "retrying GitHub request"
            );
            sleep(delay).await;
        }
    }

    async fn attempt(&self, request: &GraphQlRequest, attempt: u32) -> Result<Value, SyncError> {
        let response = self
            .transport
            .post_graphql(request)
            .await
            .map_err(|err| transport_failure(err, attempt))?;
        let response = self.check_status(response, attempt)?;

        let parsed: GraphQlResponse =
            serde_json::from_str(&response.body).map_err(|e| SyncError::Decode {
                message: format!("invalid GraphQL response: {e}"),
            })?;

        if !parsed.errors.is_empty() {
            let limited = parsed.errors.iter().any(|e| {
                e.kind.as_deref() == Some("RATE_LIMITED") || is_rate_limit_message(&e.message)
            });
            if limited {
                return Err(SyncError::RateLimited {
                    attempts: attempt,
                    retry_after: self.advertised_wait(&response),
                    last_response: response.body,
                });
            }
            let messages: Vec<_> = parsed.errors.iter().map(|e| e.message.as_str()).collect();
            return Err(SyncError::Request {
                message: format!("GraphQL errors: {}", messages.join(", ")),
                payload: response.body,
            });
        }

        parsed.data.ok_or_else(|| SyncError::Decode {
            message: "no data in GraphQL response".into(),
        })
    }

    /// Passes 2xx responses through and turns every other status into the
    /// matching error.
    fn check_status(&self, response: RawResponse, attempt: u32) -> Result<RawResponse, SyncError> {
        let status = response.status;
        let limited = status == 429
            || (status == 403 && response.rate_limit_reset.is_some())
            || (!(200..300).contains(&status) && is_rate_limit_message(&response.body));

        if limited {
            return Err(SyncError::RateLimited {
                attempts: attempt,
                retry_after: self.advertised_wait(&response),
                last_response: response.body,
            });
        }
        if matches!(status, 502..=504) {
            return Err(SyncError::Transient {
                attempts: attempt,
                message: format!("HTTP {status}: {}", response.body),
            });
        }
        if !(200..300).contains(&status) {
            return Err(SyncError::Request {
                message: format!("GitHub API returned HTTP {status}"),
                payload: response.body,
            });
        }
        Ok(response)
    }

    fn advertised_wait(&self, response: &RawResponse) -> Option<Duration> {
        response.retry_after.or_else(|| {
            response
                .rate_limit_reset
                .map(|reset| self.schedule.until_reset(reset, chrono::Utc::now().timestamp()))
        })
    }
}

fn transport_failure(err: TransportError, attempt: u32) -> SyncError {
    if err.transient {
        SyncError::Transient {
            attempts: attempt,
            message: err.message,
        }
    } else if is_rate_limit_message(&err.message) {
        SyncError::RateLimited {
            attempts: attempt,
            last_response: err.message,
            retry_after: None,
        }
    } else {
        SyncError::Request {
            message: format!("GitHub request failed: {}", err.message),
            payload: String::new(),
        }
    }
}

#[async_trait]
impl<T: Transport> RequestExecutor for GraphQlExecutor<T> {
    #[instrument(skip_all)]
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, SyncError> {
        self.with_retries(|attempt| self.attempt(request, attempt)).await
    }
}
