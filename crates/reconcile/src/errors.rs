//! Error and retry-policy types for the reconciliation domain.
//!
//! [`SyncError`] is the error every port and core operation returns. The two
//! narrower types, [`ValidationError`] and [`UnknownField`], are produced by the
//! mutation builder and the field registry and convert into it.
//!
//! [`RetryPolicy`] is a cross-cutting concern: every [`SyncError`] can report
//! whether repeating the failed operation could succeed.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ValueKind;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable` errors: rate-limit responses, gateway timeouts, dropped
///   connections.
/// - `NonRetryable` errors: invalid mutations, authorization failures, remote
///   rejections, unknown fields, bad configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from `Retry-After` or `x-ratelimit-reset` response headers).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Mutation validation
// ---------------------------------------------------------------------------

/// A field update batch that cannot be turned into a mutation.
///
/// Always a caller bug; never retried. A single invalid update rejects the
/// whole batch before any request is built.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// The update at `index` has an empty field name.
    #[error("field name cannot be empty (update #{index})")]
    EmptyFieldName {
        /// Position of the offending update in the batch.
        index: usize,
    },

    /// The named field has no remote field id, usually because the board has
    /// no field with that name.
    #[error("field ID for {field} is empty")]
    EmptyFieldId {
        /// Name of the field whose id is missing.
        field: String,
    },

    /// The value cannot be written into a field of the declared kind.
    #[error("value for {field} does not fit a {expected} field")]
    KindMismatch {
        /// Name of the offending field.
        field: String,
        /// Declared kind of the field.
        expected: ValueKind,
    },

    /// Number values must be finite to be representable in JSON.
    #[error("value for {field} is not a finite number")]
    NonFiniteNumber {
        /// Name of the offending field.
        field: String,
    },

    /// A mutation needs at least one field to write.
    #[error("no field updates to apply")]
    EmptyBatch,
}

// ---------------------------------------------------------------------------
// Registry lookup
// ---------------------------------------------------------------------------

/// The field registry was asked to compute a field it has no entry for.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("unknown field: {name}")]
pub struct UnknownField {
    /// The requested field name.
    pub name: String,
}

// ---------------------------------------------------------------------------
// Sync errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the sync engine and its ports.
///
/// Every variant that originates from the remote system carries the raw
/// diagnostic payload so operators can see exactly what was rejected.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum SyncError {
    /// A field update batch failed validation. No request was sent.
    #[error("invalid field update: {0}")]
    Validation(#[from] ValidationError),

    /// The remote system kept rate limiting the request until the attempt cap
    /// was reached.
    #[error("rate limited after {attempts} attempts\nlast output: {last_response}")]
    RateLimited {
        /// Number of attempts made.
        attempts: u32,
        /// Raw body (or transport error) of the final attempt.
        last_response: String,
        /// Wait the server advertised on the final attempt, from
        /// `retry-after` or `x-ratelimit-reset`.
        #[serde(default)]
        retry_after: Option<Duration>,
    },

    /// A transient failure (gateway error, dropped connection) persisted
    /// through every attempt.
    #[error("request failed transiently after {attempts} attempts: {message}")]
    Transient {
        /// Number of attempts made.
        attempts: u32,
        /// Description of the final failure.
        message: String,
    },

    /// The remote system rejected the request for a reason other than rate
    /// limiting.
    #[error("{message}\noutput: {payload}")]
    Request {
        /// Short description of the failure.
        message: String,
        /// Raw diagnostic payload returned by the remote system.
        payload: String,
    },

    /// A response was received but did not have the expected shape.
    #[error("unexpected response: {message}")]
    Decode {
        /// Description of what could not be decoded.
        message: String,
    },

    /// The field registry was asked for a field outside its catalog.
    #[error(transparent)]
    UnknownField(#[from] UnknownField),

    /// The run configuration or board layout cannot support the operation.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },
}

impl SyncError {
    /// Reports whether the failed operation could succeed if repeated.
    ///
    /// Errors returned by the executor have already been retried up to its
    /// attempt cap; the policy describes the nature of the failure, not a
    /// promise that another attempt will help.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            SyncError::RateLimited { retry_after, .. } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            SyncError::Transient { .. } => RetryPolicy::Retryable { after: None },
            SyncError::Validation(_)
            | SyncError::Request { .. }
            | SyncError::Decode { .. }
            | SyncError::UnknownField(_)
            | SyncError::Configuration { .. } => RetryPolicy::NonRetryable,
        }
    }
}
