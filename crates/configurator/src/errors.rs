//! Error and retry-policy types for the job function configurator.
//!
//! [`MoError`] is what the [`crate::MoGraphQl`] port reports. [`ConfiguratorError`]
//! is what [`crate::process_engagement_events`] returns to the event listener.
//!
//! [`RetryPolicy`] is cross-cutting: the AMQP consumer uses it to decide whether
//! a failed delivery is requeued or rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EngagementUuid;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// - `Retryable`: transport failures, timeouts, 5xx and 429 responses, token
///   endpoint outages.
/// - `NonRetryable`: malformed payloads, GraphQL validation errors, responses
///   that do not match the expected shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt (e.g. from `Retry-After`).
        /// `None` means apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// Retrying will not help; the message should be rejected.
    NonRetryable,
}

impl RetryPolicy {
    /// Shorthand for `Retryable { after: None }`.
    pub fn retryable() -> Self {
        Self::Retryable { after: None }
    }

    /// Returns `true` for any [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by an implementation of [`crate::MoGraphQl`].
#[derive(Debug, Error)]
pub enum MoError {
    /// The request never produced a usable HTTP response (connect, TLS, timeout).
    #[error("Transport error talking to OS2mo: {message}")]
    Transport { message: String },

    /// Obtaining an access token from the auth server failed.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// OS2mo answered with a non-success HTTP status.
    #[error("OS2mo returned HTTP {status}: {body}")]
    Http {
        status: u16,
        body: String,
        /// Parsed `Retry-After`, when present.
        retry_after: Option<Duration>,
    },

    /// OS2mo answered 200 but the GraphQL response carried `errors`.
    #[error("GraphQL errors: {}", .messages.join("; "))]
    GraphQl { messages: Vec<String> },

    /// The response did not match the shape the query asked for.
    #[error("Unexpected response from OS2mo: {message}")]
    Decode { message: String },
}

impl MoError {
    /// Maps the failure onto a retry decision.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::Transport { .. } | Self::Authentication { .. } => RetryPolicy::retryable(),
            Self::Http {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            Self::Http { .. } | Self::GraphQl { .. } | Self::Decode { .. } => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Processing errors
// ---------------------------------------------------------------------------

/// Errors returned by [`crate::process_engagement_events`].
#[derive(Debug, Error)]
pub enum ConfiguratorError {
    /// Reading the engagement from OS2mo failed.
    #[error("Failed to read engagement {engagement}: {source}")]
    ReadEngagement {
        engagement: EngagementUuid,
        #[source]
        source: MoError,
    },

    /// Looking up the job function class failed.
    #[error("Failed to look up job function '{value}': {source}")]
    LookupJobFunction {
        value: String,
        #[source]
        source: MoError,
    },

    /// Writing the new job function back to OS2mo failed.
    #[error("Failed to update job function of engagement {engagement}: {source}")]
    WriteJobFunction {
        engagement: EngagementUuid,
        #[source]
        source: MoError,
    },
}

impl ConfiguratorError {
    /// Retry decision of the underlying port failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            Self::ReadEngagement { source, .. }
            | Self::LookupJobFunction { source, .. }
            | Self::WriteJobFunction { source, .. } => source.retry_policy(),
        }
    }
}
