//! Error types at the crate's external boundaries.

use std::time::Duration;

use thiserror::Error;

use crate::retry::{RetryClass, Retryable};

/// Errors produced by a [`crate::source::CandidateSource`].
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    /// The source asked us to slow down (HTTP 429, or 403 with an exhausted quota).
    #[error("rate limited by candidate source")]
    RateLimited { retry_after: Option<Duration> },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection-level failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(String),

    /// A non-success response that is not a rate limit.
    #[error("candidate source returned {status}: {body}")]
    Http { status: u16, body: String },

    /// The response did not match the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Retryable for SourceError {
    fn retry_class(&self) -> RetryClass {
        match self {
            SourceError::RateLimited { retry_after } => RetryClass::RateLimited(*retry_after),
            SourceError::Timeout(_) | SourceError::Transport(_) => RetryClass::Transient,
            SourceError::Http { .. } | SourceError::Malformed(_) => RetryClass::Fatal,
        }
    }

    fn timed_out(after: Duration) -> Self {
        SourceError::Timeout(after)
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            SourceError::Malformed(e.to_string())
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// Errors produced by a [`crate::store::RecordStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl Retryable for StoreError {
    fn retry_class(&self) -> RetryClass {
        match self {
            StoreError::Timeout(_) | StoreError::Unavailable(_) => RetryClass::Transient,
            StoreError::Io(_) | StoreError::Serialization(_) => RetryClass::Fatal,
        }
    }

    fn timed_out(after: Duration) -> Self {
        StoreError::Timeout(after)
    }
}

/// Errors produced by a [`crate::notify::NotificationSink`].
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification timed out after {0:?}")]
    Timeout(Duration),

    #[error("notification transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("notification endpoint returned {0}")]
    Rejected(u16),
}

impl Retryable for NotifyError {
    fn retry_class(&self) -> RetryClass {
        match self {
            NotifyError::Timeout(_) | NotifyError::Transport(_) => RetryClass::Transient,
            NotifyError::Rejected(_) => RetryClass::Fatal,
        }
    }

    fn timed_out(after: Duration) -> Self {
        NotifyError::Timeout(after)
    }
}

/// Startup configuration problems. Fatal before any sweep begins.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to load search plan from {path}: {reason}")]
    SearchPlan { path: String, reason: String },
}
