//! The single retrying-call wrapper used at every external call site.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a failed call should be treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    /// Timeouts and connection failures: retry with backoff.
    Transient,
    /// The remote asked us to back off, optionally saying for how long.
    RateLimited(Option<Duration>),
    /// Retrying cannot help.
    Fatal,
}

pub trait Retryable: Sized {
    fn retry_class(&self) -> RetryClass;

    /// The error to report when an attempt exceeds the policy timeout.
    fn timed_out(after: Duration) -> Self;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts for transient failures, including the first.
    pub max_attempts: u32,
    /// Base delay between transient retries; grows linearly per attempt.
    pub backoff: Duration,
    /// Fixed suspension after a rate-limit signal.
    pub rate_limit_backoff: Duration,
    /// Retries allowed after rate-limit signals before giving up.
    pub rate_limit_retries: u32,
    /// Bound on each individual attempt.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
            rate_limit_backoff: Duration::from_secs(60),
            rate_limit_retries: 1,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Run `op` under `policy`, retrying transient and rate-limited failures.
pub async fn call<T, E, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + Display,
{
    let mut attempt: u32 = 1;
    let mut rate_limit_hits: u32 = 0;

    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(E::timed_out(policy.timeout)),
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        match err.retry_class() {
            RetryClass::Transient if attempt < policy.max_attempts => {
                let delay = policy.backoff * attempt;
                tracing::warn!(
                    "{label}: attempt {attempt}/{} failed ({err}), retrying in {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            RetryClass::RateLimited(hint) if rate_limit_hits < policy.rate_limit_retries => {
                if let Some(hint) = hint {
                    tracing::debug!("{label}: source suggested waiting {hint:?}");
                }
                tracing::warn!(
                    "{label}: rate limited, backing off for {:?}",
                    policy.rate_limit_backoff
                );
                tokio::time::sleep(policy.rate_limit_backoff).await;
                rate_limit_hits += 1;
            }
            _ => return Err(err),
        }
    }
}
