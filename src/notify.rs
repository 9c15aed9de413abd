//! End-of-run notification sinks.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::NotifyError;
use crate::models::RunSummary;

/// Failure report: the error detail plus whatever the run managed to count.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub error: String,
    pub summary: RunSummary,
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn on_success(&self, summary: &RunSummary) -> Result<(), NotifyError>;

    async fn on_failure(&self, failure: &RunFailure) -> Result<(), NotifyError>;
}

/// Writes the outcome to the log.
#[derive(Debug, Default, Clone)]
pub struct TracingSink;

#[async_trait]
impl NotificationSink for TracingSink {
    async fn on_success(&self, s: &RunSummary) -> Result<(), NotifyError> {
        tracing::info!(
            "Run {} finished in {}ms: {} candidates, {} inserted, {} updated, {} reinserted, {} skipped, {} filtered, {} errors ({:.1}% stored)",
            s.run_id,
            s.elapsed_ms,
            s.candidates,
            s.inserted,
            s.updated,
            s.reinserted,
            s.skipped,
            s.filtered,
            s.errors,
            s.success_rate()
        );
        Ok(())
    }

    async fn on_failure(&self, failure: &RunFailure) -> Result<(), NotifyError> {
        tracing::error!(
            "Run {} failed after {}ms: {}",
            failure.summary.run_id,
            failure.summary.elapsed_ms,
            failure.error
        );
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum WebhookPayload<'a> {
    RunCompleted { summary: &'a RunSummary },
    RunFailed { error: &'a str, summary: &'a RunSummary },
}

/// POSTs the outcome as JSON to a fixed URL.
#[derive(Clone)]
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookSink {
    pub fn new(client: reqwest::Client, url: &str, timeout: Duration) -> Self {
        Self { client, url: url.to_string(), timeout }
    }

    async fn post(&self, payload: &WebhookPayload<'_>) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn on_success(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        self.post(&WebhookPayload::RunCompleted { summary }).await
    }

    async fn on_failure(&self, failure: &RunFailure) -> Result<(), NotifyError> {
        self.post(&WebhookPayload::RunFailed {
            error: &failure.error,
            summary: &failure.summary,
        })
        .await
    }
}
