use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use crate::config::Config;
use crate::notify::{NotificationSink, TracingSink, WebhookSink};
use crate::pipeline::CollectionPipeline;
use crate::source::{CandidateSource, GitHubSource};
use crate::store::{JsonFileStore, RecordStore};

/// The collaborators one run is wired from.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub http_client: reqwest::Client,
    pub source: Arc<dyn CandidateSource>,
    pub store: Arc<dyn RecordStore>,
    pub sink: Arc<dyn NotificationSink>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.pipeline.retry.timeout)
            .build()
            .context("failed to build HTTP client")?;

        let token = config.github_token.clone().unwrap_or_default();
        let source = GitHubSource::new(http_client.clone(), &config.api_base_url, &token);

        let store = JsonFileStore::open(&config.store_path)
            .with_context(|| format!("failed to open store at {}", config.store_path.display()))?;

        let sink: Arc<dyn NotificationSink> = match &config.webhook_url {
            Some(url) => {
                tracing::info!("Notifications go to webhook {url}");
                Arc::new(WebhookSink::new(http_client.clone(), url, config.webhook_timeout()))
            }
            None => Arc::new(TracingSink),
        };

        Ok(Self {
            config,
            http_client,
            source: Arc::new(source),
            store: Arc::new(store),
            sink,
        })
    }

    pub fn pipeline(&self) -> CollectionPipeline {
        CollectionPipeline::new(
            self.source.clone(),
            self.store.clone(),
            self.sink.clone(),
            self.config.pipeline.clone(),
        )
    }
}
