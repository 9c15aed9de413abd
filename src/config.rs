use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::pipeline::PipelineConfig;
use crate::search::SearchPlan;
use crate::source::github::DEFAULT_API_BASE_URL;

/// GitHub's search API caps a page at 100 items.
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Token for the GitHub API. Required.
    #[serde(skip_serializing)]
    pub github_token: Option<String>,
    /// Base URL for the GitHub REST API
    pub api_base_url: String,
    /// JSON file holding the stored records
    pub store_path: PathBuf,
    /// Optional endpoint that receives the run summary
    pub webhook_url: Option<String>,
    /// Timeout for webhook delivery in seconds
    pub webhook_timeout_secs: u64,
    /// Plan file overriding the built-in search plan
    pub search_plan_path: Option<PathBuf>,
    pub pipeline: PipelineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            github_token: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            store_path: PathBuf::from("./data/records.json"),
            webhook_url: None,
            webhook_timeout_secs: 10,
            search_plan_path: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable lookup. Unset or unparseable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(token) = lookup("GITHUB_TOKEN") {
            config.github_token = Some(token);
        }
        if let Some(url) = lookup("CURATOR_API_BASE_URL") {
            config.api_base_url = url;
        }
        if let Some(path) = lookup("CURATOR_STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("CURATOR_WEBHOOK_URL") {
            config.webhook_url = Some(url);
        }
        if let Some(path) = lookup("CURATOR_SEARCH_PLAN") {
            config.search_plan_path = Some(PathBuf::from(path));
        }

        let p = &mut config.pipeline;

        // Dedup thresholds
        parse_into(&lookup, "CURATOR_DEDUP_WINDOW_DAYS", &mut p.dedup.window_days);
        parse_into(&lookup, "CURATOR_STAR_GROWTH_THRESHOLD", &mut p.dedup.star_growth_threshold);
        parse_into(&lookup, "CURATOR_FORK_GROWTH_THRESHOLD", &mut p.dedup.fork_growth_threshold);
        parse_into(&lookup, "CURATOR_MINOR_STAR_GROWTH", &mut p.dedup.minor_star_growth);
        parse_into(&lookup, "CURATOR_POPULARITY_FLOOR", &mut p.dedup.popularity_floor);
        parse_into(&lookup, "CURATOR_REENTRY_STAR_GROWTH", &mut p.dedup.reentry_star_growth);

        parse_into(&lookup, "CURATOR_MIN_AI_RELEVANCE", &mut p.floors.min_ai_relevance);
        parse_into(&lookup, "CURATOR_MIN_QUALITY", &mut p.floors.min_quality);

        // Sweep caps
        parse_into(&lookup, "CURATOR_TARGET_POOL_SIZE", &mut p.caps.target_pool_size);
        parse_into(&lookup, "CURATOR_MAX_QUERIES", &mut p.caps.max_queries);
        parse_into(&lookup, "CURATOR_MIN_VIABLE_POOL", &mut p.caps.min_viable_pool);
        parse_into(&lookup, "CURATOR_PER_PAGE", &mut p.caps.per_page);
        if let Some(ms) = lookup("CURATOR_REQUEST_DELAY_MS").and_then(|v| v.parse().ok()) {
            p.caps.request_delay = Duration::from_millis(ms);
        }

        // Retry policy
        if let Some(secs) = lookup("CURATOR_RATE_LIMIT_BACKOFF_SECS").and_then(|v| v.parse().ok()) {
            p.retry.rate_limit_backoff = Duration::from_secs(secs);
        }
        if let Some(secs) = lookup("CURATOR_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            p.retry.timeout = Duration::from_secs(secs);
        }
        parse_into(&lookup, "CURATOR_MAX_ATTEMPTS", &mut p.retry.max_attempts);

        if let Some(flag) = lookup("CURATOR_ENRICH").and_then(|v| parse_flag(&v)) {
            p.enrichment.enabled = flag;
        }
        parse_into(&lookup, "CURATOR_ENRICH_CONCURRENCY", &mut p.enrichment.concurrency);

        config
    }

    /// Environment, then the optional plan file, then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_env();
        config.load_search_plan()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_search_plan(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = &self.search_plan_path {
            self.pipeline.plan = SearchPlan::from_json_file(path)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.github_token.as_deref(), Some(t) if !t.trim().is_empty()) {
            return Err(ConfigError::Missing("GITHUB_TOKEN"));
        }
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(invalid("CURATOR_API_BASE_URL", "must be an http(s) URL"));
        }

        let p = &self.pipeline;
        if p.dedup.window_days == 0 {
            return Err(invalid("CURATOR_DEDUP_WINDOW_DAYS", "must be positive"));
        }
        if p.floors.min_ai_relevance > 10 {
            return Err(invalid("CURATOR_MIN_AI_RELEVANCE", "must be at most 10"));
        }
        if p.floors.min_quality > 100 {
            return Err(invalid("CURATOR_MIN_QUALITY", "must be at most 100"));
        }
        if p.caps.target_pool_size == 0 {
            return Err(invalid("CURATOR_TARGET_POOL_SIZE", "must be positive"));
        }
        if p.caps.max_queries == 0 {
            return Err(invalid("CURATOR_MAX_QUERIES", "must be positive"));
        }
        if p.caps.per_page == 0 || p.caps.per_page > MAX_PER_PAGE {
            return Err(invalid("CURATOR_PER_PAGE", "must be between 1 and 100"));
        }
        if !(p.caps.expectation_fraction > 0.0 && p.caps.expectation_fraction <= 1.0) {
            return Err(invalid("expectation_fraction", "must be in (0, 1]"));
        }
        if p.retry.max_attempts == 0 {
            return Err(invalid("CURATOR_MAX_ATTEMPTS", "must be positive"));
        }
        if p.retry.timeout.is_zero() {
            return Err(invalid("CURATOR_REQUEST_TIMEOUT_SECS", "must be positive"));
        }
        if p.enrichment.concurrency == 0 {
            return Err(invalid("CURATOR_ENRICH_CONCURRENCY", "must be positive"));
        }
        p.plan.validate()
    }

    pub fn webhook_timeout(&self) -> Duration {
        Duration::from_secs(self.webhook_timeout_secs)
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid { name, reason: reason.to_string() }
}

fn parse_into<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, target: &mut T) {
    if let Some(v) = lookup(name).and_then(|raw| raw.trim().parse().ok()) {
        *target = v;
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
