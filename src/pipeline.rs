//! One end-to-end collection run.
//!
//! ```text
//!   sweep ──► enrich (optional) ──► per candidate:
//!       score ──► floors ──► store.get ──► decide ──► store.upsert
//!                                                     │
//!                               run summary ◄─────────┘ ──► sink
//! ```
//!
//! No single candidate can abort the run, and a summary is always returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::dedup::{DedupPolicy, DeduplicationEngine};
use crate::enrich::{enrich_watchers, DEFAULT_ENRICH_CONCURRENCY};
use crate::models::{Action, RepositoryRecord, RepositorySummary, RunStatus, RunSummary, ScoreBreakdown};
use crate::notify::{NotificationSink, RunFailure};
use crate::retry::{self, RetryPolicy};
use crate::scoring::{ScoringEngine, DEFAULT_MAX_TAGS};
use crate::search::{SearchOrchestrator, SearchPlan, SweepCaps};
use crate::source::CandidateSource;
use crate::store::RecordStore;

/// Candidates below either floor are dropped before deduplication.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floors {
    pub min_ai_relevance: u8,
    pub min_quality: u8,
}

impl Default for Floors {
    fn default() -> Self {
        Self { min_ai_relevance: 2, min_quality: 10 }
    }
}

impl Floors {
    pub fn admits(&self, score: &ScoreBreakdown) -> bool {
        score.ai_relevance >= self.min_ai_relevance && score.quality >= self.min_quality
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrichment {
    pub enabled: bool,
    pub concurrency: usize,
}

impl Default for Enrichment {
    fn default() -> Self {
        Self { enabled: true, concurrency: DEFAULT_ENRICH_CONCURRENCY }
    }
}

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub plan: SearchPlan,
    pub caps: SweepCaps,
    pub dedup: DedupPolicy,
    pub floors: Floors,
    pub enrichment: Enrichment,
    pub retry: RetryPolicy,
    pub max_tags: Option<usize>,
}

pub struct CollectionPipeline {
    source: Arc<dyn CandidateSource>,
    store: Arc<dyn RecordStore>,
    sink: Arc<dyn NotificationSink>,
    orchestrator: SearchOrchestrator,
    scoring: ScoringEngine,
    dedup: DeduplicationEngine,
    floors: Floors,
    enrichment: Enrichment,
    retry: RetryPolicy,
}

#[derive(Default)]
struct ScoreTotals {
    count: usize,
    quality: u64,
    trending: u64,
    ai_relevance: u64,
}

impl ScoreTotals {
    fn add(&mut self, score: &ScoreBreakdown) {
        self.count += 1;
        self.quality += u64::from(score.quality);
        self.trending += u64::from(score.trending);
        self.ai_relevance += u64::from(score.ai_relevance);
    }

    fn write_averages(&self, summary: &mut RunSummary) {
        if self.count == 0 {
            return;
        }
        let n = self.count as f64;
        summary.avg_quality = self.quality as f64 / n;
        summary.avg_trending = self.trending as f64 / n;
        summary.avg_ai_relevance = self.ai_relevance as f64 / n;
    }
}

impl CollectionPipeline {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        store: Arc<dyn RecordStore>,
        sink: Arc<dyn NotificationSink>,
        config: PipelineConfig,
    ) -> Self {
        let orchestrator = SearchOrchestrator::new(
            source.clone(),
            config.plan,
            config.caps,
            config.retry.clone(),
        );
        Self {
            source,
            store,
            sink,
            orchestrator,
            scoring: ScoringEngine::new(config.max_tags.unwrap_or(DEFAULT_MAX_TAGS)),
            dedup: DeduplicationEngine::new(config.dedup),
            floors: config.floors,
            enrichment: config.enrichment,
            retry: config.retry,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> RunSummary {
        self.run_at(Utc::now(), cancel).await
    }

    /// Run with an explicit reference time for scoring and deduplication.
    pub async fn run_at(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::empty(now);
        tracing::info!("Run {} started", summary.run_id);

        let outcome = self.orchestrator.sweep(now, cancel).await;
        let mut cancelled = outcome.cancelled;
        let mut candidates = outcome.candidates;
        summary.sweep = outcome.stats;
        summary.candidates = candidates.len();

        if self.enrichment.enabled && !cancelled && !candidates.is_empty() {
            tracing::info!("Enriching {} candidates", candidates.len());
            candidates = enrich_watchers(
                self.source.clone(),
                candidates,
                self.enrichment.concurrency,
                &self.retry,
                cancel,
            )
            .await;
        }

        let mut totals = ScoreTotals::default();
        for candidate in candidates {
            if cancel.is_cancelled() {
                tracing::info!("Run {} cancelled during candidate processing", summary.run_id);
                cancelled = true;
                break;
            }
            self.process(candidate, now, &mut summary, &mut totals).await;
        }
        totals.write_averages(&mut summary);

        let elapsed = started.elapsed();
        summary.elapsed_ms = elapsed.as_millis() as u64;
        summary.finished_at =
            now + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero());
        summary.status = if cancelled {
            RunStatus::Cancelled
        } else if summary.sweep.queries_issued > 0 && summary.sweep.queries_succeeded == 0 {
            RunStatus::Failed {
                error: summary
                    .sweep
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "every search query failed".to_string()),
            }
        } else {
            RunStatus::Completed
        };

        self.notify(&summary).await;
        summary
    }

    async fn process(
        &self,
        candidate: RepositorySummary,
        now: DateTime<Utc>,
        summary: &mut RunSummary,
        totals: &mut ScoreTotals,
    ) {
        let score = self.scoring.score(&candidate, now);
        totals.add(&score);

        if !self.floors.admits(&score) {
            tracing::debug!(
                "Filtered {} (relevance {}, quality {})",
                candidate.full_name,
                score.ai_relevance,
                score.quality
            );
            summary.filtered += 1;
            return;
        }

        let id = candidate.id;
        let label = format!("store get {}", candidate.full_name);
        let existing = match retry::call(&self.retry, &label, || self.store.get(id)).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!("Lookup failed for {}: {e}", candidate.full_name);
                summary.errors += 1;
                return;
            }
        };

        let decision = self.dedup.decide(existing.as_ref(), &candidate, &score, now);
        for warning in &decision.warnings {
            tracing::warn!("{}: {warning}", candidate.full_name);
        }

        if decision.action == Action::Skip {
            tracing::debug!("Skipping {}: {}", candidate.full_name, decision.reason);
            summary.record(Action::Skip);
            return;
        }

        let name = candidate.full_name.clone();
        let record = RepositoryRecord::observe(candidate, score, now, existing.as_ref());
        let label = format!("store upsert {name}");
        match retry::call(&self.retry, &label, || self.store.upsert(record.clone())).await {
            Ok(_) => {
                tracing::debug!("{:?} {name}: {}", decision.action, decision.reason);
                summary.record(decision.action);
            }
            Err(e) => {
                tracing::error!("Failed to store {name}: {e}");
                summary.errors += 1;
            }
        }
    }

    async fn notify(&self, summary: &RunSummary) {
        let result = match &summary.status {
            RunStatus::Failed { error } => {
                let failure = RunFailure { error: error.clone(), summary: summary.clone() };
                retry::call(&self.retry, "notify failure", || self.sink.on_failure(&failure)).await
            }
            _ => retry::call(&self.retry, "notify success", || self.sink.on_success(summary)).await,
        };
        if let Err(e) = result {
            tracing::warn!("Notification sink failed: {e}");
        }
    }
}
