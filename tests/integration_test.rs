//! Integration tests for the collection pipeline.
//!
//! These tests run whole collection runs against an in-process candidate
//! source and the in-memory store, so no network access is needed.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use repo_curator::dedup::{DedupPolicy, DeduplicationEngine};
use repo_curator::error::{NotifyError, SourceError, StoreError};
use repo_curator::models::{
    Action, Category, RepoId, RepositoryRecord, RepositorySummary, RunStatus, RunSummary,
};
use repo_curator::notify::{NotificationSink, RunFailure};
use repo_curator::pipeline::{CollectionPipeline, Enrichment, Floors, PipelineConfig};
use repo_curator::retry::RetryPolicy;
use repo_curator::scoring::ScoringEngine;
use repo_curator::search::plan::{KeywordGroup, SearchPlan, SearchQuery, SortField, SortStrategy, TimeWindow};
use repo_curator::search::SweepCaps;
use repo_curator::source::{CandidateSource, RepositoryDetail, SearchPage};
use repo_curator::store::{MemoryStore, RecordStore, UpsertOutcome};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap()
}

fn days_ago(days: i64) -> String {
    (now() - chrono::Duration::days(days)).to_rfc3339()
}

/// Helper: a repository summary with the given identity and text.
fn repo(id: u64, name: &str, description: &str, stars: u64) -> RepositorySummary {
    RepositorySummary {
        id: RepoId(id),
        full_name: format!("acme/{name}"),
        name: name.to_string(),
        owner: "acme".to_string(),
        description: Some(description.to_string()),
        url: format!("https://github.com/acme/{name}"),
        stars,
        forks: 0,
        watchers: stars,
        language: None,
        topics: BTreeSet::new(),
        created_at: days_ago(200),
        updated_at: days_ago(2),
        pushed_at: days_ago(2),
    }
}

fn agent_kit(id: u64) -> RepositorySummary {
    repo(id, "llm-agent-kit", "An LLM agent toolkit for autonomous workflows", 100)
}

/// Candidate source replaying scripted pages, then empty pages.
#[derive(Default)]
struct FakeSource {
    pages: Mutex<VecDeque<Result<SearchPage, SourceError>>>,
    searches: Mutex<usize>,
    subscribers: Option<u64>,
}

impl FakeSource {
    fn with_pages(pages: Vec<Result<SearchPage, SourceError>>) -> Arc<Self> {
        Arc::new(Self { pages: Mutex::new(pages.into()), ..Self::default() })
    }

    fn searches(&self) -> usize {
        *self.searches.lock()
    }
}

#[async_trait]
impl CandidateSource for FakeSource {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchPage, SourceError> {
        *self.searches.lock() += 1;
        self.pages.lock().pop_front().unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn detail(&self, id: RepoId) -> Result<RepositoryDetail, SourceError> {
        match self.subscribers {
            Some(count) => Ok(RepositoryDetail {
                summary: repo(id.0, "detail", "", 0),
                subscribers_count: count,
                open_issues_count: 3,
            }),
            None => Err(SourceError::Http { status: 404, body: "Not Found".into() }),
        }
    }
}

fn page(items: Vec<RepositorySummary>) -> Result<SearchPage, SourceError> {
    let total_count = items.len() as u64;
    Ok(SearchPage { items, total_count })
}

#[derive(Default)]
struct RecordingSink {
    successes: Mutex<Vec<RunSummary>>,
    failures: Mutex<Vec<RunFailure>>,
    reject: bool,
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn on_success(&self, summary: &RunSummary) -> Result<(), NotifyError> {
        self.successes.lock().push(summary.clone());
        if self.reject {
            return Err(NotifyError::Rejected(503));
        }
        Ok(())
    }

    async fn on_failure(&self, failure: &RunFailure) -> Result<(), NotifyError> {
        self.failures.lock().push(failure.clone());
        Ok(())
    }
}

/// Store whose writes fail for one identity.
struct FlakyStore {
    inner: MemoryStore,
    broken: RepoId,
}

#[async_trait]
impl RecordStore for FlakyStore {
    async fn get(&self, id: RepoId) -> Result<Option<RepositoryRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn upsert(&self, record: RepositoryRecord) -> Result<UpsertOutcome, StoreError> {
        if record.id == self.broken {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        self.inner.upsert(record).await
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.inner.len().await
    }
}

fn test_config() -> PipelineConfig {
    PipelineConfig {
        plan: SearchPlan {
            groups: vec![KeywordGroup::new("agents", &["agent", "LLM"])],
            windows: vec![TimeWindow::created("month", 0, 30, 10)],
            fallback_windows: Vec::new(),
            sorts: vec![
                SortStrategy::desc(SortField::Stars),
                SortStrategy::desc(SortField::Updated),
            ],
            broad_keywords: Vec::new(),
            ..SearchPlan::default()
        },
        caps: SweepCaps {
            target_pool_size: 50,
            max_queries: 10,
            min_viable_pool: 0,
            per_page: 2,
            expectation_fraction: 0.5,
            request_delay: Duration::from_millis(1),
        },
        dedup: DedupPolicy::default(),
        floors: Floors::default(),
        enrichment: Enrichment { enabled: false, concurrency: 2 },
        retry: RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(1),
            rate_limit_backoff: Duration::from_millis(5),
            rate_limit_retries: 1,
            timeout: Duration::from_secs(5),
        },
        max_tags: None,
    }
}

fn pipeline(
    source: Arc<FakeSource>,
    store: Arc<dyn RecordStore>,
    sink: Arc<RecordingSink>,
    config: PipelineConfig,
) -> CollectionPipeline {
    CollectionPipeline::new(source, store, sink, config)
}

fn seeded_record(summary: RepositorySummary, observed_days_ago: i64) -> RepositoryRecord {
    let seen_at = now() - chrono::Duration::days(observed_days_ago);
    let score = ScoringEngine::default().score(&summary, seen_at);
    RepositoryRecord::observe(summary, score, seen_at, None)
}

#[tokio::test]
async fn test_scenario_a_new_small_repo_is_inserted() {
    let mut fresh = repo(
        1,
        "tiny-tool",
        "A small command line utility for renaming files in bulk, with previews and undo!",
        50,
    );
    fresh.watchers = 0;
    fresh.created_at = days_ago(2);
    assert_eq!(fresh.description_text().chars().count(), 80);

    let source = FakeSource::with_pages(vec![page(vec![fresh])]);
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingSink::default());
    let config = PipelineConfig {
        floors: Floors { min_ai_relevance: 0, min_quality: 0 },
        ..test_config()
    };

    let summary = pipeline(source, store.clone(), sink.clone(), config)
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.inserted, 1);
    let stored = store.get(RepoId(1)).await.unwrap().unwrap();
    assert!(
        (15..=35).contains(&stored.score.quality),
        "quality was {}",
        stored.score.quality
    );
    assert_eq!(stored.score.category, Category::General);
    assert_eq!(sink.successes.lock().len(), 1);
}

#[tokio::test]
async fn test_scenario_b_unchanged_recent_record_is_skipped() {
    let existing = seeded_record(agent_kit(2), 3);
    let decision = DeduplicationEngine::default().decide(
        Some(&existing),
        &agent_kit(2),
        &existing.score,
        now(),
    );
    assert_eq!(decision.action, Action::Skip);
    assert!(decision.reason.to_string().contains("no significant change"));

    let store = Arc::new(MemoryStore::with_records([existing.clone()]));
    let source = FakeSource::with_pages(vec![page(vec![agent_kit(2)])]);
    let summary = pipeline(source, store.clone(), Arc::default(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.stored(), 0);
    assert_eq!(store.get(RepoId(2)).await.unwrap(), Some(existing));
}

#[tokio::test]
async fn test_scenario_c_stale_record_with_new_push_is_reinserted() {
    let mut old = agent_kit(3);
    old.pushed_at = days_ago(60);
    let store = Arc::new(MemoryStore::with_records([seeded_record(old, 40)]));

    let mut pushed = agent_kit(3);
    pushed.pushed_at = days_ago(1);
    let source = FakeSource::with_pages(vec![page(vec![pushed])]);
    let summary = pipeline(source, store.clone(), Arc::default(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.reinserted, 1);
    let stored = store.get(RepoId(3)).await.unwrap().unwrap();
    assert_eq!(stored.last_observed(), Some(now()));
    assert_eq!(stored.summary.pushed_at, days_ago(1));
}

#[tokio::test]
async fn test_scenario_d_overlapping_queries_store_one_record() {
    let source = FakeSource::with_pages(vec![
        page(vec![agent_kit(4), agent_kit(5)]),
        page(vec![agent_kit(4), agent_kit(6)]),
    ]);
    let store = Arc::new(MemoryStore::new());
    let summary = pipeline(source, store.clone(), Arc::default(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.candidates, 3);
    assert_eq!(summary.sweep.duplicates_discarded, 1);
    assert_eq!(summary.inserted, 3);
    let ids: Vec<RepoId> = store.records().iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![RepoId(4), RepoId(5), RepoId(6)]);
}

#[tokio::test]
async fn test_sweep_stops_at_target_pool_size() {
    let source = FakeSource::with_pages(vec![page(vec![agent_kit(7), agent_kit(8), agent_kit(9)])]);
    let mut config = test_config();
    config.caps.target_pool_size = 2;

    let summary = pipeline(source.clone(), Arc::new(MemoryStore::new()), Arc::default(), config)
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.candidates, 2);
    assert_eq!(summary.sweep.queries_issued, 1);
    assert_eq!(source.searches(), 1);
}

#[tokio::test]
async fn test_run_where_every_query_fails_still_reports() {
    let failing = || -> Result<SearchPage, SourceError> {
        Err(SourceError::Http { status: 500, body: "Server Error".into() })
    };
    let source = FakeSource::with_pages(vec![failing(), failing()]);
    let sink = Arc::new(RecordingSink::default());

    let summary = pipeline(source, Arc::new(MemoryStore::new()), sink.clone(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert!(matches!(summary.status, RunStatus::Failed { ref error } if error.contains("500")));
    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.stored(), 0);
    let failures = sink.failures.lock();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].summary.run_id, summary.run_id);
    assert!(sink.successes.lock().is_empty());
}

#[tokio::test]
async fn test_empty_sweep_completes_with_empty_summary() {
    let source = FakeSource::with_pages(Vec::new());
    let sink = Arc::new(RecordingSink::default());
    let summary = pipeline(source, Arc::new(MemoryStore::new()), sink.clone(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.candidates, 0);
    assert_eq!(summary.avg_quality, 0.0);
    assert_eq!(sink.successes.lock().len(), 1);
}

#[tokio::test]
async fn test_irrelevant_candidates_are_filtered() {
    let source = FakeSource::with_pages(vec![page(vec![
        repo(10, "recipe-box", "Family recipes and a shopping list", 500),
        agent_kit(11),
    ])]);
    let store = Arc::new(MemoryStore::new());
    let summary = pipeline(source, store.clone(), Arc::default(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.filtered, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(store.get(RepoId(10)).await.unwrap(), None);
    assert!(summary.avg_quality > 0.0);
}

#[tokio::test]
async fn test_store_failure_is_counted_and_run_continues() {
    let store = Arc::new(FlakyStore { inner: MemoryStore::new(), broken: RepoId(12) });
    let source = FakeSource::with_pages(vec![page(vec![agent_kit(12), agent_kit(13)])]);
    let summary = pipeline(source, store.clone(), Arc::default(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.errors, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.status, RunStatus::Completed);
    assert!(store.get(RepoId(13)).await.unwrap().is_some());
}

#[tokio::test]
async fn test_failing_sink_does_not_fail_the_run() {
    let sink = Arc::new(RecordingSink { reject: true, ..RecordingSink::default() });
    let source = FakeSource::with_pages(vec![page(vec![agent_kit(14)])]);
    let summary = pipeline(source, Arc::new(MemoryStore::new()), sink.clone(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.inserted, 1);
    // Rejection is fatal for the retry wrapper, so the sink is called once.
    assert_eq!(sink.successes.lock().len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_returns_cancelled_summary() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let source = FakeSource::with_pages(vec![page(vec![agent_kit(15)])]);
    let summary = pipeline(source.clone(), Arc::new(MemoryStore::new()), Arc::default(), test_config())
        .run_at(now(), &cancel)
        .await;

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert_eq!(source.searches(), 0);
}

#[tokio::test]
async fn test_enrichment_replaces_watcher_count() {
    let source = Arc::new(FakeSource {
        pages: Mutex::new(vec![page(vec![agent_kit(16)])].into()),
        subscribers: Some(42),
        ..FakeSource::default()
    });
    let store = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.enrichment.enabled = true;

    pipeline(source, store.clone(), Arc::default(), config)
        .run_at(now(), &CancellationToken::new())
        .await;

    let stored = store.get(RepoId(16)).await.unwrap().unwrap();
    assert_eq!(stored.summary.watchers, 42);
}

#[tokio::test]
async fn test_second_run_skips_what_the_first_stored() {
    let store = Arc::new(MemoryStore::new());
    let first = FakeSource::with_pages(vec![page(vec![agent_kit(17)])]);
    let summary = pipeline(first, store.clone(), Arc::default(), test_config())
        .run_at(now(), &CancellationToken::new())
        .await;
    assert_eq!(summary.inserted, 1);

    let second = FakeSource::with_pages(vec![page(vec![agent_kit(17)])]);
    let summary = pipeline(second, store.clone(), Arc::default(), test_config())
        .run_at(now() + chrono::Duration::hours(6), &CancellationToken::new())
        .await;
    assert_eq!(summary.skipped, 1);
    assert_eq!(store.len().await.unwrap(), 1);
}

/// Source whose first detail lookup cancels the run and reports a rate limit.
struct CancellingSource {
    pages: Mutex<VecDeque<Result<SearchPage, SourceError>>>,
    cancel: CancellationToken,
    details: Mutex<usize>,
}

#[async_trait]
impl CandidateSource for CancellingSource {
    async fn search(&self, _query: &SearchQuery) -> Result<SearchPage, SourceError> {
        self.pages.lock().pop_front().unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn detail(&self, _id: RepoId) -> Result<RepositoryDetail, SourceError> {
        *self.details.lock() += 1;
        self.cancel.cancel();
        Err(SourceError::RateLimited { retry_after: None })
    }
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_enrichment_stops_lookups() {
    let cancel = CancellationToken::new();
    let candidates: Vec<_> = (100..120).map(agent_kit).collect();
    let source = Arc::new(CancellingSource {
        pages: Mutex::new(vec![page(candidates)].into()),
        cancel: cancel.clone(),
        details: Mutex::new(0),
    });
    let store = Arc::new(MemoryStore::new());
    let mut config = test_config();
    config.caps.per_page = 20;
    config.enrichment = Enrichment { enabled: true, concurrency: 5 };
    config.retry.rate_limit_backoff = Duration::from_secs(60);

    let started = tokio::time::Instant::now();
    let summary = CollectionPipeline::new(source.clone(), store.clone(), Arc::new(RecordingSink::default()), config)
        .run_at(now(), &cancel)
        .await;

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert_eq!(summary.candidates, 20);
    assert!(*source.details.lock() <= 5);
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(store.len().await.unwrap(), 0);
}
