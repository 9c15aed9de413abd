//! Sequential sweep over keyword groups, time windows and sort strategies.
//!
//! ```text
//!   groups x windows x sorts ──► query ──► pool (identity-keyed)
//!                                  │
//!                      low volume? └──► fallback ladder (narrow → widest)
//!
//!   pool < min viable after the cross-product ──► one broad pass
//! ```
//!
//! Queries go out one at a time with a minimum delay between them. The pool
//! and its identity set are owned by the sweep loop alone.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::plan::{KeywordGroup, SearchPlan, SearchQuery, SortStrategy, TimeWindow};
use crate::error::SourceError;
use crate::models::{RepoId, RepositorySummary, SweepStats};
use crate::retry::{self, RetryPolicy};
use crate::source::CandidateSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepCaps {
    /// Stop once this many unique candidates are pooled.
    pub target_pool_size: usize,
    /// Hard bound on queries issued, fallbacks included.
    pub max_queries: usize,
    /// Below this after the full cross-product, run the broad pass.
    pub min_viable_pool: usize,
    pub per_page: u32,
    /// A query returning fewer than `per_page * expectation_fraction` items escalates.
    pub expectation_fraction: f64,
    pub request_delay: Duration,
}

impl Default for SweepCaps {
    fn default() -> Self {
        Self {
            target_pool_size: 1000,
            max_queries: 200,
            min_viable_pool: 100,
            per_page: 100,
            expectation_fraction: 0.5,
            request_delay: Duration::from_secs(1),
        }
    }
}

impl SweepCaps {
    fn expected_volume(&self) -> usize {
        (f64::from(self.per_page) * self.expectation_fraction).ceil() as usize
    }
}

#[derive(Debug, Clone, Default)]
pub struct SweepOutcome {
    /// Unique candidates in admission order.
    pub candidates: Vec<RepositorySummary>,
    pub stats: SweepStats,
    pub cancelled: bool,
}

#[derive(Default)]
struct SweepState {
    seen: HashSet<RepoId>,
    pool: Vec<RepositorySummary>,
    stats: SweepStats,
    last_query: Option<Instant>,
    cancelled: bool,
}

impl SweepState {
    /// Fold a page into the pool, dropping repeats. Nothing is admitted past `target`.
    fn admit(&mut self, items: Vec<RepositorySummary>, target: usize) -> usize {
        let mut admitted = 0;
        for item in items {
            if self.pool.len() >= target {
                break;
            }
            if self.seen.insert(item.id) {
                self.pool.push(item);
                admitted += 1;
            } else {
                self.stats.duplicates_discarded += 1;
            }
        }
        admitted
    }
}

pub struct SearchOrchestrator {
    source: Arc<dyn CandidateSource>,
    plan: SearchPlan,
    caps: SweepCaps,
    retry: RetryPolicy,
}

impl SearchOrchestrator {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        plan: SearchPlan,
        caps: SweepCaps,
        retry: RetryPolicy,
    ) -> Self {
        Self { source, plan, caps, retry }
    }

    pub async fn sweep(&self, now: DateTime<Utc>, cancel: &CancellationToken) -> SweepOutcome {
        let mut state = SweepState::default();
        let mut escalated: HashSet<(usize, usize)> = HashSet::new();
        let expected = self.caps.expected_volume();

        tracing::info!(
            "Starting sweep: {} groups x {} windows x {} sorts, target {} candidates",
            self.plan.groups.len(),
            self.plan.windows.len(),
            self.plan.sorts.len(),
            self.caps.target_pool_size
        );

        'combinations: for (g, group) in self.plan.groups.iter().enumerate() {
            for window in &self.plan.windows {
                for (s, &sort) in self.plan.sorts.iter().enumerate() {
                    if self.should_stop(&mut state, cancel) {
                        break 'combinations;
                    }
                    let Some(returned) = self.run_query(&mut state, group, window, sort, now).await
                    else {
                        continue;
                    };
                    // The ladder runs at most once per group and sort.
                    if returned < expected && escalated.insert((g, s)) {
                        self.escalate(&mut state, group, sort, expected, now, cancel).await;
                    }
                }
            }
            tracing::info!(
                "Group {} done: pool {} after {} queries",
                group.name,
                state.pool.len(),
                state.stats.queries_issued
            );
        }

        if !state.cancelled
            && state.pool.len() < self.caps.min_viable_pool
            && !self.plan.broad_keywords.is_empty()
        {
            self.supplementary_pass(&mut state, now, cancel).await;
        }

        tracing::info!(
            "Sweep finished: {} candidates, {} queries ({} succeeded, {} abandoned, {} failed), {} duplicates discarded",
            state.pool.len(),
            state.stats.queries_issued,
            state.stats.queries_succeeded,
            state.stats.abandoned,
            state.stats.failed,
            state.stats.duplicates_discarded
        );

        SweepOutcome {
            candidates: state.pool,
            stats: state.stats,
            cancelled: state.cancelled,
        }
    }

    fn should_stop(&self, state: &mut SweepState, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            if !state.cancelled {
                tracing::info!("Sweep cancelled with {} candidates pooled", state.pool.len());
            }
            state.cancelled = true;
            return true;
        }
        state.pool.len() >= self.caps.target_pool_size
            || state.stats.queries_issued >= self.caps.max_queries
    }

    /// Widen the window for a low-yield group until one tier returns enough.
    async fn escalate(
        &self,
        state: &mut SweepState,
        group: &KeywordGroup,
        sort: SortStrategy,
        expected: usize,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) {
        if self.plan.fallback_windows.is_empty() {
            return;
        }
        state.stats.escalations += 1;
        tracing::debug!("Low yield for {}, escalating through fallback windows", group.name);

        for window in &self.plan.fallback_windows {
            if self.should_stop(state, cancel) {
                return;
            }
            if let Some(returned) = self.run_query(state, group, window, sort, now).await {
                if returned >= expected {
                    return;
                }
            }
        }
    }

    async fn supplementary_pass(
        &self,
        state: &mut SweepState,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) {
        tracing::info!(
            "Pool of {} is below {}, running broad pass",
            state.pool.len(),
            self.caps.min_viable_pool
        );
        let group = self.plan.broad_group();
        for &sort in &self.plan.sorts {
            if self.should_stop(state, cancel) {
                return;
            }
            state.stats.supplementary_pass = true;
            self.run_query(state, &group, &self.plan.broad_window, sort, now).await;
        }
    }

    /// Issue one query through the retry wrapper and fold its results into the
    /// pool. Returns the number of items the source returned, or `None` when
    /// the query failed or was abandoned.
    async fn run_query(
        &self,
        state: &mut SweepState,
        group: &KeywordGroup,
        window: &TimeWindow,
        sort: SortStrategy,
        now: DateTime<Utc>,
    ) -> Option<usize> {
        let query = SearchQuery::build(group, window, sort, self.caps.per_page, now);

        if let Some(last) = state.last_query {
            tokio::time::sleep_until(last + self.caps.request_delay).await;
        }
        state.stats.queries_issued += 1;

        let rate_limit_hits = AtomicUsize::new(0);
        let label = format!("search {}/{}/{}", group.name, window.name, sort.sort.as_str());
        let (source, query_ref, hits) = (&self.source, &query, &rate_limit_hits);
        let result = retry::call(&self.retry, &label, || async move {
            let result = source.search(query_ref).await;
            if matches!(result, Err(SourceError::RateLimited { .. })) {
                hits.fetch_add(1, Ordering::Relaxed);
            }
            result
        })
        .await;

        state.last_query = Some(Instant::now());
        state.stats.rate_limited += rate_limit_hits.load(Ordering::Relaxed);

        match result {
            Ok(page) => {
                state.stats.queries_succeeded += 1;
                let returned = page.items.len();
                let admitted = state.admit(page.items, self.caps.target_pool_size);
                tracing::debug!(
                    "{label}: {returned} returned of {} total, {admitted} new",
                    page.total_count
                );
                Some(returned)
            }
            Err(err @ SourceError::RateLimited { .. }) => {
                tracing::warn!("{label}: still rate limited, abandoning combination");
                state.stats.abandoned += 1;
                state.stats.last_error = Some(err.to_string());
                None
            }
            Err(err) => {
                tracing::warn!("{label}: query failed: {err}");
                state.stats.failed += 1;
                state.stats.last_error = Some(err.to_string());
                None
            }
        }
    }
}
