//! Bounded-parallel watcher enrichment.
//!
//! The search endpoint reports `watchers` equal to `stars`; the real watcher
//! count (`subscribers_count`) only comes from the per-repository lookup.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::models::RepositorySummary;
use crate::retry::{self, RetryPolicy};
use crate::source::CandidateSource;

pub const DEFAULT_ENRICH_CONCURRENCY: usize = 5;

/// Replace each candidate's watcher count with the detail lookup's
/// subscriber count. A failed lookup keeps the original value. The output
/// is in input order.
///
/// Submission stops once `cancel` fires or a lookup ends rate limited.
/// Cancellation also aborts lookups still in flight. Candidates that were
/// never enriched keep their search values.
pub async fn enrich_watchers(
    source: Arc<dyn CandidateSource>,
    candidates: Vec<RepositorySummary>,
    concurrency: usize,
    retry: &RetryPolicy,
    cancel: &CancellationToken,
) -> Vec<RepositorySummary> {
    if candidates.is_empty() {
        return candidates;
    }

    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let rate_limited = Arc::new(AtomicBool::new(false));
    let mut tasks = JoinSet::new();
    let mut enriched: Vec<Option<RepositorySummary>> = vec![None; candidates.len()];
    let originals = candidates.clone();

    for (index, candidate) in candidates.into_iter().enumerate() {
        if cancel.is_cancelled() || rate_limited.load(Ordering::SeqCst) {
            break;
        }
        // Acquire before spawning so submission waits at the bound.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = semaphore.clone().acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        if rate_limited.load(Ordering::SeqCst) {
            break;
        }
        let source = source.clone();
        let retry = retry.clone();
        let rate_limited = rate_limited.clone();

        tasks.spawn(async move {
            let _permit = permit;
            let id = candidate.id;
            let label = format!("detail {}", candidate.full_name);
            let result = retry::call(&retry, &label, || source.detail(id)).await;
            let mut candidate = candidate;
            match result {
                Ok(detail) => candidate.watchers = detail.subscribers_count,
                Err(e) => {
                    if matches!(e, SourceError::RateLimited { .. }) {
                        rate_limited.store(true, Ordering::SeqCst);
                    }
                    tracing::warn!("Keeping search watcher count for {}: {e}", candidate.full_name)
                }
            }
            (index, candidate)
        });
    }

    if rate_limited.load(Ordering::SeqCst) {
        tracing::warn!("Detail lookups rate limited, remaining candidates keep search counts");
    }

    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!("Enrichment cancelled, aborting {} lookups", tasks.len());
                tasks.abort_all();
                while let Some(joined) = tasks.join_next().await {
                    if let Ok((index, candidate)) = joined {
                        enriched[index] = Some(candidate);
                    }
                }
                break;
            }
            joined = tasks.join_next() => joined,
        };
        match joined {
            Some(Ok((index, candidate))) => enriched[index] = Some(candidate),
            Some(Err(e)) => tracing::warn!("Enrichment task failed: {e}"),
            None => break,
        }
    }

    enriched
        .into_iter()
        .zip(originals)
        .map(|(enriched, original)| enriched.unwrap_or(original))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::models::fixtures::summary;
    use crate::models::RepoId;
    use crate::search::plan::SearchQuery;
    use crate::source::{RepositoryDetail, SearchPage};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Detail source that tracks its peak number of in-flight calls.
    #[derive(Default)]
    struct CountingSource {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl CandidateSource for CountingSource {
        async fn search(&self, _query: &SearchQuery) -> Result<SearchPage, SourceError> {
            Ok(SearchPage::default())
        }

        async fn detail(&self, id: RepoId) -> Result<RepositoryDetail, SourceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if id.0 % 2 == 0 {
                return Err(SourceError::Http { status: 404, body: "Not Found".into() });
            }
            let summary = summary(id.0, "r");
            Ok(RepositoryDetail { summary, subscribers_count: id.0 * 100, open_issues_count: 0 })
        }
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 1,
            timeout: Duration::from_secs(5),
            ..RetryPolicy::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_calls_never_exceed_bound() {
        let source = Arc::new(CountingSource::default());
        let candidates: Vec<_> = (1..=12).map(|id| summary(id, "r")).collect();
        let out = enrich_watchers(source.clone(), candidates, 3, &policy(), &CancellationToken::new()).await;
        assert_eq!(out.len(), 12);
        assert!(source.peak.load(Ordering::SeqCst) <= 3);
        assert!(source.peak.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_lookup_keeps_original_and_order_is_preserved() {
        let source = Arc::new(CountingSource::default());
        let mut candidates: Vec<_> = (1..=4).map(|id| summary(id, "r")).collect();
        for c in &mut candidates {
            c.watchers = 7;
        }
        let out = enrich_watchers(source, candidates, 2, &policy(), &CancellationToken::new()).await;
        let ids: Vec<u64> = out.iter().map(|c| c.id.0).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        let watchers: Vec<u64> = out.iter().map(|c| c.watchers).collect();
        assert_eq!(watchers, vec![100, 7, 300, 7]);
    }

    /// Detail source that always answers rate limited.
    #[derive(Default)]
    struct LimitedSource {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CandidateSource for LimitedSource {
        async fn search(&self, _query: &SearchQuery) -> Result<SearchPage, SourceError> {
            Ok(SearchPage::default())
        }

        async fn detail(&self, _id: RepoId) -> Result<RepositoryDetail, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(SourceError::RateLimited { retry_after: None })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_lookup_stops_submission() {
        let source = Arc::new(LimitedSource::default());
        let mut candidates: Vec<_> = (1..=6).map(|id| summary(id, "r")).collect();
        for c in &mut candidates {
            c.watchers = 9;
        }
        let retry = RetryPolicy { rate_limit_retries: 0, ..policy() };
        let out = enrich_watchers(source.clone(), candidates, 1, &retry, &CancellationToken::new()).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.len(), 6);
        assert!(out.iter().all(|c| c.watchers == 9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_start_issues_no_lookups() {
        let source = Arc::new(CountingSource::default());
        let candidates: Vec<_> = (1..=4).map(|id| summary(id, "r")).collect();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = enrich_watchers(source.clone(), candidates.clone(), 2, &policy(), &cancel).await;

        assert_eq!(source.peak.load(Ordering::SeqCst), 0);
        assert_eq!(out, candidates);
    }
}
