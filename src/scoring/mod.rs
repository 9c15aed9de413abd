//! Pure scoring of repository summaries.
//!
//! Every function here is deterministic given the summary and the reference
//! time `now`; nothing performs I/O. Malformed timestamps contribute zero to
//! the terms that depend on them.

pub mod classify;
pub mod quality;
pub mod relevance;
pub mod trending;
pub mod vocabulary;

use chrono::{DateTime, Utc};

use crate::models::{RepositorySummary, ScoreBreakdown};

/// Default bound on the tag list.
pub const DEFAULT_MAX_TAGS: usize = 10;

#[derive(Debug, Clone)]
pub struct ScoringEngine {
    max_tags: usize,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TAGS)
    }
}

impl ScoringEngine {
    pub fn new(max_tags: usize) -> Self {
        Self { max_tags }
    }

    pub fn score(&self, summary: &RepositorySummary, now: DateTime<Utc>) -> ScoreBreakdown {
        let category = classify::categorize(summary);
        let tags = classify::extract_tags(summary, self.max_tags);
        let summary_line = classify::summary_line(summary, category, &tags, now);

        ScoreBreakdown {
            quality: quality::quality_score(summary, now),
            trending: trending::trending_score(summary, now),
            ai_relevance: relevance::ai_relevance(summary),
            category,
            tags,
            summary: summary_line,
        }
    }
}

/// One step of a piecewise-linear table. Tables are ordered from the highest
/// `min` down; the top tier is flat, lower tiers interpolate from their own
/// `base` towards the tier above by `span`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Tier {
    pub min: u64,
    pub base: f64,
    pub span: f64,
}

/// Piecewise-linear score of `value`. Exactly on a boundary the lower
/// tier's floor applies. Below the lowest tier the score scales linearly
/// from zero to that tier's base.
pub(crate) fn tiered(value: u64, tiers: &[Tier]) -> f64 {
    for (i, tier) in tiers.iter().enumerate() {
        if value < tier.min {
            continue;
        }
        if i == 0 {
            return tier.base;
        }
        let upper = tiers[i - 1].min;
        let fraction = (value - tier.min) as f64 / (upper - tier.min) as f64;
        return tier.base + fraction * tier.span;
    }
    match tiers.last() {
        Some(lowest) if lowest.min > 0 => value as f64 / lowest.min as f64 * lowest.base,
        _ => 0.0,
    }
}

/// Points for the first band whose day limit covers `days`.
pub(crate) fn banded(days: i64, bands: &[(i64, f64)]) -> f64 {
    bands
        .iter()
        .find(|(limit, _)| days <= *limit)
        .map(|(_, points)| *points)
        .unwrap_or(0.0)
}

/// Whole days from `then` to `now`, clamped at zero for future timestamps.
pub(crate) fn days_since(then: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Option<i64> {
    then.map(|t| (now - t).num_days().max(0))
}

/// Truncate a non-negative accumulated score into `0..=cap`.
pub(crate) fn clamp_score(score: f64, cap: u8) -> u8 {
    if !score.is_finite() || score <= 0.0 {
        return 0;
    }
    score.floor().min(cap as f64) as u8
}
