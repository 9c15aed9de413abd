use chrono::{DateTime, Utc};

use super::vocabulary::{WordText, DOCUMENTATION_TERMS};
use super::{banded, clamp_score, days_since, tiered, Tier};
use crate::models::RepositorySummary;

// Stars: 40 points
const STAR_TIERS: &[Tier] = &[
    Tier { min: 10_000, base: 40.0, span: 0.0 },
    Tier { min: 1_000, base: 30.0, span: 10.0 },
    Tier { min: 100, base: 20.0, span: 10.0 },
    Tier { min: 10, base: 10.0, span: 10.0 },
];

// Push recency: 15 points
const PUSH_BANDS: &[(i64, f64)] = &[(7, 15.0), (30, 12.0), (90, 9.0), (180, 6.0), (365, 3.0)];

// Community engagement (forks x2 + watchers): 25 points
const ENGAGEMENT_TIERS: &[Tier] = &[
    Tier { min: 1_000, base: 25.0, span: 0.0 },
    Tier { min: 100, base: 18.0, span: 7.0 },
    Tier { min: 10, base: 10.0, span: 8.0 },
];

/// Long-term quality, 0-100.
///
/// Stars dominate (40), then community engagement (25), push recency (15),
/// a maturity window preferring repositories between a month and a year old
/// (15), and one point per documentation indicator (5).
pub fn quality_score(repo: &RepositorySummary, now: DateTime<Utc>) -> u8 {
    let mut score = tiered(repo.stars, STAR_TIERS);

    if let Some(days) = days_since(repo.pushed(), now) {
        score += banded(days, PUSH_BANDS);
    }

    let engagement = repo.forks.saturating_mul(2).saturating_add(repo.watchers);
    score += tiered(engagement, ENGAGEMENT_TIERS);

    if let Some(age) = days_since(repo.created(), now) {
        score += maturity_points(age);
    }

    score += documentation_points(repo);

    clamp_score(score, 100)
}

fn maturity_points(age_days: i64) -> f64 {
    match age_days {
        30..=365 => 15.0,
        7..=1095 => 11.0,
        d if d < 7 => 3.0,
        _ => 5.0,
    }
}

fn documentation_points(repo: &RepositorySummary) -> f64 {
    let description = repo.description_text();
    let words = WordText::new(description);
    let indicators = [
        description.chars().count() > 50,
        !repo.topics.is_empty(),
        matches!(repo.language.as_deref(), Some("Python" | "Jupyter Notebook")),
        words.contains("readme"),
        words.count_matches(DOCUMENTATION_TERMS) > 0,
    ];
    indicators.iter().filter(|hit| **hit).count() as f64
}
