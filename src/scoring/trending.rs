use chrono::{DateTime, Utc};

use super::vocabulary::{WordText, HOT_TERMS};
use super::{banded, clamp_score, days_since, tiered, Tier};
use crate::models::RepositorySummary;

const STAR_TIERS: &[Tier] = &[
    Tier { min: 1_000, base: 25.0, span: 0.0 },
    Tier { min: 100, base: 15.0, span: 10.0 },
    Tier { min: 10, base: 5.0, span: 10.0 },
];

const FORK_TIERS: &[Tier] = &[
    Tier { min: 100, base: 15.0, span: 0.0 },
    Tier { min: 10, base: 10.0, span: 5.0 },
];

// Newer repositories score higher; old ones keep a small floor.
const CREATION_BANDS: &[(i64, f64)] = &[(30, 30.0), (90, 25.0), (180, 20.0), (365, 15.0), (i64::MAX, 5.0)];

const PUSH_BANDS: &[(i64, f64)] = &[(1, 20.0), (7, 15.0), (30, 10.0), (90, 5.0)];

const HOT_TERM_POINTS: f64 = 2.0;
const HOT_TERM_CAP: f64 = 10.0;

/// Short-term momentum, 0-100: magnitude (40), creation recency (30), push
/// recency (20) and hot-topic matches (10).
pub fn trending_score(repo: &RepositorySummary, now: DateTime<Utc>) -> u8 {
    let mut score = tiered(repo.stars, STAR_TIERS) + tiered(repo.forks, FORK_TIERS);

    if let Some(age) = days_since(repo.created(), now) {
        score += banded(age, CREATION_BANDS);
    }
    if let Some(days) = days_since(repo.pushed(), now) {
        score += banded(days, PUSH_BANDS);
    }

    score += hot_term_points(repo);

    clamp_score(score, 100)
}

fn hot_term_points(repo: &RepositorySummary) -> f64 {
    let text = WordText::new(&format!(
        "{} {} {}",
        repo.name,
        repo.description_text(),
        repo.topics_text()
    ));
    (text.count_matches(HOT_TERMS) as f64 * HOT_TERM_POINTS).min(HOT_TERM_CAP)
}
