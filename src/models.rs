use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Identity of a repository, unique within the candidate source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepoId(pub u64);

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A repository as returned by one search query. Timestamps are kept in the
/// form the source sent them and parsed on demand, so a malformed value only
/// affects the terms that read it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: RepoId,
    /// `owner/name`
    pub full_name: String,
    pub name: String,
    pub owner: String,
    pub description: Option<String>,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
    pub watchers: u64,
    pub language: Option<String>,
    #[serde(default)]
    pub topics: BTreeSet<String>,
    pub created_at: String,
    pub updated_at: String,
    pub pushed_at: String,
}

impl RepositorySummary {
    pub fn description_text(&self) -> &str {
        self.description.as_deref().unwrap_or_default()
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    pub fn pushed(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.pushed_at)
    }

    /// Topics joined by spaces, for text matching.
    pub fn topics_text(&self) -> String {
        self.topics.iter().cloned().collect::<Vec<_>>().join(" ")
    }
}

/// Parse a timestamp in RFC 3339 or one of the naive formats older records
/// were written with (interpreted as UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    const NAIVE_FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
    ];
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Closed category taxonomy. Declaration order breaks classification ties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    LlmResearch,
    RagSystems,
    GenerativeImaging,
    ComputerVision,
    MachineLearning,
    AiAgents,
    Multimodal,
    SpeechAudio,
    DataScience,
    AiSafety,
    EdgeAi,
    General,
}

impl Category {
    /// Every category except the [`Category::General`] fallback, in tie-break order.
    pub const CANDIDATES: [Category; 11] = [
        Category::LlmResearch,
        Category::RagSystems,
        Category::GenerativeImaging,
        Category::ComputerVision,
        Category::MachineLearning,
        Category::AiAgents,
        Category::Multimodal,
        Category::SpeechAudio,
        Category::DataScience,
        Category::AiSafety,
        Category::EdgeAi,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::LlmResearch => "LLM research",
            Category::RagSystems => "RAG systems",
            Category::GenerativeImaging => "Generative imaging",
            Category::ComputerVision => "Computer vision",
            Category::MachineLearning => "Machine learning",
            Category::AiAgents => "AI agents",
            Category::Multimodal => "Multimodal AI",
            Category::SpeechAudio => "Speech & audio",
            Category::DataScience => "Data science",
            Category::AiSafety => "AI safety",
            Category::EdgeAi => "Edge AI",
            Category::General => "General AI tooling",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Scores derived from one observation of a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// 0-100
    pub quality: u8,
    /// 0-100
    pub trending: u8,
    /// 0-10
    pub ai_relevance: u8,
    pub category: Category,
    /// Sorted, bounded tag list.
    pub tags: Vec<String>,
    /// One-line description, e.g. `LLM research | 1200 stars | actively maintained`.
    pub summary: String,
}

/// Content hash over a record's mutable fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn of(summary: &RepositorySummary) -> Self {
        Self::with_counts(summary, summary.stars, summary.forks)
    }

    /// Fingerprint of `summary`'s text fields combined with the given counts.
    /// Comparing this against a stored fingerprint using the stored counts
    /// isolates text changes from count changes.
    pub fn with_counts(summary: &RepositorySummary, stars: u64, forks: u64) -> Self {
        let topics = summary.topics.iter().cloned().collect::<Vec<_>>().join(",");
        let content = [
            summary.name.as_str(),
            summary.description_text(),
            &stars.to_string(),
            &forks.to_string(),
            summary.language.as_deref().unwrap_or_default(),
            &topics,
        ]
        .join("|");
        Self(hex::encode(Sha256::digest(content.as_bytes())))
    }
}

/// The stored state of one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub id: RepoId,
    pub summary: RepositorySummary,
    pub score: ScoreBreakdown,
    /// RFC 3339 once written by this crate; older stores may hold other formats.
    pub last_observed_at: String,
    pub fingerprint: Fingerprint,
}

impl RepositoryRecord {
    /// Build the record for an observation made at `now`. When a previous
    /// record exists its timestamp is never moved backwards.
    pub fn observe(
        summary: RepositorySummary,
        score: ScoreBreakdown,
        now: DateTime<Utc>,
        previous: Option<&RepositoryRecord>,
    ) -> Self {
        let observed = now.to_rfc3339();
        let last_observed_at = match previous {
            Some(prev) => monotonic_timestamp(&observed, &prev.last_observed_at),
            None => observed,
        };
        Self {
            id: summary.id,
            fingerprint: Fingerprint::of(&summary),
            summary,
            score,
            last_observed_at,
        }
    }

    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.last_observed_at)
    }
}

/// Pick the later of two observation timestamps. An unparseable existing
/// value is replaced by the incoming one.
pub fn monotonic_timestamp(incoming: &str, existing: &str) -> String {
    match (parse_timestamp(incoming), parse_timestamp(existing)) {
        (Some(new), Some(old)) if old > new => existing.to_string(),
        _ => incoming.to_string(),
    }
}

/// What to do with one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Insert,
    Update,
    Reinsert,
    Skip,
}

impl Action {
    pub fn writes(&self) -> bool {
        !matches!(self, Action::Skip)
    }
}

/// Counters gathered by one sweep.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepStats {
    pub queries_issued: usize,
    pub queries_succeeded: usize,
    pub rate_limited: usize,
    pub abandoned: usize,
    pub failed: usize,
    pub duplicates_discarded: usize,
    pub escalations: usize,
    pub supplementary_pass: bool,
    /// Last source error seen, kept for the failure report.
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Cancelled,
    Failed { error: String },
}

/// Outcome of one collection run. Always produced, even when nothing was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub status: RunStatus,
    pub candidates: usize,
    /// Discarded by the relevance or quality floor.
    pub filtered: usize,
    pub inserted: usize,
    pub updated: usize,
    pub reinserted: usize,
    pub skipped: usize,
    pub errors: usize,
    pub avg_quality: f64,
    pub avg_trending: f64,
    pub avg_ai_relevance: f64,
    pub sweep: SweepStats,
}

impl RunSummary {
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: started_at,
            elapsed_ms: 0,
            status: RunStatus::Completed,
            candidates: 0,
            filtered: 0,
            inserted: 0,
            updated: 0,
            reinserted: 0,
            skipped: 0,
            errors: 0,
            avg_quality: 0.0,
            avg_trending: 0.0,
            avg_ai_relevance: 0.0,
            sweep: SweepStats::default(),
        }
    }

    pub fn record(&mut self, action: Action) {
        match action {
            Action::Insert => self.inserted += 1,
            Action::Update => self.updated += 1,
            Action::Reinsert => self.reinserted += 1,
            Action::Skip => self.skipped += 1,
        }
    }

    pub fn stored(&self) -> usize {
        self.inserted + self.updated + self.reinserted
    }

    /// Stored records as a percentage of candidates.
    pub fn success_rate(&self) -> f64 {
        if self.candidates == 0 {
            return 0.0;
        }
        self.stored() as f64 / self.candidates as f64 * 100.0
    }

    pub fn throughput_per_minute(&self) -> f64 {
        if self.elapsed_ms == 0 {
            return 0.0;
        }
        self.stored() as f64 / (self.elapsed_ms as f64 / 60_000.0)
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn summary(id: u64, name: &str) -> RepositorySummary {
        RepositorySummary {
            id: RepoId(id),
            full_name: format!("acme/{name}"),
            name: name.to_string(),
            owner: "acme".to_string(),
            description: None,
            url: format!("https://github.com/acme/{name}"),
            stars: 0,
            forks: 0,
            watchers: 0,
            language: None,
            topics: BTreeSet::new(),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            pushed_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    pub fn score(category: Category) -> ScoreBreakdown {
        ScoreBreakdown {
            quality: 50,
            trending: 50,
            ai_relevance: 5,
            category,
            tags: Vec::new(),
            summary: String::new(),
        }
    }
}
