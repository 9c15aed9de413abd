//! Per-observation insert/update/re-entry decisions.
//!
//! For one repository identity there are three states:
//!
//! - **Unseen**: no stored record. Always [`Action::Insert`].
//! - **Recent**: observed less than one dedup window ago. Written again
//!   ([`Action::Update`]) only on a significant change.
//! - **Stale**: observed a full window ago or longer. Re-admitted
//!   ([`Action::Reinsert`]) when there is new activity, real star growth, or a
//!   category change.
//!
//! A record whose last-observed timestamp cannot be parsed is treated as
//! stale and the problem is reported as a warning on the decision.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Action, Category, Fingerprint, RepositoryRecord, RepositorySummary, ScoreBreakdown};

/// Thresholds for the update and re-entry tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DedupPolicy {
    pub window_days: u32,
    /// Star growth that alone justifies an update inside the window.
    pub star_growth_threshold: u64,
    pub fork_growth_threshold: u64,
    /// Smaller star growth that counts for repositories above `popularity_floor`.
    pub minor_star_growth: u64,
    pub popularity_floor: u64,
    /// Star growth that justifies re-entry once the window has passed.
    pub reentry_star_growth: u64,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            window_days: 30,
            star_growth_threshold: 50,
            fork_growth_threshold: 10,
            minor_star_growth: 10,
            popularity_floor: 1000,
            reentry_star_growth: 10,
        }
    }
}

impl DedupPolicy {
    pub fn window(&self) -> Duration {
        Duration::days(i64::from(self.window_days))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObservedState {
    Unseen,
    Recent,
    Stale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reason {
    NewRepository,
    StarGrowth { delta: u64 },
    ForkGrowth { delta: u64 },
    ContentChanged,
    PopularStarGrowth { delta: u64, stars: u64 },
    NoSignificantChange,
    PushAdvanced,
    ReentryStarGrowth { delta: u64 },
    CategoryChanged { from: Category, to: Category },
    NoReentrySignal,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::NewRepository => write!(f, "new repository"),
            Reason::StarGrowth { delta } => write!(f, "star growth +{delta} within dedup window"),
            Reason::ForkGrowth { delta } => write!(f, "fork growth +{delta} within dedup window"),
            Reason::ContentChanged => write!(f, "description or metadata changed"),
            Reason::PopularStarGrowth { delta, stars } => {
                write!(f, "star growth +{delta} on a popular repository ({stars} stars)")
            }
            Reason::NoSignificantChange => write!(f, "no significant change within dedup window"),
            Reason::PushAdvanced => write!(f, "re-entry: new pushes since last observation"),
            Reason::ReentryStarGrowth { delta } => write!(f, "re-entry: star growth +{delta}"),
            Reason::CategoryChanged { from, to } => {
                write!(f, "re-entry: category changed from {from} to {to}")
            }
            Reason::NoReentrySignal => write!(f, "stale record without re-entry signal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionWarning {
    /// The stored last-observed timestamp could not be parsed.
    UnparseableLastObserved { raw: String },
    /// The stored push timestamp could not be parsed; a parseable new one
    /// counts as new activity.
    UnparseableStoredPush { raw: String },
}

impl fmt::Display for DecisionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionWarning::UnparseableLastObserved { raw } => {
                write!(f, "unparseable last_observed_at {raw:?}, treating record as stale")
            }
            DecisionWarning::UnparseableStoredPush { raw } => {
                write!(f, "unparseable stored pushed_at {raw:?}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub reason: Reason,
    pub state: ObservedState,
    pub warnings: Vec<DecisionWarning>,
}

impl Decision {
    fn new(action: Action, reason: Reason, state: ObservedState) -> Self {
        Self { action, reason, state, warnings: Vec::new() }
    }
}

/// Growth that ignores regressions in externally reported counts.
pub fn growth(old: u64, new: u64) -> u64 {
    new.saturating_sub(old)
}

#[derive(Debug, Clone, Default)]
pub struct DeduplicationEngine {
    policy: DedupPolicy,
}

impl DeduplicationEngine {
    pub fn new(policy: DedupPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &DedupPolicy {
        &self.policy
    }

    /// Decide what to do with `observation`. Pure: the same inputs always
    /// yield the same decision.
    pub fn decide(
        &self,
        existing: Option<&RepositoryRecord>,
        observation: &RepositorySummary,
        score: &ScoreBreakdown,
        now: DateTime<Utc>,
    ) -> Decision {
        let Some(record) = existing else {
            return Decision::new(Action::Insert, Reason::NewRepository, ObservedState::Unseen);
        };

        let mut warnings = Vec::new();
        let state = match record.last_observed() {
            // A timestamp in the future (clock skew) counts as recent.
            Some(last) if now - last < self.policy.window() => ObservedState::Recent,
            Some(_) => ObservedState::Stale,
            None => {
                warnings.push(DecisionWarning::UnparseableLastObserved {
                    raw: record.last_observed_at.clone(),
                });
                ObservedState::Stale
            }
        };

        let mut decision = match state {
            ObservedState::Recent => self.update_decision(record, observation),
            _ => self.reentry_decision(record, observation, score, &mut warnings),
        };
        decision.warnings = warnings;
        decision
    }

    fn update_decision(&self, record: &RepositoryRecord, observation: &RepositorySummary) -> Decision {
        let p = &self.policy;
        let stars = growth(record.summary.stars, observation.stars);
        let forks = growth(record.summary.forks, observation.forks);

        let reason = if stars >= p.star_growth_threshold {
            Some(Reason::StarGrowth { delta: stars })
        } else if forks >= p.fork_growth_threshold {
            Some(Reason::ForkGrowth { delta: forks })
        } else if content_changed(record, observation) {
            Some(Reason::ContentChanged)
        } else if stars >= p.minor_star_growth && observation.stars >= p.popularity_floor {
            Some(Reason::PopularStarGrowth { delta: stars, stars: observation.stars })
        } else {
            None
        };

        match reason {
            Some(reason) => Decision::new(Action::Update, reason, ObservedState::Recent),
            None => Decision::new(Action::Skip, Reason::NoSignificantChange, ObservedState::Recent),
        }
    }

    fn reentry_decision(
        &self,
        record: &RepositoryRecord,
        observation: &RepositorySummary,
        score: &ScoreBreakdown,
        warnings: &mut Vec<DecisionWarning>,
    ) -> Decision {
        let pushed = match (observation.pushed(), record.summary.pushed()) {
            (Some(new), Some(old)) => new > old,
            (Some(_), None) => {
                warnings.push(DecisionWarning::UnparseableStoredPush {
                    raw: record.summary.pushed_at.clone(),
                });
                true
            }
            (None, _) => false,
        };
        let stars = growth(record.summary.stars, observation.stars);

        let reason = if pushed {
            Some(Reason::PushAdvanced)
        } else if stars >= self.policy.reentry_star_growth {
            Some(Reason::ReentryStarGrowth { delta: stars })
        } else if score.category != record.score.category {
            Some(Reason::CategoryChanged { from: record.score.category, to: score.category })
        } else {
            None
        };

        match reason {
            Some(reason) => Decision::new(Action::Reinsert, reason, ObservedState::Stale),
            None => Decision::new(Action::Skip, Reason::NoReentrySignal, ObservedState::Stale),
        }
    }
}

/// Whether the observation's text fields differ from the record's, ignoring
/// star and fork counts.
pub fn content_changed(record: &RepositoryRecord, observation: &RepositorySummary) -> bool {
    Fingerprint::with_counts(observation, record.summary.stars, record.summary.forks)
        != record.fingerprint
}
