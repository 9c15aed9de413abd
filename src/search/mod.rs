pub mod orchestrator;
pub mod plan;

pub use orchestrator::{SearchOrchestrator, SweepCaps, SweepOutcome};
pub use plan::{KeywordGroup, SearchPlan, SearchQuery, SortStrategy, TimeWindow};
