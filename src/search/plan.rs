use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Every query excludes forks and archived repositories.
const EXCLUSIONS: &str = "fork:false archived:false";

/// A named set of keywords queried together as one disjunction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub name: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// `(a OR b OR "multi word")`
    pub fn disjunction(&self) -> String {
        let terms: Vec<String> = self
            .keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(|k| {
                if k.contains(char::is_whitespace) {
                    format!("\"{k}\"")
                } else {
                    k.to_string()
                }
            })
            .collect();
        format!("({})", terms.join(" OR "))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateField {
    Created,
    Pushed,
}

impl DateField {
    pub fn qualifier(&self) -> &'static str {
        match self {
            DateField::Created => "created",
            DateField::Pushed => "pushed",
        }
    }
}

/// A date range relative to the run's reference time, with its own star floor.
///
/// The range ends `offset_days` before `now` and spans `span_days` back from
/// there, so `offset_days: 30, span_days: 60` covers 90 to 30 days ago.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub name: String,
    #[serde(default = "default_field")]
    pub field: DateField,
    #[serde(default)]
    pub offset_days: u32,
    pub span_days: u32,
    pub min_stars: u64,
}

fn default_field() -> DateField {
    DateField::Created
}

impl TimeWindow {
    pub fn created(name: &str, offset_days: u32, span_days: u32, min_stars: u64) -> Self {
        Self {
            name: name.to_string(),
            field: DateField::Created,
            offset_days,
            span_days,
            min_stars,
        }
    }

    pub fn range(&self, now: DateTime<Utc>) -> (NaiveDate, NaiveDate) {
        let end = now - Duration::days(i64::from(self.offset_days));
        let start = end - Duration::days(i64::from(self.span_days));
        (start.date_naive(), end.date_naive())
    }

    /// `stars:>=N created:YYYY-MM-DD..YYYY-MM-DD`
    pub fn qualifiers(&self, now: DateTime<Utc>) -> String {
        let (start, end) = self.range(now);
        format!(
            "stars:>={} {}:{}..{}",
            self.min_stars,
            self.field.qualifier(),
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
    Stars,
    Updated,
    Created,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::Stars => "stars",
            SortField::Updated => "updated",
            SortField::Created => "created",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Desc,
    Asc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Desc => "desc",
            SortOrder::Asc => "asc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortStrategy {
    pub sort: SortField,
    #[serde(default = "default_order")]
    pub order: SortOrder,
}

fn default_order() -> SortOrder {
    SortOrder::Desc
}

impl SortStrategy {
    pub fn desc(sort: SortField) -> Self {
        Self { sort, order: SortOrder::Desc }
    }
}

/// One fully rendered search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub q: String,
    pub sort: SortField,
    pub order: SortOrder,
    pub per_page: u32,
}

impl SearchQuery {
    pub fn build(
        group: &KeywordGroup,
        window: &TimeWindow,
        strategy: SortStrategy,
        per_page: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            q: format!("{} {} {EXCLUSIONS}", group.disjunction(), window.qualifiers(now)),
            sort: strategy.sort,
            order: strategy.order,
            per_page,
        }
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} {}]", self.q, self.sort.as_str(), self.order.as_str())
    }
}

/// The full query plan for a sweep. Any field left out of a plan file keeps
/// its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchPlan {
    pub groups: Vec<KeywordGroup>,
    pub windows: Vec<TimeWindow>,
    /// Escalation ladder for low-yield combinations, narrowest first.
    pub fallback_windows: Vec<TimeWindow>,
    pub sorts: Vec<SortStrategy>,
    /// High-recall keywords for the supplementary pass.
    pub broad_keywords: Vec<String>,
    pub broad_window: TimeWindow,
}

impl Default for SearchPlan {
    fn default() -> Self {
        Self {
            groups: default_groups(),
            windows: vec![
                TimeWindow::created("recent_month", 0, 30, 100),
                TimeWindow::created("recent_2months", 30, 60, 50),
                TimeWindow::created("recent_3months", 60, 90, 20),
                TimeWindow::created("recent_6months", 90, 180, 10),
            ],
            fallback_windows: vec![
                TimeWindow::created("last_90_days", 0, 90, 10),
                TimeWindow::created("last_180_days", 0, 180, 10),
                TimeWindow::created("last_year", 0, 365, 5),
            ],
            sorts: vec![
                SortStrategy::desc(SortField::Stars),
                SortStrategy::desc(SortField::Updated),
                SortStrategy::desc(SortField::Created),
            ],
            broad_keywords: [
                "LLM",
                "AI",
                "machine-learning",
                "deep-learning",
                "diffusion",
                "GPT",
                "transformer",
                "generative-ai",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
            broad_window: TimeWindow::created("broad_year", 0, 365, 5),
        }
    }
}

fn default_groups() -> Vec<KeywordGroup> {
    vec![
        KeywordGroup::new("llm_core", &["LLM", "large-language-model", "transformer", "GPT"]),
        KeywordGroup::new("llm_training", &["fine-tuning", "PEFT", "LoRA", "QLoRA", "instruction-tuning"]),
        KeywordGroup::new("llm_inference", &["inference", "serving", "vllm", "ollama", "llama"]),
        KeywordGroup::new("rag_tech", &["RAG", "retrieval-augmented", "vector-database", "embedding"]),
        KeywordGroup::new("rag_tools", &["chromadb", "pinecone", "weaviate", "qdrant", "milvus"]),
        KeywordGroup::new("diffusion_models", &["diffusion", "stable-diffusion", "DDPM", "DDIM"]),
        KeywordGroup::new("image_gen", &["text-to-image", "image-generation", "DALL-E", "midjourney"]),
        KeywordGroup::new("ml_frameworks", &["pytorch", "tensorflow", "jax", "scikit-learn"]),
        KeywordGroup::new("ml_algorithms", &["deep-learning", "neural-network", "machine-learning"]),
        KeywordGroup::new("cv_detection", &["object-detection", "YOLO", "RCNN", "detection"]),
        KeywordGroup::new("cv_recognition", &["image-classification", "face-recognition", "OCR"]),
        KeywordGroup::new("cv_segmentation", &["segmentation", "semantic-segmentation", "instance-segmentation"]),
        KeywordGroup::new("data_processing", &["data-science", "pandas", "numpy", "jupyter"]),
        KeywordGroup::new("data_analysis", &["data-analysis", "visualization", "analytics", "statistics"]),
        KeywordGroup::new("ai_agents", &["agent", "autonomous", "multi-agent", "langchain"]),
        KeywordGroup::new("ai_tools", &["chatbot", "assistant", "automation", "workflow"]),
    ]
}

impl SearchPlan {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let err = |reason: String| ConfigError::SearchPlan {
            path: path.display().to_string(),
            reason,
        };
        let data = std::fs::read_to_string(path).map_err(|e| err(e.to_string()))?;
        let plan: SearchPlan = serde_json::from_str(&data).map_err(|e| err(e.to_string()))?;
        plan.validate()?;
        Ok(plan)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            name: "search_plan",
            reason: reason.to_string(),
        };
        if self.groups.is_empty() {
            return Err(invalid("at least one keyword group is required"));
        }
        if let Some(group) = self.groups.iter().find(|g| g.keywords.iter().all(|k| k.trim().is_empty())) {
            return Err(invalid(&format!("keyword group {} has no keywords", group.name)));
        }
        if self.windows.is_empty() {
            return Err(invalid("at least one time window is required"));
        }
        if self.sorts.is_empty() {
            return Err(invalid("at least one sort strategy is required"));
        }
        Ok(())
    }

    /// Keyword group used by the supplementary pass.
    pub fn broad_group(&self) -> KeywordGroup {
        KeywordGroup {
            name: "broad".to_string(),
            keywords: self.broad_keywords.clone(),
        }
    }
}
