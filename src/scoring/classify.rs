use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::days_since;
use super::vocabulary::{all_terms, category_terms, WordText};
use crate::models::{Category, RepositorySummary};

const NAME_WEIGHT: u32 = 3;
const DESCRIPTION_WEIGHT: u32 = 2;
const TOPIC_WEIGHT: u32 = 1;

/// Weighted-term classification into the closed taxonomy.
///
/// Each term counts once, at the weight of the most important field it
/// appears in. The highest-scoring category wins; ties go to the category
/// declared first, and no match at all yields [`Category::General`].
pub fn categorize(repo: &RepositorySummary) -> Category {
    let name = WordText::new(&repo.name);
    let description = WordText::new(repo.description_text());
    let topics = WordText::new(&repo.topics_text());

    let mut best = (Category::General, 0u32);
    for category in Category::CANDIDATES {
        let score: u32 = category_terms(category)
            .iter()
            .map(|term| {
                if name.contains_term(term) {
                    NAME_WEIGHT
                } else if description.contains_term(term) {
                    DESCRIPTION_WEIGHT
                } else if topics.contains_term(term) {
                    TOPIC_WEIGHT
                } else {
                    0
                }
            })
            .sum();
        if score > best.1 {
            best = (category, score);
        }
    }
    best.0
}

/// Vocabulary terms found anywhere in the repository text, normalised per
/// term and truncated after sorting so the result is stable.
pub fn extract_tags(repo: &RepositorySummary, max_tags: usize) -> Vec<String> {
    let text = WordText::new(&format!(
        "{} {} {}",
        repo.name,
        repo.description_text(),
        repo.topics_text()
    ));
    let tags: BTreeSet<String> = all_terms()
        .filter(|term| text.contains_term(term))
        .map(|term| term.tag())
        .collect();
    tags.into_iter().take(max_tags).collect()
}

pub fn summary_line(
    repo: &RepositorySummary,
    category: Category,
    tags: &[String],
    now: DateTime<Utc>,
) -> String {
    let mut parts = vec![category.label().to_string()];

    if repo.stars >= 1000 {
        parts.push(format!("high traction ({} stars)", repo.stars));
    } else if repo.stars >= 100 {
        parts.push(format!("growing ({} stars)", repo.stars));
    }

    match days_since(repo.pushed(), now) {
        Some(days) if days <= 7 => parts.push("actively maintained".to_string()),
        Some(days) if days <= 30 => parts.push("regularly updated".to_string()),
        _ => {}
    }

    if !tags.is_empty() {
        let main: Vec<&str> = tags.iter().take(3).map(String::as_str).collect();
        parts.push(format!("key tech: {}", main.join(", ")));
    }

    parts.join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::summary;
    use chrono::{Duration, TimeZone};

    fn repo(name: &str, description: &str) -> RepositorySummary {
        let mut repo = summary(1, name);
        repo.description = Some(description.to_string());
        repo
    }

    #[test]
    fn test_categorize_known_projects() {
        assert_eq!(
            categorize(&repo("vllm", "High-throughput LLM serving engine")),
            Category::LlmResearch
        );
        assert_eq!(
            categorize(&repo("rag-system", "Retrieval-augmented generation with a vector database")),
            Category::RagSystems
        );
        assert_eq!(
            categorize(&repo("stable-diffusion-webui", "Web interface for Stable Diffusion")),
            Category::GenerativeImaging
        );
        assert_eq!(
            categorize(&repo("yolo-detection", "Real-time object detection")),
            Category::ComputerVision
        );
        assert_eq!(
            categorize(&repo("pandas-profiling", "Automated data analysis and visualization")),
            Category::DataScience
        );
    }

    #[test]
    fn test_categorize_defaults_to_general() {
        assert_eq!(
            categorize(&repo("hello-world", "Simple hello world application")),
            Category::General
        );
    }

    #[test]
    fn test_categorize_breaks_ties_by_declaration_order() {
        // One description hit each for LLM research and machine learning.
        let r = repo("toolkit", "transformer and pytorch");
        assert_eq!(categorize(&r), Category::LlmResearch);
    }

    #[test]
    fn test_name_match_beats_description_match() {
        // Name hit for computer vision (3) beats a description hit for LLMs (2).
        let r = repo("opencv-bindings", "works with any transformer");
        assert_eq!(categorize(&r), Category::ComputerVision);
    }

    #[test]
    fn test_clipboard_is_not_clip() {
        let r = repo("clipboard-manager", "Clipboard history manager for the desktop");
        assert_eq!(categorize(&r), Category::General);
        assert!(extract_tags(&r, 10).is_empty());

        let r = repo("clip-search", "Image search with CLIP embeddings");
        assert_eq!(categorize(&r), Category::Multimodal);
    }

    #[test]
    fn test_extract_tags_normalises_case() {
        let mut r = repo("llm-rag", "PyTorch pipeline using langchain");
        r.topics = ["deep-learning".to_string()].into_iter().collect();
        let tags = extract_tags(&r, 10);
        assert!(tags.contains(&"LLM".to_string()));
        assert!(tags.contains(&"RAG".to_string()));
        assert!(tags.contains(&"Pytorch".to_string()));
        assert!(tags.contains(&"Langchain".to_string()));
        assert!(tags.contains(&"deep-learning".to_string()));
    }

    #[test]
    fn test_extract_tags_truncation_is_stable() {
        let r = repo(
            "everything",
            "llm gpt bert rag yolo pytorch tensorflow pandas jupyter whisper clip blip tinyml",
        );
        let first = extract_tags(&r, 5);
        let second = extract_tags(&r, 5);
        assert_eq!(first.len(), 5);
        assert_eq!(first, second);
        let mut sorted = first.clone();
        sorted.sort();
        assert_eq!(first, sorted);
    }

    #[test]
    fn test_summary_line_mentions_activity_and_tags() {
        let now = Utc.with_ymd_and_hms(2026, 10, 1, 0, 0, 0).unwrap();
        let mut r = repo("llm-kit", "LLM toolkit");
        r.stars = 1500;
        r.pushed_at = (now - Duration::days(1)).to_rfc3339();
        let line = summary_line(&r, Category::LlmResearch, &["LLM".to_string()], now);
        assert_eq!(
            line,
            "LLM research | high traction (1500 stars) | actively maintained | key tech: LLM"
        );
    }
}
