use super::clamp_score;
use super::vocabulary::{
    WordText, RELEVANCE_DESCRIPTION_TERMS, RELEVANCE_NAME_TERMS, RELEVANCE_TOPIC_TERMS,
};
use crate::models::RepositorySummary;

struct Pass {
    terms: &'static [&'static str],
    per_match: f64,
    cap: f64,
}

const NAME_PASS: Pass = Pass { terms: RELEVANCE_NAME_TERMS, per_match: 2.0, cap: 4.0 };
const DESCRIPTION_PASS: Pass = Pass { terms: RELEVANCE_DESCRIPTION_TERMS, per_match: 1.0, cap: 3.5 };
const TOPIC_PASS: Pass = Pass { terms: RELEVANCE_TOPIC_TERMS, per_match: 1.0, cap: 2.5 };

impl Pass {
    fn points(&self, text: &str) -> f64 {
        let matches = WordText::new(text).count_matches(self.terms);
        (matches as f64 * self.per_match).min(self.cap)
    }
}

/// AI relevance, 0-10. Name matches weigh most; each pass is capped on its own.
pub fn ai_relevance(repo: &RepositorySummary) -> u8 {
    let score = NAME_PASS.points(&repo.name)
        + DESCRIPTION_PASS.points(repo.description_text())
        + TOPIC_PASS.points(&repo.topics_text());
    clamp_score(score, 10)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::summary;

    #[test]
    fn test_unrelated_repo_scores_zero() {
        let mut repo = summary(1, "hello-world");
        repo.description = Some("Simple hello world application for beginners".into());
        assert_eq!(ai_relevance(&repo), 0);
    }

    #[test]
    fn test_name_match_outweighs_description_match() {
        let mut by_name = summary(1, "llm-server");
        by_name.description = None;
        let mut by_description = summary(2, "server");
        by_description.description = Some("serves an llm".into());
        assert!(ai_relevance(&by_name) > ai_relevance(&by_description));
    }

    #[test]
    fn test_passes_are_capped_independently() {
        let mut repo = summary(1, "ai-ml-llm-gpt-neural-deep-learning");
        repo.description = None;
        assert_eq!(ai_relevance(&repo), 4);
    }

    #[test]
    fn test_full_marks_need_all_three_passes() {
        let mut repo = summary(1, "llama-gpt-ai");
        repo.description = Some("A deep learning transformer and language model for machine learning".into());
        repo.topics = ["llm", "ai", "machine-learning"].iter().map(|s| s.to_string()).collect();
        assert_eq!(ai_relevance(&repo), 10);
    }

    #[test]
    fn test_missing_description_and_topics_are_empty() {
        let mut repo = summary(1, "ai-helper");
        repo.description = None;
        repo.topics.clear();
        assert_eq!(ai_relevance(&repo), 2);
    }
}
