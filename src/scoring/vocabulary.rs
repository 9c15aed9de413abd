//! Controlled vocabulary and the word-aware matcher the scorers share.

use crate::models::Category;

/// Display casing applied when a term becomes a tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCase {
    /// Acronym-like terms: `LLM`, `RAG`, `YOLO`.
    Upper,
    /// Proper-noun-like terms: `Pytorch`, `Stable-Diffusion`-style names.
    Title,
    Lower,
}

#[derive(Debug, Clone, Copy)]
pub struct Term {
    pub text: &'static str,
    pub case: TagCase,
    /// Match only the whole word or its plural, never a longer word.
    pub whole_word: bool,
}

const fn up(text: &'static str) -> Term {
    Term { text, case: TagCase::Upper, whole_word: false }
}

/// An acronym that is also the start of ordinary words (`clip`, `clipboard`).
const fn word(text: &'static str) -> Term {
    Term { text, case: TagCase::Upper, whole_word: true }
}

const fn title(text: &'static str) -> Term {
    Term { text, case: TagCase::Title, whole_word: false }
}

const fn low(text: &'static str) -> Term {
    Term { text, case: TagCase::Lower, whole_word: false }
}

impl Term {
    pub fn tag(&self) -> String {
        match self.case {
            TagCase::Upper => self.text.to_uppercase(),
            TagCase::Lower => self.text.to_lowercase(),
            TagCase::Title => self
                .text
                .split('-')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join("-"),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

const LLM_RESEARCH: &[Term] = &[
    up("llm"),
    low("large-language-model"),
    up("gpt"),
    low("transformer"),
    up("bert"),
    title("chatgpt"),
    low("language-model"),
    title("llama"),
    low("generative-ai"),
];

const RAG_SYSTEMS: &[Term] = &[
    up("rag"),
    low("retrieval-augmented"),
    low("vector-database"),
    low("vector-search"),
    low("semantic-search"),
    low("embedding"),
    title("llamaindex"),
    low("knowledge-base"),
];

const GENERATIVE_IMAGING: &[Term] = &[
    low("diffusion"),
    title("stable-diffusion"),
    title("dalle"),
    low("text-to-image"),
    low("image-generation"),
    title("midjourney"),
    low("generative-art"),
];

const COMPUTER_VISION: &[Term] = &[
    low("computer-vision"),
    low("object-detection"),
    up("yolo"),
    title("opencv"),
    low("image-segmentation"),
    low("face-recognition"),
    low("image-processing"),
];

const MACHINE_LEARNING: &[Term] = &[
    low("machine-learning"),
    title("pytorch"),
    title("tensorflow"),
    low("scikit-learn"),
    low("deep-learning"),
    low("neural-network"),
    up("jax"),
];

const AI_AGENTS: &[Term] = &[
    low("ai-agent"),
    low("autonomous-agent"),
    low("multi-agent"),
    title("autogen"),
    title("crewai"),
    title("langchain"),
    low("tool-calling"),
    low("agent"),
];

const MULTIMODAL: &[Term] = &[
    low("multimodal"),
    low("vision-language"),
    low("cross-modal"),
    word("clip"),
    word("blip"),
    up("gpt-4v"),
];

const SPEECH_AUDIO: &[Term] = &[
    low("speech-recognition"),
    low("text-to-speech"),
    low("speech-synthesis"),
    low("voice-cloning"),
    title("whisper"),
    up("tts"),
    low("speech"),
];

const DATA_SCIENCE: &[Term] = &[
    low("data-science"),
    low("data-analysis"),
    title("pandas"),
    title("jupyter"),
    low("visualization"),
    low("analytics"),
    low("data-mining"),
];

const AI_SAFETY: &[Term] = &[
    low("ai-safety"),
    low("explainable-ai"),
    low("responsible-ai"),
    low("alignment"),
    low("interpretability"),
    low("fairness"),
];

const EDGE_AI: &[Term] = &[
    low("edge-ai"),
    low("mobile-ai"),
    up("tinyml"),
    low("model-compression"),
    low("quantization"),
    low("pruning"),
];

/// Terms that classify into `category`. Empty for [`Category::General`].
pub fn category_terms(category: Category) -> &'static [Term] {
    match category {
        Category::LlmResearch => LLM_RESEARCH,
        Category::RagSystems => RAG_SYSTEMS,
        Category::GenerativeImaging => GENERATIVE_IMAGING,
        Category::ComputerVision => COMPUTER_VISION,
        Category::MachineLearning => MACHINE_LEARNING,
        Category::AiAgents => AI_AGENTS,
        Category::Multimodal => MULTIMODAL,
        Category::SpeechAudio => SPEECH_AUDIO,
        Category::DataScience => DATA_SCIENCE,
        Category::AiSafety => AI_SAFETY,
        Category::EdgeAi => EDGE_AI,
        Category::General => &[],
    }
}

/// The full tag vocabulary, in category declaration order.
pub fn all_terms() -> impl Iterator<Item = &'static Term> {
    Category::CANDIDATES
        .iter()
        .flat_map(|c| category_terms(*c).iter())
}

// Relevance lists, most specific first.
pub const RELEVANCE_NAME_TERMS: &[&str] = &[
    "ai", "ml", "llm", "gpt", "neural", "deep", "learning", "llama", "chatgpt",
];

pub const RELEVANCE_DESCRIPTION_TERMS: &[&str] = &[
    "artificial intelligence",
    "machine learning",
    "deep learning",
    "neural network",
    "computer vision",
    "natural language",
    "generative",
    "diffusion",
    "transformer",
    "llm",
    "gpt",
    "chatgpt",
    "claude",
    "language model",
    "ai",
    "ml",
];

pub const RELEVANCE_TOPIC_TERMS: &[&str] = &[
    "artificial-intelligence",
    "machine-learning",
    "deep-learning",
    "computer-vision",
    "natural-language-processing",
    "neural-networks",
    "llm",
    "gpt",
    "chatgpt",
    "ai",
    "ml",
];

pub const HOT_TERMS: &[&str] = &[
    "gpt",
    "llm",
    "chatgpt",
    "stable-diffusion",
    "sora",
    "agent",
    "rag",
    "multimodal",
    "whisper",
    "transformer",
];

pub const DOCUMENTATION_TERMS: &[&str] = &["documentation", "docs", "tutorial", "example"];

/// Lowercased text split into words, with `-` and `_` treated as separators.
///
/// Terms match at word starts, so `transformer` matches `transformers` but
/// `ai` never matches inside `openai`. Terms of three characters or fewer
/// must match a whole word (or its plural).
#[derive(Debug, Clone)]
pub struct WordText {
    padded: String,
}

impl WordText {
    pub fn new(text: &str) -> Self {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        Self {
            padded: format!(" {} ", words.join(" ")),
        }
    }

    pub fn contains(&self, term: &str) -> bool {
        let normalized = WordText::new(term);
        let needle = normalized.padded.trim();
        if needle.is_empty() {
            return false;
        }
        if !needle.contains(' ') && needle.chars().count() <= 3 {
            return self.contains_word(needle);
        }
        self.padded.contains(&format!(" {needle}"))
    }

    /// Match a vocabulary term, honouring its whole-word flag.
    pub fn contains_term(&self, term: &Term) -> bool {
        if !term.whole_word {
            return self.contains(term.text);
        }
        let normalized = WordText::new(term.text);
        let needle = normalized.padded.trim();
        !needle.is_empty() && self.contains_word(needle)
    }

    fn contains_word(&self, needle: &str) -> bool {
        self.padded.contains(&format!(" {needle} "))
            || self.padded.contains(&format!(" {needle}s "))
    }

    pub fn count_matches(&self, terms: &[&str]) -> usize {
        terms.iter().filter(|t| self.contains(t)).count()
    }
}
