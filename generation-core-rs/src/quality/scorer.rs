//! Heuristic quality scoring
//!
//! Every dimension is a small additive heuristic over `TextStats` and the
//! request metadata, clamped to [1, 10]. Relevance and educational
//! sub-scores are clamped to [0, 10]. Scoring is a pure function of its
//! inputs: no clock, no randomness, no I/O.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::content::{ContentMetadata, GeneratedContent};
use super::text::{significant_words, TextStats};

/// Texts shorter than this are penalized on every craft dimension
pub const MIN_WORDS: usize = 50;
const SHORT_TEXT_PENALTY: f64 = 2.0;

const TRANSITION_WORDS: &[&str] = &[
    "then", "next", "after", "later", "finally", "meanwhile", "suddenly", "because", "so",
    "however", "when", "soon", "first",
];

const DESCRIPTIVE_WORDS: &[&str] = &[
    "sparkling", "glowing", "whispered", "magical", "ancient", "shimmering", "gentle", "bright",
    "colorful", "mysterious", "enormous", "tiny", "wondrous", "golden", "silver", "quiet",
];

const EMOTION_WORDS: &[&str] = &[
    "happy", "sad", "excited", "afraid", "scared", "brave", "laughed", "smiled", "cried",
    "surprised", "proud", "worried", "curious", "joy", "delighted", "kind",
];

const LEARNING_WORDS: &[&str] = &[
    "learn", "learned", "discover", "discovered", "understand", "practice", "solve", "explore",
    "explored", "count", "counted", "share", "shared", "help", "helped", "together", "lesson",
    "why", "how",
];

const INAPPROPRIATE_WORDS: &[&str] = &[
    "kill", "killed", "blood", "bloody", "gun", "hate", "stupid", "die", "dead", "weapon",
    "drunk", "violent",
];

const BEGINNING_MARKERS: &[&str] = &[
    "once upon a time",
    "one day",
    "long ago",
    "there was",
    "there lived",
];

const ENDING_MARKERS: &[&str] = &[
    "the end",
    "happily ever after",
    "from that day",
    "in the end",
    "ever since",
];

/// The eight scored dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityDimension {
    Coherence,
    Creativity,
    Engagement,
    EducationalValue,
    AgeAppropriateness,
    LanguageQuality,
    StoryStructure,
    CharacterDevelopment,
}

impl QualityDimension {
    pub const ALL: [QualityDimension; 8] = [
        Self::Coherence,
        Self::Creativity,
        Self::Engagement,
        Self::EducationalValue,
        Self::AgeAppropriateness,
        Self::LanguageQuality,
        Self::StoryStructure,
        Self::CharacterDevelopment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Coherence => "coherence",
            Self::Creativity => "creativity",
            Self::Engagement => "engagement",
            Self::EducationalValue => "educational_value",
            Self::AgeAppropriateness => "age_appropriateness",
            Self::LanguageQuality => "language_quality",
            Self::StoryStructure => "story_structure",
            Self::CharacterDevelopment => "character_development",
        }
    }

    pub fn weight(&self) -> f64 {
        match self {
            Self::Coherence => 0.15,
            Self::Creativity => 0.12,
            Self::Engagement => 0.15,
            Self::EducationalValue => 0.18,
            Self::AgeAppropriateness => 0.15,
            Self::LanguageQuality => 0.10,
            Self::StoryStructure => 0.08,
            Self::CharacterDevelopment => 0.07,
        }
    }
}

impl fmt::Display for QualityDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Eight dimension scores plus the weighted overall, all within [0, 10]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityScore {
    pub coherence: f64,
    pub creativity: f64,
    pub engagement: f64,
    pub educational_value: f64,
    pub age_appropriateness: f64,
    pub language_quality: f64,
    pub story_structure: f64,
    pub character_development: f64,
    pub overall: f64,
}

impl QualityScore {
    /// Build a score from dimension values; `overall` is derived
    #[allow(clippy::too_many_arguments)]
    pub fn from_dimensions(
        coherence: f64,
        creativity: f64,
        engagement: f64,
        educational_value: f64,
        age_appropriateness: f64,
        language_quality: f64,
        story_structure: f64,
        character_development: f64,
    ) -> Self {
        let mut score = Self {
            coherence,
            creativity,
            engagement,
            educational_value,
            age_appropriateness,
            language_quality,
            story_structure,
            character_development,
            overall: 0.0,
        };
        score.overall = round1(
            QualityDimension::ALL
                .iter()
                .map(|d| score.dimension(*d) * d.weight())
                .sum(),
        );
        score
    }

    pub fn dimension(&self, dimension: QualityDimension) -> f64 {
        match dimension {
            QualityDimension::Coherence => self.coherence,
            QualityDimension::Creativity => self.creativity,
            QualityDimension::Engagement => self.engagement,
            QualityDimension::EducationalValue => self.educational_value,
            QualityDimension::AgeAppropriateness => self.age_appropriateness,
            QualityDimension::LanguageQuality => self.language_quality,
            QualityDimension::StoryStructure => self.story_structure,
            QualityDimension::CharacterDevelopment => self.character_development,
        }
    }
}

/// How well the content matches the requested themes, genre and keywords
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContentRelevanceScore {
    pub theme_alignment: f64,
    pub genre_consistency: f64,
    pub keyword_presence: f64,
    pub overall: f64,
}

/// How much the content teaches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EducationalValueScore {
    pub learning_objectives: f64,
    pub skill_development: f64,
    pub knowledge_transfer: f64,
    pub overall: f64,
}

/// The three score objects produced for one piece of content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub quality: QualityScore,
    pub relevance: ContentRelevanceScore,
    pub educational: EducationalValueScore,
}

/// Strategy interface for content scoring
pub trait ContentScorer: Send + Sync {
    fn score(
        &self,
        raw_text: &str,
        content: &GeneratedContent,
        metadata: &ContentMetadata,
    ) -> ScoreBreakdown;
}

/// Keyword and statistics based scorer
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicQualityScorer;

impl ContentScorer for HeuristicQualityScorer {
    fn score(
        &self,
        raw_text: &str,
        content: &GeneratedContent,
        metadata: &ContentMetadata,
    ) -> ScoreBreakdown {
        let body = content.body_text();
        let text = if body.trim().is_empty() { raw_text } else { body.as_str() };
        let stats = TextStats::analyze(text);

        let educational = educational_score(&stats, metadata);
        let relevance = relevance_score(&stats, metadata);

        let penalty = if stats.word_count < MIN_WORDS {
            SHORT_TEXT_PENALTY
        } else {
            0.0
        };
        let craft = |value: f64| clamp_dimension(value - penalty);

        let quality = QualityScore::from_dimensions(
            craft(coherence(&stats)),
            craft(creativity(&stats)),
            craft(engagement(&stats)),
            clamp_dimension(educational.overall),
            clamp_dimension(age_appropriateness(&stats, metadata)),
            craft(language_quality(&stats)),
            craft(story_structure(&stats, content)),
            craft(character_development(&stats, content)),
        );

        ScoreBreakdown {
            quality,
            relevance,
            educational,
        }
    }
}

fn coherence(stats: &TextStats) -> f64 {
    let mut score = 5.0;
    score += capped(stats.count_words(TRANSITION_WORDS), 0.5, 2.0);

    let avg = stats.avg_sentence_length();
    if (8.0..=25.0).contains(&avg) {
        score += 1.5;
    } else if (5.0..=35.0).contains(&avg) {
        score += 0.5;
    }

    if stats.paragraph_count >= 2 {
        score += 1.0;
    }
    score
}

fn creativity(stats: &TextStats) -> f64 {
    4.0 + stats.vocabulary_diversity() * 4.0
        + capped(stats.count_words(DESCRIPTIVE_WORDS), 0.5, 2.0)
}

fn engagement(stats: &TextStats) -> f64 {
    4.0 + capped(stats.dialogue_count, 0.5, 2.0)
        + capped(stats.count_words(EMOTION_WORDS), 0.5, 2.0)
        + capped(stats.exclamation_count + stats.question_count, 0.25, 1.0)
}

fn age_appropriateness(stats: &TextStats, metadata: &ContentMetadata) -> f64 {
    let mut score = 10.0 - stats.count_words(INAPPROPRIATE_WORDS) as f64 * 2.0;

    if let Some(range) = metadata.target_age_range {
        let max_sentence = if range.max <= 8 { 15.0 } else { 25.0 };
        if stats.avg_sentence_length() > max_sentence {
            score -= 1.0;
        }
        if stats.long_word_ratio() > 0.15 {
            score -= 1.0;
        }
    }
    score
}

fn language_quality(stats: &TextStats) -> f64 {
    let mut score = 5.0;

    let avg = stats.avg_sentence_length();
    if (6.0..=20.0).contains(&avg) {
        score += 2.0;
    } else if (4.0..=30.0).contains(&avg) {
        score += 1.0;
    }

    let diversity = stats.vocabulary_diversity();
    if diversity >= 0.4 {
        score += 1.5;
    } else if diversity >= 0.25 {
        score += 0.75;
    }

    if stats.capitalized_sentence_ratio >= 0.75 {
        score += 1.0;
    }

    score - stats.repeated_word_count as f64 * 0.5
}

fn story_structure(stats: &TextStats, content: &GeneratedContent) -> f64 {
    let mut score = 3.0;
    if stats.contains_any_phrase(BEGINNING_MARKERS) {
        score += 2.0;
    }
    if stats.contains_any_phrase(ENDING_MARKERS) {
        score += 2.0;
    }
    if stats.paragraph_count >= 3 {
        score += 1.5;
    } else if stats.paragraph_count >= 2 {
        score += 0.75;
    }
    if content.chapter_count() > 0 {
        score += 1.0;
    }
    score
}

fn character_development(stats: &TextStats, content: &GeneratedContent) -> f64 {
    let mut score = 3.0;
    score += capped(stats.character_names.len(), 1.0, 3.0);
    score += capped(stats.count_words(EMOTION_WORDS), 0.5, 2.0);
    score += capped(content.declared_characters(), 0.5, 1.5);
    if stats.dialogue_count > 0 {
        score += 1.0;
    }
    score
}

fn educational_score(stats: &TextStats, metadata: &ContentMetadata) -> EducationalValueScore {
    let learning_objectives = if metadata.educational_goals.is_empty() {
        5.0
    } else {
        2.0 + 8.0 * coverage(stats, &metadata.educational_goals)
    };
    let skill_development = 3.0 + capped(stats.count_words(LEARNING_WORDS), 0.75, 7.0);
    let knowledge_transfer =
        3.0 + capped(stats.question_count, 1.0, 3.0) + stats.vocabulary_diversity() * 4.0;

    let learning_objectives = clamp_subscore(learning_objectives);
    let skill_development = clamp_subscore(skill_development);
    let knowledge_transfer = clamp_subscore(knowledge_transfer);

    EducationalValueScore {
        learning_objectives,
        skill_development,
        knowledge_transfer,
        overall: round1((learning_objectives + skill_development + knowledge_transfer) / 3.0),
    }
}

fn relevance_score(stats: &TextStats, metadata: &ContentMetadata) -> ContentRelevanceScore {
    let theme_alignment = if metadata.themes.is_empty() {
        5.0
    } else {
        10.0 * coverage(stats, &metadata.themes)
    };

    let genre_consistency = match metadata.genre.as_deref() {
        None => 5.0,
        Some(genre) => {
            let genre = genre.trim().to_lowercase();
            match genre_words(&genre) {
                Some(words) => 3.0 + stats.count_words(words) as f64 * 1.5,
                None if stats.contains_word(&genre) => 8.0,
                None => 4.0,
            }
        }
    };

    let keyword_presence = if metadata.keywords.is_empty() {
        5.0
    } else {
        10.0 * coverage(stats, &metadata.keywords)
    };

    let theme_alignment = clamp_subscore(theme_alignment);
    let genre_consistency = clamp_subscore(genre_consistency);
    let keyword_presence = clamp_subscore(keyword_presence);

    ContentRelevanceScore {
        theme_alignment,
        genre_consistency,
        keyword_presence,
        overall: round1((theme_alignment + genre_consistency + keyword_presence) / 3.0),
    }
}

fn genre_words(genre: &str) -> Option<&'static [&'static str]> {
    let words: &'static [&'static str] = match genre {
        "fantasy" => &[
            "magic",
            "magical",
            "dragon",
            "wizard",
            "castle",
            "spell",
            "fairy",
            "enchanted",
        ],
        "adventure" => &["journey", "explore", "explored", "map", "treasure", "quest", "discover"],
        "mystery" => &["clue", "mystery", "secret", "secrets", "detective", "puzzle", "hidden"],
        "science" | "science fiction" => &[
            "experiment",
            "planet",
            "science",
            "space",
            "rocket",
            "stars",
            "moon",
        ],
        "friendship" => &[
            "friend", "friends", "together", "share", "shared", "help", "helped", "kind",
        ],
        _ => return None,
    };
    Some(words)
}

/// Share of phrases with at least one significant word present in the text.
/// Phrases without significant words match on the whole lower-cased phrase.
fn coverage(stats: &TextStats, phrases: &[String]) -> f64 {
    if phrases.is_empty() {
        return 0.0;
    }
    let matched = phrases
        .iter()
        .filter(|phrase| {
            let words = significant_words(phrase);
            if words.is_empty() {
                stats.contains_phrase(&phrase.trim().to_lowercase())
            } else {
                words.iter().any(|w| stats.contains_word(w))
            }
        })
        .count();
    matched as f64 / phrases.len() as f64
}

fn capped(count: usize, per_item: f64, cap: f64) -> f64 {
    (count as f64 * per_item).min(cap)
}

fn clamp_dimension(value: f64) -> f64 {
    value.clamp(1.0, 10.0)
}

fn clamp_subscore(value: f64) -> f64 {
    value.clamp(0.0, 10.0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::content::{ContentType, StoryContent};

    fn story(text: &str) -> GeneratedContent {
        GeneratedContent::StoryContent(StoryContent {
            title: "Test".to_string(),
            content: text.to_string(),
            chapters: None,
        })
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum: f64 = QualityDimension::ALL.iter().map(|d| d.weight()).sum();
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_is_weighted_and_rounded() {
        let uniform = QualityScore::from_dimensions(7.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0);
        assert_eq!(uniform.overall, 7.0);

        // 10 * 0.15 + 2 * 0.85
        let mixed = QualityScore::from_dimensions(10.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0);
        assert_eq!(mixed.overall, 3.2);
    }

    #[test]
    fn test_dimensions_are_clamped() {
        let breakdown = HeuristicQualityScorer.score("", &story(""), &ContentMetadata::default());
        for dimension in QualityDimension::ALL {
            let value = breakdown.quality.dimension(dimension);
            assert!((1.0..=10.0).contains(&value), "{} = {}", dimension, value);
        }
        assert!((0.0..=10.0).contains(&breakdown.relevance.overall));
        assert!((0.0..=10.0).contains(&breakdown.educational.overall));
    }

    #[test]
    fn test_inappropriate_words_lower_age_score() {
        let clean = HeuristicQualityScorer.score(
            "",
            &story("The friends played in the park."),
            &ContentMetadata::default(),
        );
        let dark = HeuristicQualityScorer.score(
            "",
            &story("The friends saw blood and a gun in the park."),
            &ContentMetadata::default(),
        );
        assert_eq!(clean.quality.age_appropriateness, 10.0);
        assert_eq!(dark.quality.age_appropriateness, 6.0);
    }

    #[test]
    fn test_raw_text_used_when_body_empty() {
        let content = GeneratedContent::parse(ContentType::StoryContent, "");
        let from_raw = HeuristicQualityScorer.score(
            "Once upon a time there was a fox.",
            &content,
            &ContentMetadata::default(),
        );
        let empty = HeuristicQualityScorer.score("", &content, &ContentMetadata::default());
        assert!(from_raw.quality.story_structure > empty.quality.story_structure);
    }

    #[test]
    fn test_theme_coverage() {
        let metadata = ContentMetadata {
            themes: vec!["friendship".to_string(), "ocean life".to_string()],
            ..ContentMetadata::default()
        };
        let breakdown = HeuristicQualityScorer.score(
            "",
            &story("Their friendship grew by the ocean."),
            &metadata,
        );
        assert_eq!(breakdown.relevance.theme_alignment, 10.0);

        let breakdown =
            HeuristicQualityScorer.score("", &story("Their friendship grew."), &metadata);
        assert_eq!(breakdown.relevance.theme_alignment, 5.0);
    }
}
