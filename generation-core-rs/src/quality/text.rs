//! Deterministic text statistics used by the quality heuristics

use std::collections::{BTreeSet, HashSet};

/// Words at or above this length count as "long" for readability checks
pub const LONG_WORD_LEN: usize = 10;

/// Surface statistics of a piece of prose
#[derive(Debug, Clone, PartialEq)]
pub struct TextStats {
    pub word_count: usize,
    pub unique_words: usize,
    pub sentence_count: usize,
    pub paragraph_count: usize,
    pub dialogue_count: usize,
    pub exclamation_count: usize,
    pub question_count: usize,
    pub long_word_count: usize,
    pub repeated_word_count: usize,
    /// Share of sentences whose first letter is upper case
    pub capitalized_sentence_ratio: f64,
    /// Capitalized words found mid-sentence, lower-cased
    pub character_names: BTreeSet<String>,
    words: Vec<String>,
    vocabulary: HashSet<String>,
    lower: String,
}

impl TextStats {
    /// Analyze `text`; never fails, empty input yields zeroed statistics
    pub fn analyze(text: &str) -> Self {
        let normalized = text.replace("\r\n", "\n");
        let lower = normalized.to_lowercase();

        let words: Vec<String> = normalized
            .split_whitespace()
            .map(normalize_word)
            .filter(|w| !w.is_empty())
            .collect();
        let vocabulary: HashSet<String> = words.iter().cloned().collect();

        let sentences: Vec<&str> = normalized
            .split(|c| matches!(c, '.' | '!' | '?'))
            .filter(|s| s.chars().any(char::is_alphanumeric))
            .collect();

        let capitalized = sentences
            .iter()
            .filter(|s| {
                s.chars()
                    .find(|c| c.is_alphabetic())
                    .map(char::is_uppercase)
                    .unwrap_or(false)
            })
            .count();
        let capitalized_sentence_ratio = if sentences.is_empty() {
            0.0
        } else {
            capitalized as f64 / sentences.len() as f64
        };

        let character_names = sentences
            .iter()
            .flat_map(|sentence| sentence.split_whitespace().skip(1))
            .filter_map(|token| {
                let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
                let mut chars = trimmed.chars();
                match chars.next() {
                    Some(first) if first.is_uppercase() && trimmed.chars().count() > 1 => {
                        Some(trimmed.to_lowercase())
                    }
                    _ => None,
                }
            })
            .collect();

        let paragraph_count = normalized
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .count();

        let quote_marks = normalized
            .chars()
            .filter(|c| matches!(c, '"' | '\u{201c}' | '\u{201d}'))
            .count();

        let repeated_word_count = words.windows(2).filter(|pair| pair[0] == pair[1]).count();
        let long_word_count = words
            .iter()
            .filter(|w| w.chars().count() >= LONG_WORD_LEN)
            .count();

        Self {
            word_count: words.len(),
            unique_words: vocabulary.len(),
            sentence_count: sentences.len(),
            paragraph_count,
            dialogue_count: quote_marks / 2,
            exclamation_count: normalized.matches('!').count(),
            question_count: normalized.matches('?').count(),
            long_word_count,
            repeated_word_count,
            capitalized_sentence_ratio,
            character_names,
            words,
            vocabulary,
            lower,
        }
    }

    /// Mean words per sentence
    pub fn avg_sentence_length(&self) -> f64 {
        if self.sentence_count == 0 {
            0.0
        } else {
            self.word_count as f64 / self.sentence_count as f64
        }
    }

    /// Unique words over total words (type/token ratio)
    pub fn vocabulary_diversity(&self) -> f64 {
        if self.word_count == 0 {
            0.0
        } else {
            self.unique_words as f64 / self.word_count as f64
        }
    }

    /// Share of words at or above `LONG_WORD_LEN`
    pub fn long_word_ratio(&self) -> f64 {
        if self.word_count == 0 {
            0.0
        } else {
            self.long_word_count as f64 / self.word_count as f64
        }
    }

    /// Total occurrences of any word in `list`
    pub fn count_words(&self, list: &[&str]) -> usize {
        self.words
            .iter()
            .filter(|w| list.contains(&w.as_str()))
            .count()
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.vocabulary.contains(word)
    }

    /// Case-insensitive substring match, for multi-word markers
    pub fn contains_phrase(&self, phrase: &str) -> bool {
        self.lower.contains(phrase)
    }

    pub fn contains_any_phrase(&self, phrases: &[&str]) -> bool {
        phrases.iter().any(|p| self.contains_phrase(p))
    }
}

/// Lower-case a whitespace token and strip surrounding punctuation
pub fn normalize_word(token: &str) -> String {
    token
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase()
}

/// Significant (longer than three characters) words of a short phrase such as a theme or goal
pub fn significant_words(phrase: &str) -> Vec<String> {
    phrase
        .split_whitespace()
        .map(normalize_word)
        .filter(|w| w.chars().count() > 3)
        .collect()
}
