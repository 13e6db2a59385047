//! Content quality scoring and validation
//!
//! This module provides:
//! - The content tagged union and its parsing from raw model output
//! - Deterministic heuristic scoring over eight weighted dimensions
//! - The configurable quality gate
//! - Fixed-rule feedback and recommendations

pub mod content;
pub mod feedback;
pub mod scorer;
pub mod text;
pub mod thresholds;

pub use content::{
    AgeRange, Chapter, ChapterOutline, CharacterProfile, ContentMetadata, ContentType,
    GeneratedContent, StoryContent, StoryOutline, StoryRevision,
};
pub use scorer::{
    ContentRelevanceScore, ContentScorer, EducationalValueScore, HeuristicQualityScorer,
    QualityDimension, QualityScore, ScoreBreakdown,
};
pub use thresholds::QualityThresholds;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;

/// Outcome of validating one piece of content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityValidationResult {
    pub content_id: String,
    pub quality_score: QualityScore,
    pub relevance_score: ContentRelevanceScore,
    pub educational_score: EducationalValueScore,
    pub feedback: Vec<String>,
    pub recommendations: Vec<String>,
    pub passes_threshold: bool,
    pub validated_at: DateTime<Utc>,
}

impl QualityValidationResult {
    pub fn scores(&self) -> ScoreBreakdown {
        ScoreBreakdown {
            quality: self.quality_score,
            relevance: self.relevance_score,
            educational: self.educational_score,
        }
    }
}

/// Scores content and applies the quality gate
#[derive(Clone)]
pub struct QualityValidator {
    scorer: Arc<dyn ContentScorer>,
    thresholds: QualityThresholds,
}

impl std::fmt::Debug for QualityValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QualityValidator")
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

impl QualityValidator {
    /// Create a validator using the heuristic scorer; thresholds are validated here
    pub fn new(thresholds: QualityThresholds) -> Result<Self, GenerationError> {
        thresholds.validate()?;
        Ok(Self {
            scorer: Arc::new(HeuristicQualityScorer),
            thresholds,
        })
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn ContentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn thresholds(&self) -> &QualityThresholds {
        &self.thresholds
    }

    /// Score `content` and check it against the configured thresholds
    pub fn validate(
        &self,
        content_id: &str,
        raw_text: &str,
        content: &GeneratedContent,
        metadata: &ContentMetadata,
    ) -> QualityValidationResult {
        let scores = self.scorer.score(raw_text, content, metadata);
        let unmet = self.thresholds.unmet(&scores);
        let passes_threshold = unmet.is_empty();

        debug!(
            content_id = %content_id,
            content_type = %content.content_type(),
            overall = %scores.quality.overall,
            passes = %passes_threshold,
            unmet = ?unmet,
            "Content scored"
        );
        histogram!(
            "generation.quality.overall",
            scores.quality.overall,
            "content_type" => content.content_type().as_str()
        );
        if !passes_threshold {
            counter!("generation.quality.rejected", 1, "content_type" => content.content_type().as_str());
        }

        QualityValidationResult {
            content_id: content_id.to_string(),
            quality_score: scores.quality,
            relevance_score: scores.relevance,
            educational_score: scores.educational,
            feedback: feedback::generate_feedback(&scores),
            recommendations: feedback::generate_recommendations(&scores),
            passes_threshold,
            validated_at: Utc::now(),
        }
    }
}
