//! Tests for scoring and the quality gate on realistic stories

#[cfg(test)]
mod tests {
    use crate::quality::{
        ContentMetadata, ContentType, GeneratedContent, QualityDimension, QualityThresholds,
        QualityValidationResult, QualityValidator,
    };
    use crate::tests::fixtures::{BAD_STORY, GOOD_STORY};

    fn validate_with(thresholds: QualityThresholds, raw: &str, metadata: &ContentMetadata) -> QualityValidationResult {
        let validator = QualityValidator::new(thresholds).unwrap();
        let content = GeneratedContent::parse(ContentType::StoryContent, raw);
        validator.validate("content-1", raw, &content, metadata)
    }

    fn validate(raw: &str) -> QualityValidationResult {
        validate_with(QualityThresholds::default(), raw, &ContentMetadata::default())
    }

    #[test]
    fn test_good_story_passes_default_gate() {
        let result = validate(GOOD_STORY);

        assert!(result.passes_threshold);
        assert_eq!(result.content_id, "content-1");
        assert_eq!(result.quality_score.overall, 8.5);
        assert_eq!(result.quality_score.age_appropriateness, 10.0);
        assert!(result.quality_score.coherence >= 8.0);
    }

    #[test]
    fn test_bad_story_fails_with_recommendations() {
        let result = validate(BAD_STORY);

        assert!(!result.passes_threshold);
        assert!(result.quality_score.overall < 6.0);
        assert!(!result.feedback.is_empty());
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let first = validate(GOOD_STORY);
        let second = validate(GOOD_STORY);

        assert_eq!(first.quality_score, second.quality_score);
        assert_eq!(first.educational_score, second.educational_score);
        assert_eq!(first.feedback, second.feedback);
        assert_eq!(first.recommendations, second.recommendations);
    }

    #[test]
    fn test_coherence_minimum_flips_at_the_score() {
        let coherence = validate(GOOD_STORY).quality_score.coherence;

        let at_score = QualityThresholds {
            minimum_coherence: coherence,
            ..QualityThresholds::default()
        };
        let above_score = QualityThresholds {
            minimum_coherence: (coherence + 0.1).min(10.0),
            ..QualityThresholds::default()
        };

        let metadata = ContentMetadata::default();
        assert!(validate_with(at_score, GOOD_STORY, &metadata).passes_threshold);
        assert!(!validate_with(above_score, GOOD_STORY, &metadata).passes_threshold);
    }

    #[test]
    fn test_overall_minimum_flips_at_the_score() {
        let overall = validate(GOOD_STORY).quality_score.overall;
        let metadata = ContentMetadata::default();

        let at_score = QualityThresholds {
            minimum_overall: overall,
            ..QualityThresholds::default()
        };
        let above_score = QualityThresholds {
            minimum_overall: overall + 0.1,
            ..QualityThresholds::default()
        };

        assert!(validate_with(at_score, GOOD_STORY, &metadata).passes_threshold);
        assert!(!validate_with(above_score, GOOD_STORY, &metadata).passes_threshold);
    }

    #[test]
    fn test_required_category_must_reach_minimum_overall() {
        let result = validate(BAD_STORY);
        let character = result.quality_score.character_development;
        assert!(character < 6.0);

        let thresholds = QualityThresholds {
            minimum_overall: 0.0,
            minimum_educational: 0.0,
            minimum_age_appropriate: 0.0,
            minimum_coherence: 0.0,
            required_categories: vec![QualityDimension::CharacterDevelopment],
        };
        assert!(validate_with(thresholds.clone(), BAD_STORY, &ContentMetadata::default()).passes_threshold);

        let strict = QualityThresholds {
            minimum_overall: character + 0.5,
            ..thresholds
        };
        // overall is well above the required category on its own
        let strict_result = validate_with(strict.clone(), BAD_STORY, &ContentMetadata::default());
        assert!(strict_result.quality_score.overall >= strict.minimum_overall);
        assert!(!strict_result.passes_threshold);
    }

    #[test]
    fn test_educational_goals_drive_learning_objectives() {
        let metadata = ContentMetadata {
            educational_goals: vec!["learn about the stars".to_string(), "teamwork".to_string()],
            ..ContentMetadata::default()
        };

        let result = validate_with(QualityThresholds::default(), GOOD_STORY, &metadata);
        assert_eq!(result.educational_score.learning_objectives, 6.0);
        assert!(result.passes_threshold);

        let without_goals = validate(GOOD_STORY);
        assert_eq!(without_goals.educational_score.learning_objectives, 5.0);
    }

    #[test]
    fn test_themes_raise_relevance() {
        let on_theme = ContentMetadata {
            themes: vec!["stars".to_string(), "friendship".to_string()],
            genre: Some("adventure".to_string()),
            ..ContentMetadata::default()
        };
        let off_theme = ContentMetadata {
            themes: vec!["dinosaurs".to_string(), "volcanoes".to_string()],
            genre: Some("adventure".to_string()),
            ..ContentMetadata::default()
        };

        let on = validate_with(QualityThresholds::default(), GOOD_STORY, &on_theme);
        let off = validate_with(QualityThresholds::default(), GOOD_STORY, &off_theme);
        assert!(on.relevance_score.theme_alignment > off.relevance_score.theme_alignment);
    }

    #[test]
    fn test_outline_json_is_scored_on_its_text() {
        let raw = r#"```json
{
  "title": "Luna and the Lantern of Stars",
  "summary": "A curious girl named Luna finds a magical lantern and learns the names of the stars with her friend Theo.",
  "chapters": [
    {"title": "The Attic", "summary": "Luna discovers an ancient lantern in the attic of her grandmother."},
    {"title": "The Hill", "summary": "Together Luna and Theo climb the hill and the stars begin to whisper."}
  ],
  "characters": [
    {"name": "Luna", "description": "A brave and curious girl who loves the night sky."},
    {"name": "Theo", "description": "Her worried but loyal friend."}
  ]
}
```"#;
        let content = GeneratedContent::parse(ContentType::StoryOutline, raw);
        assert_eq!(content.title(), "Luna and the Lantern of Stars");
        assert_eq!(content.chapter_count(), 2);

        let validator = QualityValidator::new(QualityThresholds::default()).unwrap();
        let result = validator.validate("outline-1", raw, &content, &ContentMetadata::default());
        assert!(result.quality_score.overall > 0.0);
        assert!(result.quality_score.overall <= 10.0);
    }
}
