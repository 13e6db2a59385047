//! Fixed-rule feedback and recommendations derived from scores

use super::scorer::{QualityDimension, ScoreBreakdown};

/// Dimensions below this score get feedback
pub const FEEDBACK_THRESHOLD: f64 = 6.0;
/// Age appropriateness is held to a stricter bar
pub const AGE_FEEDBACK_THRESHOLD: f64 = 7.0;
/// Relevance sub-scores below this get feedback
pub const RELEVANCE_FEEDBACK_THRESHOLD: f64 = 5.0;

fn below(scores: &ScoreBreakdown, dimension: QualityDimension) -> bool {
    let threshold = match dimension {
        QualityDimension::AgeAppropriateness => AGE_FEEDBACK_THRESHOLD,
        _ => FEEDBACK_THRESHOLD,
    };
    scores.quality.dimension(dimension) < threshold
}

/// What is wrong with the content, one line per weak dimension
pub fn generate_feedback(scores: &ScoreBreakdown) -> Vec<String> {
    let mut feedback: Vec<String> = QualityDimension::ALL
        .iter()
        .filter(|d| below(scores, **d))
        .map(|d| dimension_feedback(*d).to_string())
        .collect();

    if scores.relevance.theme_alignment < RELEVANCE_FEEDBACK_THRESHOLD {
        feedback.push("The story drifts away from the requested themes.".to_string());
    }
    if scores.relevance.keyword_presence < RELEVANCE_FEEDBACK_THRESHOLD {
        feedback.push("Several requested keywords never appear in the story.".to_string());
    }
    feedback
}

/// How to fix it, one action per weak dimension
pub fn generate_recommendations(scores: &ScoreBreakdown) -> Vec<String> {
    let mut recommendations: Vec<String> = QualityDimension::ALL
        .iter()
        .filter(|d| below(scores, **d))
        .map(|d| dimension_recommendation(*d).to_string())
        .collect();

    if scores.relevance.overall < RELEVANCE_FEEDBACK_THRESHOLD {
        recommendations.push("Restate the requested themes and keywords in the generation prompt.".to_string());
    }
    recommendations
}

fn dimension_feedback(dimension: QualityDimension) -> &'static str {
    match dimension {
        QualityDimension::Coherence => "The story's flow is hard to follow between events.",
        QualityDimension::Creativity => "The writing feels generic and predictable.",
        QualityDimension::Engagement => "The story lacks moments that hold a young reader's attention.",
        QualityDimension::EducationalValue => "The educational message is weak or missing.",
        QualityDimension::AgeAppropriateness => "Some words or themes may not suit the target age.",
        QualityDimension::LanguageQuality => "Sentence construction is uneven or repetitive.",
        QualityDimension::StoryStructure => "The story lacks a clear beginning and ending.",
        QualityDimension::CharacterDevelopment => "Characters feel flat and hard to tell apart.",
    }
}

fn dimension_recommendation(dimension: QualityDimension) -> &'static str {
    match dimension {
        QualityDimension::Coherence => "Link scenes with transitions such as 'then', 'later' or 'finally'.",
        QualityDimension::Creativity => "Add vivid descriptions and less common word choices.",
        QualityDimension::Engagement => "Include dialogue and moments where characters show emotion.",
        QualityDimension::EducationalValue => "Weave the learning goals into what the characters discover.",
        QualityDimension::AgeAppropriateness => "Remove mature vocabulary and keep sentences short.",
        QualityDimension::LanguageQuality => "Vary sentence length and avoid repeated words.",
        QualityDimension::StoryStructure => "Open with a clear setup and close with a resolution.",
        QualityDimension::CharacterDevelopment => "Give each named character feelings and a goal.",
    }
}

/// Append `items` to `acc`, skipping entries already present
pub fn merge_unique(acc: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !acc.contains(item) {
            acc.push(item.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality::scorer::{ContentRelevanceScore, EducationalValueScore, QualityScore};

    fn scores(coherence: f64, rest: f64) -> ScoreBreakdown {
        ScoreBreakdown {
            quality: QualityScore::from_dimensions(coherence, rest, rest, rest, rest, rest, rest, rest),
            relevance: ContentRelevanceScore {
                theme_alignment: 8.0,
                genre_consistency: 8.0,
                keyword_presence: 8.0,
                overall: 8.0,
            },
            educational: EducationalValueScore {
                learning_objectives: rest,
                skill_development: rest,
                knowledge_transfer: rest,
                overall: rest,
            },
        }
    }

    #[test]
    fn test_only_weak_dimensions_get_feedback() {
        let feedback = generate_feedback(&scores(4.0, 9.0));
        assert_eq!(feedback, vec![dimension_feedback(QualityDimension::Coherence).to_string()]);
        assert!(generate_feedback(&scores(9.0, 9.0)).is_empty());
        assert!(generate_recommendations(&scores(9.0, 9.0)).is_empty());
    }

    #[test]
    fn test_age_uses_stricter_bar() {
        let mut s = scores(9.0, 9.0);
        s.quality.age_appropriateness = 6.5;
        assert_eq!(generate_recommendations(&s).len(), 1);
    }

    #[test]
    fn test_merge_unique_preserves_order() {
        let mut acc = vec!["a".to_string(), "b".to_string()];
        merge_unique(&mut acc, &["b".to_string(), "c".to_string(), "a".to_string()]);
        assert_eq!(acc, vec!["a", "b", "c"]);
    }
}
