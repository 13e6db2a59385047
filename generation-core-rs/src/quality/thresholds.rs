//! Configurable quality gate

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

use super::scorer::{QualityDimension, ScoreBreakdown};

/// Minimum scores content must reach to pass the quality gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub minimum_overall: f64,
    pub minimum_educational: f64,
    pub minimum_age_appropriate: f64,
    pub minimum_coherence: f64,
    /// Dimensions that must each reach `minimum_overall` on their own
    pub required_categories: Vec<QualityDimension>,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            minimum_overall: 6.0,
            minimum_educational: 5.0,
            minimum_age_appropriate: 7.0,
            minimum_coherence: 5.0,
            required_categories: Vec::new(),
        }
    }
}

impl QualityThresholds {
    /// Every minimum must lie within [0, 10]
    pub fn validate(&self) -> Result<(), GenerationError> {
        let checks = [
            ("minimum_overall", self.minimum_overall),
            ("minimum_educational", self.minimum_educational),
            ("minimum_age_appropriate", self.minimum_age_appropriate),
            ("minimum_coherence", self.minimum_coherence),
        ];
        for (name, value) in checks {
            if !(0.0..=10.0).contains(&value) {
                return Err(GenerationError::configuration(format!(
                    "quality.{} must be within [0, 10], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    /// Whether all configured minimums are met
    pub fn evaluate(&self, scores: &ScoreBreakdown) -> bool {
        self.unmet(scores).is_empty()
    }

    /// Names of the minimums `scores` falls short of, in check order
    pub fn unmet(&self, scores: &ScoreBreakdown) -> Vec<String> {
        let quality = &scores.quality;
        let mut unmet = Vec::new();

        if quality.overall < self.minimum_overall {
            unmet.push("overall".to_string());
        }
        if scores.educational.overall < self.minimum_educational {
            unmet.push("educational".to_string());
        }
        if quality.age_appropriateness < self.minimum_age_appropriate {
            unmet.push("age_appropriate".to_string());
        }
        if quality.coherence < self.minimum_coherence {
            unmet.push("coherence".to_string());
        }
        for category in &self.required_categories {
            if quality.dimension(*category) < self.minimum_overall {
                unmet.push(category.to_string());
            }
        }
        unmet
    }
}
