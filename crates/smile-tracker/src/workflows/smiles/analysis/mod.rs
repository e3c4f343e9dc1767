mod composite;
mod config;
pub mod detection;
mod features;

pub use composite::{FeedbackCategory, FALLBACK_FEEDBACK};
pub use config::AnalysisConfig;
pub use detection::{FaceDetection, LandmarkKind, LandmarkPosition, Likelihood};

use super::domain::ScoreDetail;
use features::SquintSignal;
use serde::Serialize;

/// Stateless scorer turning one face detection into sub-scores, an overall score and feedback.
#[derive(Debug, Clone, Default)]
pub struct SmileAnalyzer {
    config: AnalysisConfig,
}

impl SmileAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> AnalysisConfig {
        self.config
    }

    pub fn analyze(&self, detection: &FaceDetection) -> SmileAnalysis {
        let squint = SquintSignal::from_detection(detection, self.config.squint_bonus);

        let detail = ScoreDetail {
            happiness: features::happiness(detection),
            eye_brilliance: features::eye_brilliance(detection, squint),
            confidence: features::confidence(detection, squint),
            warmth: features::warmth(detection),
            energy_level: features::energy_level(detection),
        };

        let weighted_score = composite::weighted_sum(&detail);
        let confidence_factor = self
            .config
            .confidence_adjustment
            .then(|| composite::confidence_factor(detection));
        let overall_score = composite::overall_score(weighted_score, confidence_factor);

        let feedback_category = composite::dominant(&composite::categorized(&detail));

        SmileAnalysis {
            detail,
            weighted_score,
            confidence_factor,
            overall_score,
            feedback_category,
            feedback: composite::feedback_for(feedback_category).to_string(),
        }
    }
}

/// Scored result for a single detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SmileAnalysis {
    pub detail: ScoreDetail,
    /// Weighted sum before any confidence adjustment.
    pub weighted_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence_factor: Option<f64>,
    pub overall_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_category: Option<FeedbackCategory>,
    pub feedback: String,
}
