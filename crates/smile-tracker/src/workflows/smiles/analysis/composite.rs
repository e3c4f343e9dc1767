use serde::{Deserialize, Serialize};

use super::super::domain::ScoreDetail;
use super::detection::FaceDetection;

pub(crate) const HAPPINESS_WEIGHT: f64 = 0.4;
pub(crate) const EYE_BRILLIANCE_WEIGHT: f64 = 0.3;
pub(crate) const CONFIDENCE_WEIGHT: f64 = 0.15;
pub(crate) const WARMTH_WEIGHT: f64 = 0.1;
pub(crate) const ENERGY_WEIGHT: f64 = 0.05;

const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.5;

pub const FALLBACK_FEEDBACK: &str = "Another lovely smile today!";

/// Sub-score categories, in the order used to break ties when picking feedback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    Happiness,
    EyeBrilliance,
    Confidence,
    Warmth,
    Energy,
}

impl FeedbackCategory {
    pub const fn message(self) -> &'static str {
        match self {
            Self::Happiness => "Pure happiness is shining through your whole expression!",
            Self::EyeBrilliance => {
                "Your eyes are sparkling today. That is a smile from the heart!"
            }
            Self::Confidence => "A confident, composed smile. You look ready for anything!",
            Self::Warmth => "Such a warm, gentle smile. It puts everyone around you at ease.",
            Self::Energy => "Full of energy! Your smile lifts the mood of the whole room.",
        }
    }
}

pub(crate) fn categorized(detail: &ScoreDetail) -> [(FeedbackCategory, u8); 5] {
    [
        (FeedbackCategory::Happiness, detail.happiness),
        (FeedbackCategory::EyeBrilliance, detail.eye_brilliance),
        (FeedbackCategory::Confidence, detail.confidence),
        (FeedbackCategory::Warmth, detail.warmth),
        (FeedbackCategory::Energy, detail.energy_level),
    ]
}

pub(crate) fn weighted_sum(detail: &ScoreDetail) -> f64 {
    f64::from(detail.happiness) * HAPPINESS_WEIGHT
        + f64::from(detail.eye_brilliance) * EYE_BRILLIANCE_WEIGHT
        + f64::from(detail.confidence) * CONFIDENCE_WEIGHT
        + f64::from(detail.warmth) * WARMTH_WEIGHT
        + f64::from(detail.energy_level) * ENERGY_WEIGHT
}

/// Mean of the detection and landmarking confidences; a missing or non-finite input counts
/// as 0.5 and values are clamped to 0..=1.
pub(crate) fn confidence_factor(detection: &FaceDetection) -> f64 {
    let sanitize = |value: Option<f64>| {
        value
            .filter(|v| v.is_finite())
            .map_or(DEFAULT_DETECTION_CONFIDENCE, |v| v.clamp(0.0, 1.0))
    };

    (sanitize(detection.detection_confidence) + sanitize(detection.landmarking_confidence)) / 2.0
}

pub(crate) fn overall_score(weighted: f64, factor: Option<f64>) -> u8 {
    let adjusted = weighted * factor.unwrap_or(1.0);
    adjusted.round().clamp(0.0, 100.0) as u8
}

/// Category with the strictly highest score; the earliest entry wins ties.
pub(crate) fn dominant(scores: &[(FeedbackCategory, u8)]) -> Option<FeedbackCategory> {
    let mut best: Option<(FeedbackCategory, u8)> = None;
    for &(category, score) in scores {
        match best {
            Some((_, top)) if score <= top => {}
            _ => best = Some((category, score)),
        }
    }
    best.map(|(category, _)| category)
}

pub(crate) fn feedback_for(category: Option<FeedbackCategory>) -> &'static str {
    category.map_or(FALLBACK_FEEDBACK, FeedbackCategory::message)
}
