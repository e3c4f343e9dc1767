use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Categorical confidence tier reported by the vision facility for an expression.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Likelihood {
    VeryLikely,
    Likely,
    Possible,
    Unlikely,
    VeryUnlikely,
    #[default]
    Unknown,
}

impl Likelihood {
    /// Parses a label leniently (`VERY_LIKELY`, `very-likely` and `Very Likely` all match).
    /// Anything unrecognised is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "verylikely" => Self::VeryLikely,
            "likely" => Self::Likely,
            "possible" => Self::Possible,
            "unlikely" => Self::Unlikely,
            "veryunlikely" => Self::VeryUnlikely,
            _ => Self::Unknown,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::VeryLikely => "VERY_LIKELY",
            Self::Likely => "LIKELY",
            Self::Possible => "POSSIBLE",
            Self::Unlikely => "UNLIKELY",
            Self::VeryUnlikely => "VERY_UNLIKELY",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Fixed point value for the tier.
    pub const fn points(self) -> u8 {
        match self {
            Self::VeryLikely => 100,
            Self::Likely => 80,
            Self::Possible => 60,
            Self::Unlikely => 40,
            Self::VeryUnlikely => 10,
            Self::Unknown => 0,
        }
    }
}

impl From<String> for Likelihood {
    fn from(value: String) -> Self {
        Self::from_label(&value)
    }
}

impl From<Likelihood> for String {
    fn from(value: Likelihood) -> Self {
        value.label().to_string()
    }
}

/// Closed set of facial reference points the calculators know about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LandmarkKind {
    LeftEye,
    RightEye,
    LeftEyeTopBoundary,
    LeftEyeBottomBoundary,
    RightEyeTopBoundary,
    RightEyeBottomBoundary,
    NoseTip,
    UpperLip,
    LowerLip,
    MouthLeft,
    MouthRight,
    MouthCenter,
    ChinGnathion,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkPosition {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl LandmarkPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// Structured result for the first detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceDetection {
    #[serde(default)]
    pub joy_likelihood: Likelihood,
    #[serde(default)]
    pub anger_likelihood: Likelihood,
    /// Signed head roll in degrees.
    #[serde(default)]
    pub roll_angle: f64,
    #[serde(default)]
    pub landmarks: BTreeMap<LandmarkKind, LandmarkPosition>,
    #[serde(default)]
    pub detection_confidence: Option<f64>,
    #[serde(default)]
    pub landmarking_confidence: Option<f64>,
}

impl FaceDetection {
    pub fn new(joy_likelihood: Likelihood, anger_likelihood: Likelihood, roll_angle: f64) -> Self {
        Self {
            joy_likelihood,
            anger_likelihood,
            roll_angle,
            landmarks: BTreeMap::new(),
            detection_confidence: None,
            landmarking_confidence: None,
        }
    }

    pub fn with_landmark(mut self, kind: LandmarkKind, position: LandmarkPosition) -> Self {
        self.landmarks.insert(kind, position);
        self
    }

    pub fn with_confidences(mut self, detection: f64, landmarking: f64) -> Self {
        self.detection_confidence = Some(detection);
        self.landmarking_confidence = Some(landmarking);
        self
    }

    pub fn landmark(&self, kind: LandmarkKind) -> Option<&LandmarkPosition> {
        self.landmarks.get(&kind)
    }

    /// Absolute vertical distance between two landmarks, when both are present.
    pub fn vertical_gap(&self, a: LandmarkKind, b: LandmarkKind) -> Option<f64> {
        match (self.landmark(a), self.landmark(b)) {
            (Some(first), Some(second)) => Some((first.y - second.y).abs()),
            _ => None,
        }
    }
}
