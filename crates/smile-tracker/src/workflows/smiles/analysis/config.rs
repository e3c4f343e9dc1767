use serde::{Deserialize, Serialize};

/// Switches between the basic formulas and the squint-augmented, confidence-weighted ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Derive an eye-squint signal from eyelid landmarks and blend it into
    /// eye-brilliance and confidence.
    pub squint_bonus: bool,
    /// Scale the weighted sum by the mean of the detection and landmarking confidences.
    pub confidence_adjustment: bool,
}

impl AnalysisConfig {
    pub const fn extended() -> Self {
        Self {
            squint_bonus: true,
            confidence_adjustment: true,
        }
    }

    pub const fn basic() -> Self {
        Self {
            squint_bonus: false,
            confidence_adjustment: false,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self::extended()
    }
}
