use super::detection::{FaceDetection, LandmarkKind};

const NEUTRAL_SCORE: f64 = 50.0;
const FAINT_JOY_CEILING: u8 = 60;
const SQUINT_BONUS_THRESHOLD: f64 = 50.0;
const SQUINT_BONUS_RATE: f64 = 0.4;
const CONFIDENCE_BASE_WEIGHT: f64 = 0.8;
const CONFIDENCE_SQUINT_WEIGHT: f64 = 0.2;

/// Eye-squint input for eye-brilliance and confidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum SquintSignal {
    /// Squint-augmented formulas are switched off.
    Disabled,
    /// Enabled, but no eyelid landmarks were reported.
    Absent,
    Measured(f64),
}

impl SquintSignal {
    pub(crate) fn from_detection(detection: &FaceDetection, enabled: bool) -> Self {
        if !enabled {
            return Self::Disabled;
        }
        eye_squint(detection).map_or(Self::Absent, Self::Measured)
    }
}

/// `100 - aperture * 10` clamped to 0..=100, where aperture is the mean eyelid
/// separation over whichever eyes have both boundaries.
pub(crate) fn eye_squint(detection: &FaceDetection) -> Option<f64> {
    let apertures: Vec<f64> = [
        detection.vertical_gap(
            LandmarkKind::LeftEyeTopBoundary,
            LandmarkKind::LeftEyeBottomBoundary,
        ),
        detection.vertical_gap(
            LandmarkKind::RightEyeTopBoundary,
            LandmarkKind::RightEyeBottomBoundary,
        ),
    ]
    .into_iter()
    .flatten()
    .collect();

    if apertures.is_empty() {
        return None;
    }

    let aperture = apertures.iter().sum::<f64>() / apertures.len() as f64;
    Some((100.0 - aperture * 10.0).clamp(0.0, 100.0))
}

pub(crate) fn happiness(detection: &FaceDetection) -> u8 {
    detection.joy_likelihood.points()
}

/// Faint smiles do not reach the eyes: joy at or below 60 counts half.
pub(crate) fn eye_brilliance(detection: &FaceDetection, squint: SquintSignal) -> u8 {
    let joy = detection.joy_likelihood.points();
    let mut score = if joy <= FAINT_JOY_CEILING {
        f64::from(joy) / 2.0
    } else {
        f64::from(joy)
    };

    if let SquintSignal::Measured(squint) = squint {
        if squint > SQUINT_BONUS_THRESHOLD {
            score += (squint - SQUINT_BONUS_THRESHOLD) * SQUINT_BONUS_RATE;
        }
    }

    to_score(score)
}

/// Head roll and mouth-corner symmetry, optionally blended with the squint signal.
pub(crate) fn confidence(detection: &FaceDetection, squint: SquintSignal) -> u8 {
    if detection.landmarks.is_empty() {
        return NEUTRAL_SCORE as u8;
    }

    let angle = 100.0 - detection.roll_angle.abs() * 5.0;
    let base = match detection.vertical_gap(LandmarkKind::MouthLeft, LandmarkKind::MouthRight) {
        Some(gap) => (angle + (100.0 - gap * 10.0)) / 2.0,
        None => angle,
    };

    let blended = match squint {
        SquintSignal::Disabled => base,
        SquintSignal::Absent => base * CONFIDENCE_BASE_WEIGHT,
        SquintSignal::Measured(squint) => {
            base * CONFIDENCE_BASE_WEIGHT + squint * CONFIDENCE_SQUINT_WEIGHT
        }
    };

    to_score(blended)
}

/// Calm joy: joy minus half of anger, never negative.
pub(crate) fn warmth(detection: &FaceDetection) -> u8 {
    let joy = i16::from(detection.joy_likelihood.points());
    let anger = i16::from(detection.anger_likelihood.points());
    (joy - anger / 2).clamp(0, 100) as u8
}

/// Mouth opening between the lip landmarks, five points per unit, capped at 100.
pub(crate) fn energy_level(detection: &FaceDetection) -> u8 {
    match detection.vertical_gap(LandmarkKind::UpperLip, LandmarkKind::LowerLip) {
        Some(distance) => to_score(distance * 5.0),
        None => NEUTRAL_SCORE as u8,
    }
}

fn to_score(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
