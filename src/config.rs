use std::fmt;

use crate::error::ConfigError;

pub const MAX_HANDS_RANGE: (u8, u8) = (1, 5);
pub const CONFIDENCE_RANGE: (f32, f32) = (0.05, 0.95);
pub const CONFIDENCE_STEP: f32 = 0.05;
pub const MODEL_COMPLEXITY_LEVELS: [u8; 3] = [0, 1, 2];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const VGA: Resolution = Resolution::new(640, 480);
    pub const HD: Resolution = Resolution::new(1280, 720);
    pub const FULL_HD: Resolution = Resolution::new(1920, 1080);

    pub const PRESETS: [Resolution; 3] = [Self::VGA, Self::HD, Self::FULL_HD];

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// The subset of [`DetectionOptions`] that configures the landmark model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InferenceOptions {
    pub max_hands: u8,
    pub model_complexity: u8,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        DetectionOptions::default().inference()
    }
}

/// User-tunable detection and capture settings.
///
/// The controller owns the only live copy; every change goes through
/// `PipelineController::set_options`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectionOptions {
    pub max_hands: u8,
    pub model_complexity: u8,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub resolution: Resolution,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self {
            max_hands: 1,
            model_complexity: 0,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.6,
            resolution: Resolution::VGA,
        }
    }
}

impl DetectionOptions {
    pub fn inference(&self) -> InferenceOptions {
        InferenceOptions {
            max_hands: self.max_hands,
            model_complexity: self.model_complexity,
            min_detection_confidence: self.min_detection_confidence,
            min_tracking_confidence: self.min_tracking_confidence,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MAX_HANDS_RANGE.0..=MAX_HANDS_RANGE.1).contains(&self.max_hands) {
            return Err(ConfigError::MaxHands(self.max_hands));
        }
        if !MODEL_COMPLEXITY_LEVELS.contains(&self.model_complexity) {
            return Err(ConfigError::ModelComplexity(self.model_complexity));
        }
        check_confidence("min detection confidence", self.min_detection_confidence)?;
        check_confidence("min tracking confidence", self.min_tracking_confidence)?;
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Resolution {
                width: self.resolution.width,
                height: self.resolution.height,
            });
        }
        Ok(())
    }

    /// Moves a confidence value by `steps` slider increments, staying in range.
    pub fn step_confidence(value: f32, steps: i32) -> f32 {
        let next = value + steps as f32 * CONFIDENCE_STEP;
        // Snap to the slider grid so repeated steps don't accumulate float drift.
        let snapped = (next / CONFIDENCE_STEP).round() * CONFIDENCE_STEP;
        snapped.clamp(CONFIDENCE_RANGE.0, CONFIDENCE_RANGE.1)
    }
}

pub fn model_complexity_label(level: u8) -> &'static str {
    match level {
        0 => "0 (fast)",
        1 => "1",
        _ => "2 (accurate)",
    }
}

fn check_confidence(name: &'static str, value: f32) -> Result<(), ConfigError> {
    // Tolerate the float error a 0.05-step slider produces at the bounds.
    let eps = 1e-4;
    if value.is_finite() && value >= CONFIDENCE_RANGE.0 - eps && value <= CONFIDENCE_RANGE.1 + eps {
        Ok(())
    } else {
        Err(ConfigError::Confidence { name, value })
    }
}
