use thiserror::Error;

/// Why a capture stream could not be started.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera cannot satisfy the requested format: {0}")]
    Constraint(String),
}

impl CaptureError {
    /// Best-effort classification of a backend error message.
    pub fn classify(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
        {
            CaptureError::PermissionDenied(message)
        } else if lower.contains("format")
            || lower.contains("resolution")
            || lower.contains("frame rate")
            || lower.contains("constraint")
        {
            CaptureError::Constraint(message)
        } else {
            CaptureError::DeviceUnavailable(message)
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    /// The model could not be loaded; no landmarks will be produced.
    #[error("hand detector unavailable: {0}")]
    Unavailable(String),
    /// A single frame could not be processed.
    #[error("hand detection failed: {0}")]
    Failed(String),
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("max hands must be within 1..=5, got {0}")]
    MaxHands(u8),
    #[error("model complexity must be 0, 1 or 2, got {0}")]
    ModelComplexity(u8),
    #[error("{name} must be within 0.05..=0.95, got {value}")]
    Confidence { name: &'static str, value: f32 },
    #[error("resolution must be non-zero, got {width}x{height}")]
    Resolution { width: u32, height: u32 },
}
