//! Live hand tracking: camera capture, landmark inference, gesture
//! classification and a mirrored skeleton overlay, driven by
//! [`PipelineController`].

pub mod config;
pub mod error;
pub mod gesture;
#[cfg(feature = "onnx")]
pub mod model_download;
pub mod pipeline;
pub mod types;
#[cfg(feature = "ui")]
pub mod ui;

pub use config::{DetectionOptions, InferenceOptions, Resolution};
pub use error::{CaptureError, ConfigError, InferenceError};
pub use pipeline::{PipelineController, PipelineState, SessionState};
pub use types::{Frame, GestureKind, GestureResult, Hand, Handedness, Landmark};
