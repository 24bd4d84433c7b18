pub mod camera;
pub mod controller;
pub mod fps;
pub mod overlay;
pub mod recognizer;
pub mod skeleton;

#[cfg(feature = "camera-nokhwa")]
mod nokhwa_camera;
#[cfg(feature = "camera-nokhwa")]
pub mod rgba_converter;

// Re-exports for convenience
pub use camera::{CameraBackend, CameraDevice, CameraStream, StreamCallback, StreamEvent};
#[cfg(feature = "camera-nokhwa")]
pub use camera::NokhwaBackend;
pub use controller::{DetectorStatus, PipelineController, PipelineState, SessionState};
pub use fps::FrameRateTracker;
pub use overlay::{OverlayRenderer, RenderStats};
pub use recognizer::{
    InferenceRequest, InferenceResponse, InferenceWorker, LandmarkBackend, LandmarkSource,
    WorkerEvent,
};
#[cfg(feature = "onnx")]
pub use recognizer::{ModelPaths, OnnxLandmarkBackend};
