use crate::{config::Resolution, error::CaptureError, types::Frame};

/// What a running stream delivers to its callback, on the capture thread.
#[derive(Debug)]
pub enum StreamEvent {
    Frame(Frame),
    /// The device stopped producing frames (unplugged, revoked). Nothing
    /// follows this event.
    Lost(CaptureError),
}

pub type StreamCallback = Box<dyn FnMut(StreamEvent) + Send + 'static>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CameraDevice {
    /// Opaque identifier understood by the backend that enumerated it.
    pub id: String,
    pub label: String,
}

impl CameraDevice {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }

    pub fn display_label(&self) -> String {
        if self.label.trim().is_empty() {
            format!("Camera {}", self.id)
        } else {
            self.label.clone()
        }
    }
}

/// A live capture stream. Implementations stop on drop as well, so a stream
/// that is discarded without an explicit `stop` still releases the device.
pub trait CameraStream: Send {
    /// Stops frame delivery and releases the device. Calling it again is a no-op.
    /// No frame callback runs after this returns.
    fn stop(&mut self);
}

/// Camera enumeration and stream start-up.
pub trait CameraBackend: Send + Sync + 'static {
    fn available_cameras(&self) -> Result<Vec<CameraDevice>, CaptureError>;

    /// Opens `device_id` (or the system default when `None`) near `resolution`
    /// and starts delivering frames to `on_event`. May block while the device
    /// negotiates; callers run it off the event loop.
    fn start_stream(
        &self,
        device_id: Option<&str>,
        resolution: Resolution,
        on_event: StreamCallback,
    ) -> Result<Box<dyn CameraStream>, CaptureError>;
}

#[cfg(feature = "camera-nokhwa")]
pub use super::nokhwa_camera::NokhwaBackend;
