use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::bounded;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType,
        Resolution as NokhwaResolution,
    },
};

use super::{
    camera::{CameraBackend, CameraDevice, CameraStream, StreamCallback, StreamEvent},
    rgba_converter,
};
use crate::{config::Resolution, error::CaptureError, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::MJPEG,
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::GRAY,
];

const TARGET_FRAME_RATE: u32 = 30;

/// Pause between frame reads after a failed one.
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);
/// How long reads may keep failing before the device counts as lost.
const LOST_AFTER: Duration = Duration::from_secs(2);

fn requested_formats(resolution: Resolution) -> [RequestedFormat<'static>; 4] {
    let target = NokhwaResolution::new(resolution.width, resolution.height);
    [
        RequestedFormat::with_formats(
            RequestedFormatType::Closest(CameraFormat::new(
                target,
                FrameFormat::MJPEG,
                TARGET_FRAME_RATE,
            )),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::HighestResolution(target),
            PREFERRED_PIXEL_FORMATS,
        ),
        // Fall back to any format Nokhwa can decode, but prefer higher FPS to
        // avoid very low default rates (e.g. 15 FPS) that some drivers reject.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Native camera access through nokhwa.
#[derive(Clone, Copy, Debug, Default)]
pub struct NokhwaBackend;

impl CameraBackend for NokhwaBackend {
    fn available_cameras(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        let cameras = query(ApiBackend::Auto)
            .map_err(|err| CaptureError::classify(format!("failed to enumerate cameras: {err}")))?;
        Ok(cameras
            .into_iter()
            .map(|info| CameraDevice::new(info.index().as_string(), info.human_name()))
            .collect())
    }

    fn start_stream(
        &self,
        device_id: Option<&str>,
        resolution: Resolution,
        on_event: StreamCallback,
    ) -> Result<Box<dyn CameraStream>, CaptureError> {
        let index = parse_index(device_id);
        let (opened_tx, opened_rx) = bounded::<Result<(), CaptureError>>(1);
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        // The camera handle is opened and used on the capture thread only; the
        // caller waits for the open result so failures surface synchronously.
        let handle = thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let camera = match build_camera(index, resolution) {
                    Ok(camera) => {
                        let _ = opened_tx.send(Ok(()));
                        camera
                    }
                    Err(err) => {
                        let _ = opened_tx.send(Err(CaptureError::classify(format!("{err:#}"))));
                        return;
                    }
                };
                run_capture_loop(camera, &stop_flag, on_event);
            })
            .map_err(|err| {
                CaptureError::DeviceUnavailable(format!("failed to spawn capture thread: {err}"))
            })?;

        let mut stream = NokhwaStream {
            stop,
            handle: Some(handle),
        };
        match opened_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(stream)),
            Ok(Err(err)) => {
                stream.stop();
                Err(err)
            }
            Err(_) => {
                stream.stop();
                Err(CaptureError::DeviceUnavailable(
                    "capture thread exited before the camera opened".into(),
                ))
            }
        }
    }
}

#[derive(Debug)]
struct NokhwaStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream for NokhwaStream {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("camera capture thread panicked");
            }
        }
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

fn parse_index(device_id: Option<&str>) -> CameraIndex {
    match device_id {
        None => CameraIndex::Index(0),
        Some(id) => id
            .parse::<u32>()
            .map(CameraIndex::Index)
            .unwrap_or_else(|_| CameraIndex::String(id.to_string())),
    }
}

fn build_camera(index: CameraIndex, resolution: Resolution) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(resolution) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => {
                    log::info!(
                        "opened camera {} at {:?}",
                        index.as_string(),
                        camera.camera_format()
                    );
                    return Ok(camera);
                }
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

fn run_capture_loop(mut camera: Camera, stop: &AtomicBool, mut on_event: StreamCallback) {
    let mut failures = ReadFailures::default();

    while !stop.load(Ordering::Relaxed) {
        let buffer = match camera.frame() {
            Ok(buffer) => {
                failures.clear();
                buffer
            }
            Err(err) => {
                match failures.record(Instant::now()) {
                    ReadVerdict::FirstFailure => {
                        log::warn!("camera frame read failed, retrying: {err:?}")
                    }
                    ReadVerdict::Retry => {}
                    ReadVerdict::Lost => {
                        log::error!("camera lost after {LOST_AFTER:?} of failed reads: {err:?}");
                        on_event(StreamEvent::Lost(CaptureError::classify(format!(
                            "camera stopped delivering frames: {err}"
                        ))));
                        break;
                    }
                }
                thread::sleep(READ_RETRY_DELAY);
                continue;
            }
        };

        match rgba_converter::convert_camera_frame(&buffer) {
            Ok(converted) => on_event(StreamEvent::Frame(Frame::new(
                converted.rgba,
                converted.width,
                converted.height,
            ))),
            Err(err) => log::warn!("failed to decode camera frame: {err:?}"),
        }
    }

    if let Err(err) = camera.stop_stream() {
        log::warn!("failed to stop camera stream cleanly: {err:?}");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ReadVerdict {
    FirstFailure,
    Retry,
    Lost,
}

/// Tracks an unbroken run of failed frame reads.
#[derive(Debug, Default)]
struct ReadFailures {
    since: Option<Instant>,
}

impl ReadFailures {
    fn record(&mut self, now: Instant) -> ReadVerdict {
        match self.since {
            None => {
                self.since = Some(now);
                ReadVerdict::FirstFailure
            }
            Some(since) if now.saturating_duration_since(since) >= LOST_AFTER => ReadVerdict::Lost,
            Some(_) => ReadVerdict::Retry,
        }
    }

    fn clear(&mut self) {
        self.since = None;
    }
}
