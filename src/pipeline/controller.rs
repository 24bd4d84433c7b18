use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use image::RgbaImage;

use super::{
    camera::{CameraBackend, CameraDevice, CameraStream, StreamCallback, StreamEvent},
    fps::FrameRateTracker,
    overlay::OverlayRenderer,
    recognizer::{InferenceRequest, InferenceResponse, InferenceWorker, LandmarkBackend, WorkerEvent},
};
use crate::{
    config::DetectionOptions,
    error::{CaptureError, ConfigError},
    gesture,
    types::{Frame, GestureResult, Hand},
};

/// How long shutdown waits for an in-flight capture start to report back.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Starting { device_id: String },
    Running { device_id: String },
    Restarting { device_id: String },
    Stopped { error: CaptureError },
}

impl PipelineState {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            PipelineState::Starting { device_id }
            | PipelineState::Running { device_id }
            | PipelineState::Restarting { device_id } => Some(device_id),
            PipelineState::Idle | PipelineState::Stopped { .. } => None,
        }
    }

    fn is_active(&self) -> bool {
        self.device_id().is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DetectorStatus {
    #[default]
    Loading,
    Ready,
    Unavailable(String),
}

/// Snapshot of what the status bar shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionState {
    pub running: bool,
    pub fps: u32,
    pub selected_device_id: Option<String>,
    pub detector: DetectorStatus,
    pub last_error: Option<CaptureError>,
}

impl SessionState {
    pub fn camera_text(&self) -> &'static str {
        if self.running {
            "Camera: active"
        } else {
            "Camera: inactive"
        }
    }

    pub fn fps_text(&self) -> String {
        format!("FPS: {}", self.fps)
    }

    pub fn detector_text(&self) -> String {
        match &self.detector {
            DetectorStatus::Loading => "Detector: loading".to_string(),
            DetectorStatus::Ready => "Detector: ready".to_string(),
            DetectorStatus::Unavailable(reason) => format!("Detector unavailable: {reason}"),
        }
    }
}

struct CaptureOutcome {
    generation: u64,
    device_id: String,
    result: Result<Box<dyn CameraStream>, CaptureError>,
}

struct TaggedFrame {
    generation: u64,
    frame: Frame,
}

struct StreamLost {
    generation: u64,
    error: CaptureError,
}

/// Owns the capture stream, the inference binding and the per-frame state.
///
/// All pipeline logic runs on the thread that calls [`pump`](Self::pump);
/// capture start-up and inference report back over channels and are applied
/// one event at a time. Every capture start gets a new generation number and
/// anything tagged with an older generation is dropped on arrival.
pub struct PipelineController {
    options: DetectionOptions,
    camera: Arc<dyn CameraBackend>,
    landmarks: Arc<dyn LandmarkBackend>,

    state: PipelineState,
    cameras: Vec<CameraDevice>,
    selected_device: Option<String>,
    enumerated: bool,
    last_error: Option<CaptureError>,

    generation: u64,
    start_in_flight: bool,
    restart_pending: bool,
    stream: Option<Box<dyn CameraStream>>,

    binding_seq: u64,
    worker: Option<InferenceWorker>,
    detector: DetectorStatus,
    pending_request: Option<InferenceRequest>,

    outcome_tx: Sender<CaptureOutcome>,
    outcome_rx: Receiver<CaptureOutcome>,
    event_tx: Sender<WorkerEvent>,
    event_rx: Receiver<WorkerEvent>,
    frame_tx: Sender<TaggedFrame>,
    frame_rx: Receiver<TaggedFrame>,
    lost_tx: Sender<StreamLost>,
    lost_rx: Receiver<StreamLost>,

    renderer: OverlayRenderer,
    canvas: RgbaImage,
    hands: Vec<Hand>,
    gestures: Vec<GestureResult>,
    fps: FrameRateTracker,
}

impl PipelineController {
    pub fn new(
        camera: Arc<dyn CameraBackend>,
        landmarks: Arc<dyn LandmarkBackend>,
        options: DetectionOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;

        let (outcome_tx, outcome_rx) = unbounded();
        let (event_tx, event_rx) = unbounded();
        let (frame_tx, frame_rx) = bounded(1);
        let (lost_tx, lost_rx) = unbounded();

        Ok(Self {
            options,
            camera,
            landmarks,
            state: PipelineState::Idle,
            cameras: Vec::new(),
            selected_device: None,
            enumerated: false,
            last_error: None,
            generation: 0,
            start_in_flight: false,
            restart_pending: false,
            stream: None,
            binding_seq: 0,
            worker: None,
            detector: DetectorStatus::Loading,
            pending_request: None,
            outcome_tx,
            outcome_rx,
            event_tx,
            event_rx,
            frame_tx,
            frame_rx,
            lost_tx,
            lost_rx,
            renderer: OverlayRenderer::new(),
            canvas: RgbaImage::new(0, 0),
            hands: Vec::new(),
            gestures: Vec::new(),
            fps: FrameRateTracker::new(),
        })
    }

    /// Brings the binding up, enumerates cameras on the first call and starts
    /// the first device. Later calls restart the selected device if idle or
    /// stopped.
    pub fn start(&mut self) {
        if self.worker.is_none() {
            self.bind_inference();
        }

        if !self.enumerated {
            self.enumerated = true;
            match self.refresh_cameras().map(<[CameraDevice]>::len) {
                Ok(0) => {
                    log::warn!("no cameras found; capture not started");
                    return;
                }
                Ok(_) => {}
                Err(err) => {
                    log::warn!("camera enumeration failed: {err}");
                    self.last_error = Some(err);
                    return;
                }
            }
            if self.selected_device.is_none() {
                self.selected_device = self.cameras.first().map(|device| device.id.clone());
            }
        }

        if self.state.is_active() {
            return;
        }
        if let Some(device_id) = self.selected_device.clone() {
            self.begin_start(device_id);
        }
    }

    /// Re-enumerates devices without starting anything.
    pub fn refresh_cameras(&mut self) -> Result<&[CameraDevice], CaptureError> {
        self.cameras = self.camera.available_cameras()?;
        log::info!("found {} camera(s)", self.cameras.len());
        for device in &self.cameras {
            log::debug!("  {} -> {}", device.id, device.display_label());
        }
        Ok(&self.cameras)
    }

    /// Switches capture to `device_id`. Re-selecting the device that is
    /// already running or starting does nothing.
    pub fn select_camera(&mut self, device_id: &str) -> Result<(), CaptureError> {
        if !self.cameras.iter().any(|device| device.id == device_id) {
            return Err(CaptureError::DeviceUnavailable(format!(
                "unknown camera {device_id}"
            )));
        }
        if self.selected_device.as_deref() == Some(device_id) && self.state.is_active() {
            return Ok(());
        }

        log::info!("switching camera to {device_id}");
        self.selected_device = Some(device_id.to_string());
        self.begin_start(device_id.to_string());
        Ok(())
    }

    pub fn update_options(
        &mut self,
        f: impl FnOnce(&mut DetectionOptions),
    ) -> Result<(), ConfigError> {
        let mut next = self.options;
        f(&mut next);
        self.set_options(next)
    }

    /// Applies new options. The stream is released first; the binding is
    /// rebuilt only when an inference field changed; capture restarts unless
    /// the pipeline is idle.
    pub fn set_options(&mut self, options: DetectionOptions) -> Result<(), ConfigError> {
        options.validate()?;
        if options == self.options {
            return Ok(());
        }

        let rebind = self
            .worker
            .as_ref()
            .is_some_and(|worker| *worker.options() != options.inference());
        self.options = options;
        log::info!("detection options changed: {options:?}");

        let restart = match &self.state {
            PipelineState::Idle => None,
            PipelineState::Stopped { .. } => self.selected_device.clone(),
            active => active.device_id().map(str::to_string),
        };

        if restart.is_some() {
            self.release_stream();
        }
        if rebind {
            self.bind_inference();
        }
        if let Some(device_id) = restart {
            self.begin_start(device_id);
        }
        Ok(())
    }

    /// Applies every event that is already queued. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;

        while let Ok(outcome) = self.outcome_rx.try_recv() {
            self.on_capture_outcome(outcome);
            handled += 1;
        }
        while let Ok(lost) = self.lost_rx.try_recv() {
            self.on_stream_lost(lost);
            handled += 1;
        }
        while let Ok(event) = self.event_rx.try_recv() {
            self.on_worker_event(event);
            handled += 1;
        }
        while let Ok(tagged) = self.frame_rx.try_recv() {
            self.on_frame(tagged);
            handled += 1;
        }

        self.flush_pending_request();
        self.fps.poll(Instant::now());
        handled
    }

    /// Waits up to `timeout` for the first event, then drains the rest.
    pub fn pump_timeout(&mut self, timeout: Duration) -> usize {
        let outcomes = self.outcome_rx.clone();
        let events = self.event_rx.clone();
        let frames = self.frame_rx.clone();
        let lost = self.lost_rx.clone();

        let handled = select! {
            recv(outcomes) -> msg => msg.map(|outcome| self.on_capture_outcome(outcome)).is_ok(),
            recv(events) -> msg => msg.map(|event| self.on_worker_event(event)).is_ok(),
            recv(frames) -> msg => msg.map(|tagged| self.on_frame(tagged)).is_ok(),
            recv(lost) -> msg => msg.map(|lost| self.on_stream_lost(lost)).is_ok(),
            default(timeout) => false,
        };

        usize::from(handled) + self.pump()
    }

    /// Stops capture and closes the inference binding. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        self.generation += 1;
        self.restart_pending = false;
        self.release_stream();

        if self.start_in_flight {
            match self.outcome_rx.recv_timeout(SHUTDOWN_GRACE) {
                Ok(outcome) => self.discard_outcome(outcome),
                Err(_) => log::warn!("capture start did not report back before shutdown"),
            }
            self.start_in_flight = false;
        }

        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        self.pending_request = None;

        if self.state != PipelineState::Idle {
            log::info!("pipeline shut down");
        }
        self.state = PipelineState::Idle;
        self.detector = DetectorStatus::Loading;
        self.hands.clear();
        self.gestures.clear();
        self.fps.reset();
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn session(&self) -> SessionState {
        SessionState {
            running: self.is_running(),
            fps: self.fps.current_fps(),
            selected_device_id: self.selected_device.clone(),
            detector: self.detector.clone(),
            last_error: self.last_error.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, PipelineState::Running { .. })
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    pub fn cameras(&self) -> &[CameraDevice] {
        &self.cameras
    }

    /// The last rendered overlay, mirrored, at the camera's native size.
    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn hands(&self) -> &[Hand] {
        &self.hands
    }

    /// Per-hand results for the last processed frame, in hand order.
    pub fn gestures(&self) -> &[GestureResult] {
        &self.gestures
    }

    /// The last hand's result, or "None" when no hand was seen.
    pub fn current_gesture(&self) -> GestureResult {
        self.gestures.last().cloned().unwrap_or_default()
    }

    pub fn fps(&self) -> u32 {
        self.fps.current_fps()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.renderer.frames_rendered()
    }

    /// Replaces the binding without waiting for the old one: the new worker
    /// joins its predecessor before loading, so at most one model is live.
    fn bind_inference(&mut self) {
        let predecessor = self.worker.take().and_then(InferenceWorker::retire);
        self.pending_request = None;
        self.binding_seq += 1;
        self.detector = DetectorStatus::Loading;
        self.worker = Some(InferenceWorker::spawn(
            self.landmarks.clone(),
            self.options.inference(),
            self.binding_seq,
            self.event_tx.clone(),
            predecessor,
        ));
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            log::info!("capture stream released");
        }
    }

    fn begin_start(&mut self, device_id: String) {
        self.release_stream();
        self.generation += 1;
        self.pending_request = None;
        self.fps.reset();
        self.hands.clear();
        self.gestures.clear();

        self.state = if self.state.is_active() {
            PipelineState::Restarting {
                device_id: device_id.clone(),
            }
        } else {
            PipelineState::Starting {
                device_id: device_id.clone(),
            }
        };

        if self.start_in_flight {
            // The running start is now stale; launch once it reports back.
            self.restart_pending = true;
            return;
        }
        self.launch_start(device_id);
    }

    fn launch_start(&mut self, device_id: String) {
        let generation = self.generation;
        let camera = self.camera.clone();
        let resolution = self.options.resolution;
        let outcome_tx = self.outcome_tx.clone();
        let frame_tx = self.frame_tx.clone();
        let lost_tx = self.lost_tx.clone();

        let on_event: StreamCallback = Box::new(move |event| match event {
            StreamEvent::Frame(frame) => {
                // Full means the previous frame is still queued; drop this one.
                let _ = frame_tx.try_send(TaggedFrame { generation, frame });
            }
            StreamEvent::Lost(error) => {
                let _ = lost_tx.send(StreamLost { generation, error });
            }
        });

        log::info!("starting camera {device_id} at {resolution} (generation {generation})");
        let thread_device = device_id.clone();
        let spawned = thread::Builder::new()
            .name("capture-start".into())
            .spawn(move || {
                let result = camera.start_stream(Some(&thread_device), resolution, on_event);
                let outcome = CaptureOutcome {
                    generation,
                    device_id: thread_device,
                    result,
                };
                // If the controller is gone the stream drops here and stops itself.
                let _ = outcome_tx.send(outcome);
            });

        match spawned {
            Ok(_) => self.start_in_flight = true,
            Err(err) => self.enter_stopped(CaptureError::DeviceUnavailable(format!(
                "failed to spawn capture start for {device_id}: {err}"
            ))),
        }
    }

    fn on_capture_outcome(&mut self, outcome: CaptureOutcome) {
        self.start_in_flight = false;

        if outcome.generation != self.generation {
            log::debug!(
                "discarding superseded capture start for {} (generation {})",
                outcome.device_id,
                outcome.generation
            );
            self.discard_outcome(outcome);
            if std::mem::take(&mut self.restart_pending) {
                if let Some(device_id) = self.state.device_id().map(str::to_string) {
                    self.launch_start(device_id);
                }
            }
            return;
        }

        match outcome.result {
            Ok(stream) => {
                log::info!("camera {} running", outcome.device_id);
                self.stream = Some(stream);
                self.last_error = None;
                self.state = PipelineState::Running {
                    device_id: outcome.device_id,
                };
            }
            Err(err) => self.enter_stopped(err),
        }
    }

    fn discard_outcome(&mut self, outcome: CaptureOutcome) {
        if let Ok(mut stream) = outcome.result {
            stream.stop();
        }
    }

    fn enter_stopped(&mut self, error: CaptureError) {
        log::warn!("capture stopped: {error}");
        self.start_in_flight = false;
        self.last_error = Some(error.clone());
        self.state = PipelineState::Stopped { error };
        self.hands.clear();
        self.gestures.clear();
    }

    fn on_stream_lost(&mut self, lost: StreamLost) {
        if lost.generation != self.generation || !self.is_running() {
            log::debug!("ignoring loss report from generation {}", lost.generation);
            return;
        }
        self.release_stream();
        self.generation += 1;
        self.pending_request = None;
        self.fps.reset();
        self.enter_stopped(lost.error);
    }

    fn on_worker_event(&mut self, event: WorkerEvent) {
        let current = self.worker.as_ref().map(InferenceWorker::binding);

        match event {
            WorkerEvent::Ready { binding } if Some(binding) == current => {
                log::info!("hand detector ready (binding #{binding})");
                self.detector = DetectorStatus::Ready;
            }
            WorkerEvent::Unavailable { binding, error } if Some(binding) == current => {
                log::warn!("hand detector unavailable, rendering raw video: {error}");
                self.detector = DetectorStatus::Unavailable(error.to_string());
            }
            WorkerEvent::Landmarks(response)
                if Some(response.binding) == current
                    && response.generation == self.generation
                    && self.is_running() =>
            {
                self.on_landmarks(response);
            }
            WorkerEvent::Landmarks(response) => {
                log::debug!(
                    "discarding stale landmarks (binding #{}, generation {})",
                    response.binding,
                    response.generation
                );
            }
            other => log::debug!("ignoring event from a closed binding: {other:?}"),
        }
    }

    fn on_frame(&mut self, tagged: TaggedFrame) {
        if tagged.generation != self.generation || !self.is_running() {
            log::trace!("dropping frame from generation {}", tagged.generation);
            return;
        }

        let detector_ready = self.worker.is_some() && self.detector == DetectorStatus::Ready;
        if detector_ready {
            // Replaces any frame still waiting for the worker.
            self.pending_request = Some(InferenceRequest {
                generation: tagged.generation,
                frame: tagged.frame,
            });
            self.flush_pending_request();
        } else {
            self.present(tagged.frame, Vec::new());
        }
    }

    fn flush_pending_request(&mut self) {
        let (Some(worker), Some(request)) = (&self.worker, self.pending_request.take()) else {
            return;
        };
        if request.generation != self.generation {
            return;
        }
        if let Err(request) = worker.submit(request) {
            self.pending_request = Some(request);
        }
    }

    fn on_landmarks(&mut self, response: InferenceResponse) {
        self.present(response.frame, response.hands);
        self.flush_pending_request();
    }

    fn present(&mut self, frame: Frame, hands: Vec<Hand>) {
        self.renderer.render(&mut self.canvas, &frame, &hands);
        self.gestures = gesture::classify_hands(&hands);
        self.hands = hands;
        if let Some(fps) = self.fps.tick(Instant::now()) {
            log::debug!("fps: {fps}");
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
