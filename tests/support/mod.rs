#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::{Duration, Instant},
};

use hand_overlay::{
    CaptureError, DetectionOptions, Frame, Hand, Handedness, InferenceError, InferenceOptions,
    Landmark, PipelineController, Resolution,
    pipeline::{
        CameraBackend, CameraDevice, CameraStream, LandmarkBackend, LandmarkSource, StreamCallback,
        StreamEvent,
    },
};

pub const FRAME_SIZE: (u32, u32) = (64, 48);
pub const DEADLINE: Duration = Duration::from_secs(5);

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Clone, Debug, PartialEq)]
pub enum CameraEvent {
    Open { device: String, resolution: Resolution },
    Frame(String),
    Stop(String),
}

/// In-memory camera that emits solid frames in a per-device colour and logs
/// every open, frame and stop.
pub struct FakeCamera {
    devices: Vec<CameraDevice>,
    log: Arc<Mutex<Vec<CameraEvent>>>,
    failures: Mutex<HashMap<String, CaptureError>>,
    open_delays: Mutex<HashMap<String, Duration>>,
    lost: Arc<Mutex<HashSet<String>>>,
}

impl FakeCamera {
    pub fn new(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            devices: ids
                .iter()
                .map(|id| CameraDevice::new(*id, format!("Fake {id}")))
                .collect(),
            log: Arc::new(Mutex::new(Vec::new())),
            failures: Mutex::new(HashMap::new()),
            open_delays: Mutex::new(HashMap::new()),
            lost: Arc::new(Mutex::new(HashSet::new())),
        })
    }

    /// Makes the running stream of `id` report the device as gone.
    pub fn unplug(&self, id: &str) {
        self.lost.lock().unwrap().insert(id.to_string());
    }

    pub fn fail_device(&self, id: &str, error: CaptureError) {
        self.failures.lock().unwrap().insert(id.to_string(), error);
    }

    pub fn delay_open(&self, id: &str, delay: Duration) {
        self.open_delays.lock().unwrap().insert(id.to_string(), delay);
    }

    pub fn events(&self) -> Vec<CameraEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn opens(&self) -> usize {
        self.count(|e| matches!(e, CameraEvent::Open { .. }))
    }

    pub fn stops(&self) -> usize {
        self.count(|e| matches!(e, CameraEvent::Stop(_)))
    }

    fn count(&self, pred: impl Fn(&CameraEvent) -> bool) -> usize {
        self.log.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

pub fn device_color(id: &str) -> [u8; 4] {
    match id {
        "cam0" => [200, 0, 0, 255],
        "cam1" => [0, 0, 200, 255],
        _ => [0, 200, 0, 255],
    }
}

impl CameraBackend for FakeCamera {
    fn available_cameras(&self) -> Result<Vec<CameraDevice>, CaptureError> {
        Ok(self.devices.clone())
    }

    fn start_stream(
        &self,
        device_id: Option<&str>,
        resolution: Resolution,
        mut on_event: StreamCallback,
    ) -> Result<Box<dyn CameraStream>, CaptureError> {
        let id = device_id
            .map(str::to_string)
            .or_else(|| self.devices.first().map(|d| d.id.clone()))
            .ok_or_else(|| CaptureError::DeviceUnavailable("no devices".into()))?;

        let delay = self.open_delays.lock().unwrap().get(&id).copied();
        if let Some(delay) = delay {
            thread::sleep(delay);
        }
        if let Some(err) = self.failures.lock().unwrap().get(&id).cloned() {
            return Err(err);
        }

        self.log.lock().unwrap().push(CameraEvent::Open {
            device: id.clone(),
            resolution,
        });

        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = stop.clone();
            let log = self.log.clone();
            let lost = self.lost.clone();
            let id = id.clone();
            thread::spawn(move || {
                let color = device_color(&id);
                while !stop.load(Ordering::SeqCst) {
                    if lost.lock().unwrap().contains(&id) {
                        on_event(StreamEvent::Lost(CaptureError::DeviceUnavailable(format!(
                            "{id} unplugged"
                        ))));
                        return;
                    }
                    log.lock().unwrap().push(CameraEvent::Frame(id.clone()));
                    on_event(StreamEvent::Frame(Frame::filled(
                        FRAME_SIZE.0,
                        FRAME_SIZE.1,
                        color,
                    )));
                    thread::sleep(Duration::from_millis(5));
                }
            })
        };

        Ok(Box::new(FakeStream {
            id,
            stop,
            handle: Some(handle),
            log: self.log.clone(),
        }))
    }
}

struct FakeStream {
    id: String,
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
    log: Arc<Mutex<Vec<CameraEvent>>>,
}

impl CameraStream for FakeStream {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
            self.log.lock().unwrap().push(CameraEvent::Stop(self.id.clone()));
        }
    }
}

impl Drop for FakeStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LandmarkEvent {
    Create(InferenceOptions),
    Close,
}

/// Landmark backend that returns a fixed set of hands for every frame.
///
/// Each returned hand carries the binding's `min_detection_confidence` as its
/// confidence, so tests can tell which binding produced a result.
pub struct FakeLandmarker {
    hands: Vec<Hand>,
    fail: bool,
    create_delay: Duration,
    detect_delay: Duration,
    log: Arc<Mutex<Vec<LandmarkEvent>>>,
}

impl FakeLandmarker {
    pub fn with_hands(hands: Vec<Hand>) -> Arc<Self> {
        Self::with_delays(hands, Duration::ZERO, Duration::ZERO)
    }

    pub fn with_delays(hands: Vec<Hand>, create_delay: Duration, detect_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            hands,
            fail: false,
            create_delay,
            detect_delay,
            log: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            hands: Vec::new(),
            fail: true,
            create_delay: Duration::ZERO,
            detect_delay: Duration::ZERO,
            log: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn events(&self) -> Vec<LandmarkEvent> {
        self.log.lock().unwrap().clone()
    }

    pub fn creates(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, LandmarkEvent::Create(_)))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, LandmarkEvent::Close))
            .count()
    }
}

impl LandmarkBackend for FakeLandmarker {
    fn label(&self) -> &'static str {
        "fake"
    }

    fn create(
        &self,
        options: &InferenceOptions,
    ) -> Result<Box<dyn LandmarkSource>, InferenceError> {
        thread::sleep(self.create_delay);
        if self.fail {
            return Err(InferenceError::Unavailable("model missing".into()));
        }
        self.log.lock().unwrap().push(LandmarkEvent::Create(*options));
        let confidence = options.min_detection_confidence;
        Ok(Box::new(FakeSource {
            hands: self
                .hands
                .iter()
                .cloned()
                .map(|hand| hand.with_meta(confidence, Handedness::Unknown))
                .collect(),
            detect_delay: self.detect_delay,
            log: self.log.clone(),
        }))
    }
}

struct FakeSource {
    hands: Vec<Hand>,
    detect_delay: Duration,
    log: Arc<Mutex<Vec<LandmarkEvent>>>,
}

impl LandmarkSource for FakeSource {
    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Hand>, InferenceError> {
        thread::sleep(self.detect_delay);
        Ok(self.hands.clone())
    }

    fn close(&mut self) {
        self.log.lock().unwrap().push(LandmarkEvent::Close);
    }
}

/// All 21 joints at the centre with the index tip 0.02 to the right.
pub fn pinch_hand() -> Hand {
    let mut landmarks = vec![Landmark::new(0.5, 0.5); 21];
    landmarks[8] = Landmark::new(0.52, 0.5);
    Hand::new(landmarks)
}

/// Index tip well away from the thumb, index not raised: an open hand.
pub fn open_hand() -> Hand {
    let mut landmarks = vec![Landmark::new(0.5, 0.5); 21];
    landmarks[8] = Landmark::new(0.7, 0.5);
    Hand::new(landmarks)
}

pub fn controller(
    camera: &Arc<FakeCamera>,
    landmarks: &Arc<FakeLandmarker>,
) -> PipelineController {
    controller_with(camera, landmarks, DetectionOptions::default())
}

pub fn controller_with(
    camera: &Arc<FakeCamera>,
    landmarks: &Arc<FakeLandmarker>,
    options: DetectionOptions,
) -> PipelineController {
    PipelineController::new(camera.clone(), landmarks.clone(), options).unwrap()
}

/// Pumps until `done` holds or the deadline passes.
pub fn pump_until(
    controller: &mut PipelineController,
    mut done: impl FnMut(&PipelineController) -> bool,
) -> bool {
    let deadline = Instant::now() + DEADLINE;
    while Instant::now() < deadline {
        controller.pump_timeout(Duration::from_millis(10));
        if done(controller) {
            return true;
        }
    }
    false
}

pub fn canvas_color(controller: &PipelineController) -> Option<[u8; 4]> {
    controller.canvas().get_pixel_checked(0, 0).map(|px| px.0)
}
