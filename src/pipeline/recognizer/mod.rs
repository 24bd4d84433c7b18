#[cfg(feature = "onnx")]
mod common;
#[cfg(feature = "onnx")]
mod ort;
#[cfg(feature = "onnx")]
mod palm;

use std::{sync::Arc, thread};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};

use crate::{
    config::InferenceOptions,
    error::InferenceError,
    types::{Frame, Hand},
};

#[cfg(feature = "onnx")]
pub use self::ort::{ModelPaths, OnnxLandmarkBackend};

/// A configured landmark model: one frame in, zero or more hands out.
pub trait LandmarkSource: Send + 'static {
    /// Hands found in `frame`, each with its 21 landmarks in skeleton order.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Hand>, InferenceError>;

    /// Releases model resources. Called once when the binding is torn down.
    fn close(&mut self) {}
}

/// Builds [`LandmarkSource`]s for a given set of inference options.
pub trait LandmarkBackend: Send + Sync + 'static {
    fn label(&self) -> &'static str;

    fn create(&self, options: &InferenceOptions)
    -> Result<Box<dyn LandmarkSource>, InferenceError>;
}

#[derive(Debug)]
pub struct InferenceRequest {
    /// Capture generation the frame came from.
    pub generation: u64,
    pub frame: Frame,
}

#[derive(Debug)]
pub struct InferenceResponse {
    pub binding: u64,
    pub generation: u64,
    pub frame: Frame,
    pub hands: Vec<Hand>,
}

#[derive(Debug)]
pub enum WorkerEvent {
    Ready { binding: u64 },
    Unavailable { binding: u64, error: InferenceError },
    Landmarks(InferenceResponse),
}

/// One live inference binding: a worker thread that owns the landmark source.
///
/// Dropping or shutting down the worker closes the source after any in-flight
/// frame finishes and waits for it. [`retire`](Self::retire) closes without
/// waiting and hands the thread to the successor binding.
pub struct InferenceWorker {
    binding: u64,
    options: InferenceOptions,
    request_tx: Option<Sender<InferenceRequest>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl InferenceWorker {
    /// Starts binding `binding`. If `predecessor` is given, the new thread
    /// joins it before creating its source.
    pub fn spawn(
        backend: Arc<dyn LandmarkBackend>,
        options: InferenceOptions,
        binding: u64,
        event_tx: Sender<WorkerEvent>,
        predecessor: Option<thread::JoinHandle<()>>,
    ) -> Self {
        log::info!(
            "starting {} landmark binding #{binding}: {options:?}",
            backend.label()
        );
        let (request_tx, request_rx) = bounded(1);

        let spawned = thread::Builder::new()
            .name(format!("landmarks-{binding}"))
            .spawn(move || {
                if let Some(handle) = predecessor {
                    if handle.join().is_err() {
                        log::error!("previous landmark worker panicked");
                    }
                }
                run_worker(backend.as_ref(), options, binding, request_rx, event_tx)
            });

        let handle = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::error!("failed to spawn landmark worker: {err}");
                None
            }
        };

        Self {
            binding,
            options,
            request_tx: handle.as_ref().map(|_| request_tx),
            handle,
        }
    }

    pub fn binding(&self) -> u64 {
        self.binding
    }

    pub fn options(&self) -> &InferenceOptions {
        &self.options
    }

    /// Queues a frame unless the worker is still busy with the previous one.
    /// A rejected request is handed back.
    pub fn submit(&self, request: InferenceRequest) -> Result<(), InferenceRequest> {
        let Some(tx) = &self.request_tx else {
            return Err(request);
        };
        tx.try_send(request).map_err(|err| match err {
            TrySendError::Full(req) | TrySendError::Disconnected(req) => req,
        })
    }

    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Stops accepting frames and returns the still-running thread instead of
    /// joining it. The source closes once its current frame is done.
    pub fn retire(mut self) -> Option<thread::JoinHandle<()>> {
        self.request_tx.take();
        log::debug!("landmark binding #{} retired", self.binding);
        self.handle.take()
    }

    fn stop(&mut self) {
        self.request_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("landmark worker #{} panicked", self.binding);
            }
            log::debug!("landmark binding #{} closed", self.binding);
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    backend: &dyn LandmarkBackend,
    options: InferenceOptions,
    binding: u64,
    request_rx: Receiver<InferenceRequest>,
    event_tx: Sender<WorkerEvent>,
) {
    let mut source = match backend.create(&options) {
        Ok(source) => {
            let _ = event_tx.send(WorkerEvent::Ready { binding });
            source
        }
        Err(error) => {
            log::error!("landmark binding #{binding} unavailable: {error}");
            let _ = event_tx.send(WorkerEvent::Unavailable { binding, error });
            return;
        }
    };

    let max_hands = usize::from(options.max_hands);
    while let Some(request) = recv_latest(&request_rx) {
        let hands = match source.detect(&request.frame) {
            Ok(mut hands) => {
                hands.truncate(max_hands);
                hands
            }
            Err(err) => {
                log::warn!("hand landmark inference failed: {err}");
                Vec::new()
            }
        };

        let response = InferenceResponse {
            binding,
            generation: request.generation,
            frame: request.frame,
            hands,
        };
        if event_tx.send(WorkerEvent::Landmarks(response)).is_err() {
            break;
        }
    }

    source.close();
}

/// Blocks for the next item, then skips ahead to the newest one queued.
pub(crate) fn recv_latest<T>(rx: &Receiver<T>) -> Option<T> {
    let mut latest = rx.recv().ok()?;
    while let Ok(newer) = rx.try_recv() {
        latest = newer;
    }
    Some(latest)
}
