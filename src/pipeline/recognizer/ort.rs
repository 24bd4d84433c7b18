use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    LandmarkBackend, LandmarkSource,
    common::{HandCrop, LANDMARK_INPUT_SIZE},
    palm::{PalmDetector, PalmDetectorConfig, sigmoid},
};
use crate::{
    config::InferenceOptions,
    error::InferenceError,
    model_download::{self, HAND_LANDMARKS, PALM_DETECTOR},
    types::{Frame, Hand, Handedness, Landmark, joint},
};

/// Where the two ONNX models live on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub palm_detector: PathBuf,
    pub hand_landmarks: PathBuf,
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            palm_detector: PALM_DETECTOR.default_path(),
            hand_landmarks: HAND_LANDMARKS.default_path(),
        }
    }
}

/// Palm detection followed by 21-point landmark regression, on ONNX Runtime.
#[derive(Clone, Debug, Default)]
pub struct OnnxLandmarkBackend {
    paths: ModelPaths,
}

impl OnnxLandmarkBackend {
    pub fn new(paths: ModelPaths) -> Self {
        Self { paths }
    }
}

impl LandmarkBackend for OnnxLandmarkBackend {
    fn label(&self) -> &'static str {
        "ort"
    }

    fn create(&self, options: &InferenceOptions) -> Result<Box<dyn LandmarkSource>, InferenceError> {
        let landmarker = OnnxLandmarker::load(&self.paths, options)
            .map_err(|err| InferenceError::Unavailable(format!("{err:#}")))?;
        log::info!(
            "hand landmarker ready using {} and {}",
            self.paths.palm_detector.display(),
            self.paths.hand_landmarks.display()
        );
        Ok(Box::new(landmarker))
    }
}

struct OnnxLandmarker {
    palm_detector: PalmDetector,
    landmarks: Session,
    min_tracking_confidence: f32,
    refinement_passes: u8,
}

impl OnnxLandmarker {
    fn load(paths: &ModelPaths, options: &InferenceOptions) -> Result<Self> {
        model_download::ensure_model_ready(&PALM_DETECTOR, &paths.palm_detector, |_| {})?;
        model_download::ensure_model_ready(&HAND_LANDMARKS, &paths.hand_landmarks, |_| {})?;

        let palm_detector = PalmDetector::new(
            &paths.palm_detector,
            PalmDetectorConfig::from_options(options),
        )?;
        let landmarks = load_session(&paths.hand_landmarks)?;

        Ok(Self {
            palm_detector,
            landmarks,
            min_tracking_confidence: options.min_tracking_confidence,
            refinement_passes: options.model_complexity,
        })
    }

    fn estimate(&mut self, frame: &Frame, crop: &HandCrop) -> Result<LandmarkEstimate> {
        let input = crop.sample(frame, LANDMARK_INPUT_SIZE)?;
        let outputs = self
            .landmarks
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run hand landmark session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("hand landmark model returned no outputs"));
        }

        let coords: Vec<f32> = outputs[0].try_extract_array::<f32>()?.iter().copied().collect();
        if coords.len() < joint::COUNT * 3 {
            return Err(anyhow!(
                "unexpected landmark output length {}, need {}",
                coords.len(),
                joint::COUNT * 3
            ));
        }
        let first_scalar = |index: usize| {
            (outputs.len() > index)
                .then(|| outputs[index].try_extract_array::<f32>().ok())
                .flatten()
                .and_then(|arr| arr.iter().next().copied())
        };
        let confidence = first_scalar(1).unwrap_or(0.0);
        let handedness = first_scalar(2).unwrap_or(0.5);

        let landmarks = coords
            .chunks_exact(3)
            .take(joint::COUNT)
            .map(|p| {
                crop.to_frame(p[0], p[1], p[2], LANDMARK_INPUT_SIZE, frame.width, frame.height)
            })
            .collect();

        Ok(LandmarkEstimate {
            landmarks,
            confidence: normalize_score(confidence),
            handedness,
        })
    }
}

struct LandmarkEstimate {
    landmarks: Vec<Landmark>,
    confidence: f32,
    handedness: f32,
}

impl LandmarkSource for OnnxLandmarker {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Hand>, InferenceError> {
        let palms = self
            .palm_detector
            .detect(frame)
            .map_err(|err| InferenceError::Failed(format!("palm detection: {err:#}")))?;

        let mut hands = Vec::with_capacity(palms.len());
        for palm in &palms {
            let mut crop = palm.hand_crop();
            let mut estimate = self
                .estimate(frame, &crop)
                .map_err(|err| InferenceError::Failed(format!("{err:#}")))?;

            for _ in 0..self.refinement_passes {
                let Some(refined) =
                    HandCrop::around(&estimate.landmarks, crop.angle, frame.width, frame.height)
                else {
                    break;
                };
                crop = refined;
                match self.estimate(frame, &crop) {
                    Ok(next) => estimate = next,
                    Err(err) => {
                        log::debug!("landmark refinement failed: {err:#}");
                        break;
                    }
                }
            }

            if estimate.confidence < self.min_tracking_confidence {
                log::trace!(
                    "dropping hand below tracking confidence ({:.2})",
                    estimate.confidence
                );
                continue;
            }

            hands.push(Hand::new(estimate.landmarks).with_meta(
                (estimate.confidence * palm.score).clamp(0.0, 1.0),
                Handedness::from_score(estimate.handedness),
            ));
        }
        Ok(hands)
    }

    fn close(&mut self) {
        log::debug!("closing ONNX hand landmarker");
    }
}

fn load_session(path: &Path) -> Result<Session> {
    Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(2)?
        .commit_from_file(path)
        .with_context(|| format!("failed to load ORT session from {}", path.display()))
}

/// Some exports emit logits, others probabilities.
fn normalize_score(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        sigmoid(raw)
    }
}
