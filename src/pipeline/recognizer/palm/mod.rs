mod anchors;

use std::{cmp::Ordering, f32::consts::FRAC_PI_2, path::Path};

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use self::anchors::{NUM_ANCHORS, anchors};
use super::common::{HandCrop, Letterbox, PALM_INPUT_SIZE, letterbox_tensor};
use crate::{config::InferenceOptions, types::Frame};

/// Keypoints per palm: wrist, index/middle/ring/pinky MCP, two thumb joints.
const PALM_KEYPOINTS: usize = 7;
const WRIST: usize = 0;
const MIDDLE_MCP: usize = 2;

/// Crop side relative to the palm box.
const CROP_SCALE: f32 = 2.6;
/// Shift of the crop centre from the palm towards the fingers, in box sizes.
const CROP_SHIFT: f32 = 0.5;

#[derive(Clone, Debug, PartialEq)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub max_palms: usize,
}

impl PalmDetectorConfig {
    pub fn from_options(options: &InferenceOptions) -> Self {
        Self {
            score_threshold: options.min_detection_confidence,
            nms_threshold: 0.3,
            max_palms: usize::from(options.max_hands),
        }
    }
}

/// One detected palm, in frame pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub keypoints: Vec<(f32, f32)>,
    pub score: f32,
}

impl PalmRegion {
    /// Upright square crop covering the whole hand.
    pub fn hand_crop(&self) -> HandCrop {
        let [x1, y1, x2, y2] = self.bbox;
        let size = (x2 - x1).max(y2 - y1);
        let (cx, cy) = ((x1 + x2) / 2.0, (y1 + y2) / 2.0);

        let direction = match (self.keypoints.get(WRIST), self.keypoints.get(MIDDLE_MCP)) {
            (Some(&(wx, wy)), Some(&(mx, my))) if (mx - wx).hypot(my - wy) > f32::EPSILON => {
                (my - wy).atan2(mx - wx)
            }
            _ => -FRAC_PI_2,
        };

        HandCrop {
            center: (
                cx + direction.cos() * size * CROP_SHIFT,
                cy + direction.sin() * size * CROP_SHIFT,
            ),
            side: size * CROP_SCALE,
            angle: direction + FRAC_PI_2,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self { session, cfg })
    }

    /// Palms above the score threshold, best first, at most `max_palms`.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = letterbox_tensor(frame, PALM_INPUT_SIZE)?;
        let outputs = self
            .session
            .run(ort::inputs![Tensor::from_array(input)?])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let feature_dim = *boxes
            .shape()
            .last()
            .ok_or_else(|| anyhow!("palm box output has no shape"))?;

        let boxes: Vec<f32> = boxes.iter().copied().collect();
        let scores: Vec<f32> = scores.iter().copied().collect();
        decode(&boxes, feature_dim, &scores, &letterbox, &self.cfg)
    }
}

fn decode(
    boxes: &[f32],
    feature_dim: usize,
    scores: &[f32],
    letterbox: &Letterbox,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    if feature_dim < 4 + PALM_KEYPOINTS * 2 {
        return Err(anyhow!("palm box feature dimension too small: {feature_dim}"));
    }
    let count = NUM_ANCHORS.min(scores.len()).min(boxes.len() / feature_dim);

    let input = PALM_INPUT_SIZE as f32;
    // Model space [0, 1] over the padded square -> frame pixels.
    let to_frame = |nx: f32, ny: f32| {
        (
            (nx * input - letterbox.pad_x) / letterbox.scale,
            (ny * input - letterbox.pad_y) / letterbox.scale,
        )
    };
    let (max_x, max_y) = (
        letterbox.frame_w.saturating_sub(1) as f32,
        letterbox.frame_h.saturating_sub(1) as f32,
    );

    let mut candidates = Vec::new();
    for (idx, (features, &raw_score)) in boxes
        .chunks_exact(feature_dim)
        .zip(scores)
        .take(count)
        .enumerate()
    {
        let score = sigmoid(raw_score);
        if score < cfg.score_threshold {
            continue;
        }
        let [ax, ay] = anchors()[idx];

        let cx = features[0] / input + ax;
        let cy = features[1] / input + ay;
        let (hw, hh) = (features[2] / input / 2.0, features[3] / input / 2.0);
        let (x1, y1) = to_frame(cx - hw, cy - hh);
        let (x2, y2) = to_frame(cx + hw, cy + hh);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        let keypoints = features[4..4 + PALM_KEYPOINTS * 2]
            .chunks_exact(2)
            .map(|kp| to_frame(kp[0] / input + ax, kp[1] / input + ay))
            .collect();

        candidates.push(PalmRegion {
            bbox: [
                x1.clamp(0.0, max_x),
                y1.clamp(0.0, max_y),
                x2.clamp(0.0, max_x),
                y2.clamp(0.0, max_y),
            ],
            keypoints,
            score,
        });
    }

    Ok(non_max_suppression(candidates, cfg.nms_threshold, cfg.max_palms))
}

fn non_max_suppression(
    mut candidates: Vec<PalmRegion>,
    threshold: f32,
    limit: usize,
) -> Vec<PalmRegion> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut kept: Vec<PalmRegion> = Vec::new();
    for candidate in candidates {
        if kept.len() >= limit {
            break;
        }
        if kept.iter().all(|k| iou(&k.bbox, &candidate.bbox) < threshold) {
            kept.push(candidate);
        }
    }
    kept
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area = |r: &[f32; 4]| (r[2] - r[0]).max(0.0) * (r[3] - r[1]).max(0.0);
    let union = area(a) + area(b) - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

pub(super) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            keypoints: Vec::new(),
            score,
        }
    }

    #[test]
    fn suppression_keeps_best_of_overlapping_boxes() {
        let kept = non_max_suppression(
            vec![
                region([0.0, 0.0, 10.0, 10.0], 0.6),
                region([1.0, 1.0, 11.0, 11.0], 0.9),
                region([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            5,
        );
        let scores: Vec<f32> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn suppression_respects_palm_limit() {
        let kept = non_max_suppression(
            vec![
                region([0.0, 0.0, 10.0, 10.0], 0.8),
                region([50.0, 50.0, 60.0, 60.0], 0.7),
            ],
            0.3,
            1,
        );
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn upright_palm_crop_points_fingers_up() {
        let palm = PalmRegion {
            bbox: [40.0, 40.0, 60.0, 60.0],
            keypoints: vec![(50.0, 60.0), (45.0, 40.0), (50.0, 40.0)],
            score: 0.9,
        };
        let crop = palm.hand_crop();
        assert_abs_diff_eq!(crop.angle, 0.0, epsilon = 1e-5);
        assert_abs_diff_eq!(crop.center.1, 40.0, epsilon = 1e-4);
        assert_abs_diff_eq!(crop.side, 52.0, epsilon = 1e-4);
    }

    #[test]
    fn scores_below_threshold_are_dropped() {
        let letterbox = Letterbox {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            frame_w: 192,
            frame_h: 192,
        };
        let cfg = PalmDetectorConfig {
            score_threshold: 0.7,
            nms_threshold: 0.3,
            max_palms: 2,
        };
        let mut features = vec![0.0; 18 * 2];
        features[2] = 20.0;
        features[3] = 20.0;
        features[18 + 2] = 20.0;
        features[18 + 3] = 20.0;
        // sigmoid(3) ~ 0.95, sigmoid(0) = 0.5
        let palms = decode(&features, 18, &[3.0, 0.0], &letterbox, &cfg).unwrap();
        assert_eq!(palms.len(), 1);
        assert!(palms[0].score > 0.9);
    }
}
