mod anchors;

use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anchors::generate_anchors;
use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{LetterboxInfo, PALM_INPUT_SIZE, prepare_letterboxed};
use crate::types::Frame;

const PALM_LANDMARKS: usize = 7;
const BOX_FEATURES: usize = 4 + PALM_LANDMARKS * 2;

/// Palm box and its seven keypoints, in frame pixels.
#[derive(Clone, Debug)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.5,
            nms_threshold: 0.3,
            top_k: 2,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    anchors: Vec<[f32; 2]>,
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

        Ok(Self {
            session,
            anchors: generate_anchors(),
            cfg,
        })
    }

    /// Palm regions sorted by score, at most `top_k` after suppression.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = prepare_letterboxed(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let boxes = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;
        let feature_dim = boxes.shape().last().copied().unwrap_or(0);
        let score_dim = scores.shape().last().copied().unwrap_or(0);

        let candidates = decode_palm_outputs(
            boxes
                .as_slice()
                .ok_or_else(|| anyhow!("palm boxes not contiguous"))?,
            feature_dim,
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("palm scores not contiguous"))?,
            score_dim,
            &self.anchors,
            &letterbox,
            self.cfg.score_threshold,
        )?;

        Ok(nms(candidates, self.cfg.nms_threshold, self.cfg.top_k))
    }
}

/// Turn raw anchor regressions into frame-space regions above `threshold`.
fn decode_palm_outputs(
    boxes: &[f32],
    feature_dim: usize,
    scores: &[f32],
    score_dim: usize,
    anchors: &[[f32; 2]],
    letterbox: &LetterboxInfo,
    threshold: f32,
) -> Result<Vec<PalmRegion>> {
    if feature_dim < BOX_FEATURES {
        return Err(anyhow!("palm box feature dimension too small: {feature_dim}"));
    }
    if score_dim == 0 {
        return Err(anyhow!("palm score tensor has no features"));
    }

    let anchor_count = anchors
        .len()
        .min(boxes.len() / feature_dim)
        .min(scores.len() / score_dim);
    let input = PALM_INPUT_SIZE as f32;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let bias = (letterbox.pad_x / letterbox.scale, letterbox.pad_y / letterbox.scale);
    let to_frame = |nx: f32, ny: f32| (nx * scale - bias.0, ny * scale - bias.1);
    let max_x = letterbox.orig_w.saturating_sub(1) as f32;
    let max_y = letterbox.orig_h.saturating_sub(1) as f32;

    let mut regions = Vec::new();
    for (idx, anchor) in anchors.iter().enumerate().take(anchor_count) {
        let score = sigmoid(scores[idx * score_dim]);
        if score < threshold {
            continue;
        }

        let raw = &boxes[idx * feature_dim..idx * feature_dim + BOX_FEATURES];
        let cx = raw[0] / input + anchor[0];
        let cy = raw[1] / input + anchor[1];
        let half_w = raw[2] / input / 2.0;
        let half_h = raw[3] / input / 2.0;
        if half_w <= 0.0 || half_h <= 0.0 {
            continue;
        }

        let (x1, y1) = to_frame(cx - half_w, cy - half_h);
        let (x2, y2) = to_frame(cx + half_w, cy + half_h);
        let landmarks = raw[4..]
            .chunks_exact(2)
            .map(|p| to_frame(p[0] / input + anchor[0], p[1] / input + anchor[1]))
            .collect();

        regions.push(PalmRegion {
            bbox: [
                x1.clamp(0.0, max_x),
                y1.clamp(0.0, max_y),
                x2.clamp(0.0, max_x),
                y2.clamp(0.0, max_y),
            ],
            landmarks,
            score,
        });
    }

    Ok(regions)
}

/// Rotated square around a palm: `(centre, side, angle)` in frame pixels.
pub fn crop_from_palm(region: &PalmRegion) -> ((f32, f32), f32, f32) {
    let center = match centroid(&region.landmarks) {
        Some(center) => center,
        None => (
            (region.bbox[0] + region.bbox[2]) * 0.5,
            (region.bbox[1] + region.bbox[3]) * 0.5,
        ),
    };

    let base_w = (region.bbox[2] - region.bbox[0]).abs();
    let base_h = (region.bbox[3] - region.bbox[1]).abs();
    let landmark_span = region
        .landmarks
        .iter()
        .fold(None, |acc: Option<(f32, f32, f32, f32)>, (x, y)| {
            Some(match acc {
                None => (*x, *x, *y, *y),
                Some((min_x, max_x, min_y, max_y)) => {
                    (min_x.min(*x), max_x.max(*x), min_y.min(*y), max_y.max(*y))
                }
            })
        })
        .map_or(0.0, |(min_x, max_x, min_y, max_y)| (max_x - min_x).max(max_y - min_y));
    // The palm box leaves the fingers out; widen until they fit.
    let side = base_w.max(base_h).max(landmark_span).max(80.0) * 2.4;

    (center, side, estimate_orientation(region))
}

fn centroid(points: &[(f32, f32)]) -> Option<(f32, f32)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f32;
    let (sx, sy) = points
        .iter()
        .fold((0.0_f32, 0.0_f32), |acc, (x, y)| (acc.0 + x, acc.1 + y));
    Some((sx / n, sy / n))
}

/// Angle of the principal axis of the palm keypoints, turned so fingers point up.
pub fn estimate_orientation(region: &PalmRegion) -> f32 {
    if region.landmarks.len() < 2 {
        return 0.0;
    }
    let Some(mean) = centroid(&region.landmarks) else {
        return 0.0;
    };

    let n = region.landmarks.len() as f32;
    let (cov_xx, cov_xy, cov_yy) =
        region
            .landmarks
            .iter()
            .fold((0.0_f32, 0.0_f32, 0.0_f32), |acc, (x, y)| {
                let dx = x - mean.0;
                let dy = y - mean.1;
                (acc.0 + dx * dx, acc.1 + dx * dy, acc.2 + dy * dy)
            });
    let (cov_xx, cov_xy, cov_yy) = (cov_xx / n, cov_xy / n, cov_yy / n);

    let half_trace = (cov_xx + cov_yy) * 0.5;
    let det = cov_xx * cov_yy - cov_xy * cov_xy;
    let lambda = (half_trace + (half_trace * half_trace - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if cov_xy.abs() > 1e-6 {
        (lambda - cov_yy, cov_xy)
    } else if cov_xx >= cov_yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    vy.atan2(vx) - PI * 0.5
}

/// Greedy suppression, highest score first.
fn nms(mut regions: Vec<PalmRegion>, threshold: f32, top_k: usize) -> Vec<PalmRegion> {
    regions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut keep: Vec<PalmRegion> = Vec::new();
    for region in regions {
        if keep.len() >= top_k {
            break;
        }
        if keep.iter().all(|k| iou(&region.bbox, &k.bbox) < threshold) {
            keep.push(region);
        }
    }
    keep
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

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            landmarks: Vec::new(),
            score,
        }
    }

    #[test]
    fn nms_drops_overlaps_and_caps_count() {
        let kept = nms(
            vec![
                region([0.0, 0.0, 10.0, 10.0], 0.6),
                region([1.0, 1.0, 11.0, 11.0], 0.9),
                region([50.0, 50.0, 60.0, 60.0], 0.7),
                region([100.0, 0.0, 110.0, 10.0], 0.65),
            ],
            0.3,
            2,
        );
        let scores: Vec<f32> = kept.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn decode_keeps_confident_anchor_in_frame_space() {
        let anchors = vec![[0.5, 0.5], [0.25, 0.25]];
        let mut boxes = vec![0.0; BOX_FEATURES * 2];
        // Anchor 0: 96px box centred on the anchor.
        boxes[2] = 96.0;
        boxes[3] = 96.0;
        let scores = vec![5.0, -5.0];
        let letterbox = LetterboxInfo {
            scale: 192.0 / 640.0,
            pad_x: 0.0,
            pad_y: 24.0,
            orig_w: 640,
            orig_h: 480,
        };

        let regions =
            decode_palm_outputs(&boxes, BOX_FEATURES, &scores, 1, &anchors, &letterbox, 0.5)
                .unwrap();
        assert_eq!(regions.len(), 1);
        let bbox = regions[0].bbox;
        assert!((bbox[0] - 160.0).abs() < 1e-3);
        assert!((bbox[2] - 480.0).abs() < 1e-3);
        assert!((bbox[1] - 80.0).abs() < 1e-3);
        assert!((bbox[3] - 400.0).abs() < 1e-3);
        assert_eq!(regions[0].landmarks.len(), PALM_LANDMARKS);
    }

    #[test]
    fn decode_rejects_short_feature_rows() {
        let letterbox = LetterboxInfo {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        };
        assert!(decode_palm_outputs(&[0.0; 4], 4, &[0.0], 1, &[[0.5, 0.5]], &letterbox, 0.5).is_err());
    }

    #[test]
    fn crop_is_centred_on_palm_keypoints() {
        let palm = PalmRegion {
            bbox: [0.0, 0.0, 40.0, 40.0],
            landmarks: vec![(100.0, 100.0), (100.0, 140.0)],
            score: 0.9,
        };
        let (center, side, angle) = crop_from_palm(&palm);
        assert_eq!(center, (100.0, 120.0));
        assert!((side - 80.0 * 2.4).abs() < 1e-4);
        // Vertical spread maps to no rotation.
        assert!(angle.abs() < 1e-6);
    }
}
