use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    HandOracle,
    common::{self, HANDPOSE_INPUT_SIZE},
    palm::{PalmDetector, PalmDetectorConfig, PalmRegion, crop_from_palm},
};
use crate::types::{Frame, Hand, Handedness, Landmark};

const MIN_HAND_CONFIDENCE: f32 = 0.5;

/// Palm detector followed by the handpose estimator on each palm crop.
pub struct OrtHandTracker {
    handpose: Session,
    palm_detector: PalmDetector,
}

impl OrtHandTracker {
    pub fn new(
        handpose_model: &Path,
        palm_model: &Path,
        max_hands: usize,
        palm_score_threshold: f32,
    ) -> Result<Self> {
        let handpose = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(handpose_model)
            .with_context(|| {
                format!("failed to load handpose model from {}", handpose_model.display())
            })?;

        let palm_detector = PalmDetector::new(
            palm_model,
            PalmDetectorConfig {
                score_threshold: palm_score_threshold,
                top_k: max_hands,
                ..PalmDetectorConfig::default()
            },
        )?;

        Ok(Self {
            handpose,
            palm_detector,
        })
    }

    fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<Option<Hand>> {
        let (center, side, angle) = crop_from_palm(palm);
        let (input, transform) =
            common::prepare_rotated_crop(frame, center, side, angle, HANDPOSE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .handpose
            .run(ort::inputs![tensor])
            .context("failed to run handpose session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("handpose model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let raw = common::decode_landmarks(&flattened)?;

        let first_scalar = |idx: usize| {
            if outputs.len() <= idx {
                return 0.0;
            }
            outputs[idx]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        };
        let confidence = first_scalar(1);
        let handedness = first_scalar(2);

        if confidence < MIN_HAND_CONFIDENCE {
            return Ok(None);
        }

        let (w, h) = (frame.width as f32, frame.height as f32);
        let landmarks = raw
            .iter()
            .map(|[x, y, _z]| {
                let (px, py) = transform.project(*x, *y);
                Landmark::new(px / w, py / h)
            })
            .collect();

        Ok(Some(Hand {
            landmarks,
            handedness: Handedness::from_score(handedness),
            score: (confidence * palm.score).clamp(0.0, 1.0),
        }))
    }
}

impl HandOracle for OrtHandTracker {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<Hand>> {
        let palms = self.palm_detector.detect(frame)?;
        Ok(collect_hands(&palms, |palm| self.estimate(frame, palm)))
    }
}

/// Run `estimate` on every palm. A crop that fails is logged and skipped so
/// the other hands survive.
fn collect_hands<P>(palms: &[P], mut estimate: impl FnMut(&P) -> Result<Option<Hand>>) -> Vec<Hand> {
    let mut hands = Vec::with_capacity(palms.len());
    for (idx, palm) in palms.iter().enumerate() {
        match estimate(palm) {
            Ok(Some(hand)) => hands.push(hand),
            Ok(None) => {}
            Err(err) => log::warn!("handpose failed on palm {idx}: {err:#}"),
        }
    }
    hands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NUM_HAND_LANDMARKS;

    fn hand_at(x: f32) -> Hand {
        Hand::new(vec![Landmark::new(x, 0.5); NUM_HAND_LANDMARKS])
    }

    #[test]
    fn failing_crop_keeps_other_hands() {
        let palms = [0.2f32, 0.5, 0.8];
        let hands = collect_hands(&palms, |&x| {
            if x == 0.5 {
                Err(anyhow!("crop out of bounds"))
            } else {
                Ok(Some(hand_at(x)))
            }
        });

        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].landmarks[0].x, 0.2);
        assert_eq!(hands[1].landmarks[0].x, 0.8);
    }

    #[test]
    fn low_confidence_palms_are_dropped_quietly() {
        let palms = [0.1f32, 0.9];
        let hands = collect_hands(&palms, |&x| Ok((x > 0.5).then(|| hand_at(x))));
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].landmarks[0].x, 0.9);
    }
}
