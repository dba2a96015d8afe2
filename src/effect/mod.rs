mod compositor;
mod mask;
mod placer;
mod tint;

pub use compositor::Compositor;
pub use mask::{MaskRefiner, gaussian_kernel};
pub use placer::{CloneLayer, ClonePlacer};
pub use tint::Tint;

use rayon::prelude::*;

use crate::{
    config::ShadowCloneConfig,
    gesture::SealDetector,
    pipeline::oracle::{HandOracle, SegmentationOracle},
    types::{Frame, FrameOutcome, Mask},
};

/// Mask refinement, clone placement, tint and compositing for one frame.
#[derive(Clone, Debug)]
pub struct CloneRenderer {
    refiner: MaskRefiner,
    placer: ClonePlacer,
    tint: Tint,
    compositor: Compositor,
}

impl CloneRenderer {
    pub fn new(refiner: MaskRefiner, placer: ClonePlacer, tint: Tint, compositor: Compositor) -> Self {
        Self {
            refiner,
            placer,
            tint,
            compositor,
        }
    }

    pub fn from_config(config: &ShadowCloneConfig) -> Self {
        Self::new(
            MaskRefiner::new(config.mask.cutoff, config.mask.blur_kernel),
            ClonePlacer::new(config.clone.offset),
            config.clone.tint,
            Compositor::new(config.clone.alpha),
        )
    }

    /// Render the clones for `frame`. A mask of the wrong size leaves the
    /// frame untouched.
    pub fn render(&self, frame: &Frame, raw_mask: &Mask) -> Frame {
        if let Err(err) = raw_mask.check_matches(frame) {
            log::warn!("skipping clone render: {err}");
            return frame.clone();
        }

        let subject = self.refiner.refine(raw_mask);
        let foreground = isolate_foreground(frame, &subject);
        let (mut left, mut right) = self.placer.place(&foreground, &subject);
        if left.is_blank() && right.is_blank() {
            return frame.clone();
        }
        self.tint.apply(&mut left.color);
        self.tint.apply(&mut right.color);

        self.compositor.composite(frame, &left, &right, &subject)
    }
}

/// Frame pixels scaled by the subject opacity, background at zero.
fn isolate_foreground(frame: &Frame, subject: &Mask) -> Vec<f32> {
    let mut foreground = vec![0.0f32; frame.bgr.len()];
    foreground
        .par_chunks_exact_mut(3)
        .zip(frame.bgr.par_chunks_exact(3))
        .zip(subject.data.par_iter())
        .for_each(|((dst, src), alpha)| {
            dst[0] = src[0] as f32 * alpha;
            dst[1] = src[1] as f32 * alpha;
            dst[2] = src[2] as f32 * alpha;
        });
    foreground
}

/// The whole effect: seal check, then clones while the seal is held.
pub struct ShadowClone<H, S> {
    detector: SealDetector,
    renderer: CloneRenderer,
    hands: H,
    segmenter: S,
}

impl<H: HandOracle, S: SegmentationOracle> ShadowClone<H, S> {
    pub fn new(detector: SealDetector, renderer: CloneRenderer, hands: H, segmenter: S) -> Self {
        Self {
            detector,
            renderer,
            hands,
            segmenter,
        }
    }

    pub fn from_config(config: &ShadowCloneConfig, hands: H, segmenter: S) -> Self {
        Self::new(
            SealDetector::from_config(&config.gesture),
            CloneRenderer::from_config(config),
            hands,
            segmenter,
        )
    }

    pub fn process(&mut self, frame: &Frame) -> FrameOutcome {
        let hands = match self.hands.detect_hands(frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("hand detection failed: {err:#}");
                Vec::new()
            }
        };

        if !self.detector.is_active(&hands) {
            return FrameOutcome {
                active: false,
                frame: frame.clone(),
                hands,
            };
        }

        let raw_mask = match self.segmenter.segment(frame) {
            Ok(mask) => mask,
            Err(err) => {
                log::warn!("segmentation failed: {err:#}");
                Mask::zeros(frame.width, frame.height)
            }
        };

        FrameOutcome {
            active: true,
            frame: self.renderer.render(frame, &raw_mask),
            hands,
        }
    }
}
