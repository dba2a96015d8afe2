pub mod common;
mod hands;
pub mod palm;
mod segmentation;

pub use hands::OrtHandTracker;
pub use segmentation::OrtSegmenter;

use anyhow::Result;

use crate::types::{Frame, Hand, Mask};

/// Hand landmark detector. Returns up to two hands with normalized landmarks.
pub trait HandOracle {
    fn detect_hands(&mut self, frame: &Frame) -> Result<Vec<Hand>>;
}

/// Foreground segmentation. The mask must match the frame size.
pub trait SegmentationOracle {
    fn segment(&mut self, frame: &Frame) -> Result<Mask>;
}
