use rayon::prelude::*;

use super::CloneLayer;
use crate::types::{Frame, Mask};

/// Layers the clones behind the real subject.
#[derive(Clone, Copy, Debug)]
pub struct Compositor {
    alpha: f32,
}

impl Compositor {
    pub fn new(alpha: f32) -> Self {
        Self { alpha }
    }

    /// Blend order: frame, left clone, right clone, then the subject again on top.
    pub fn composite(
        &self,
        frame: &Frame,
        left: &CloneLayer,
        right: &CloneLayer,
        subject: &Mask,
    ) -> Frame {
        let width = frame.width as usize;
        let mut out = vec![0u8; frame.bgr.len()];
        if width == 0 || out.is_empty() {
            return frame.clone();
        }
        let alpha = self.alpha;

        out.par_chunks_exact_mut(width * 3)
            .enumerate()
            .for_each(|(y, row)| {
                let row_start = y * width;
                for x in 0..width {
                    let p = row_start + x;
                    let w_left = left.mask[p] * alpha;
                    let w_right = right.mask[p] * alpha;
                    let w_subject = subject.data[p];
                    for c in 0..3 {
                        let original = frame.bgr[p * 3 + c] as f32;
                        let mut value = original;
                        value = blend(value, left.color[p * 3 + c], w_left);
                        value = blend(value, right.color[p * 3 + c], w_right);
                        value = blend(value, original, w_subject);
                        row[x * 3 + c] = value.clamp(0.0, 255.0).round() as u8;
                    }
                }
            });

        Frame {
            bgr: out,
            width: frame.width,
            height: frame.height,
            timestamp: frame.timestamp,
        }
    }
}

fn blend(base: f32, layer: f32, weight: f32) -> f32 {
    base * (1.0 - weight) + layer * weight
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_layers_and_mask_reproduce_input() {
        let frame = Frame::new(2, 2, (0..12).map(|v| v * 20).collect()).unwrap();
        let blank = CloneLayer::empty(2, 2);
        let out = Compositor::new(0.7).composite(&frame, &blank, &blank, &Mask::zeros(2, 2));
        assert_eq!(out.bgr, frame.bgr);
    }

    #[test]
    fn clone_blends_by_alpha_and_clamps() {
        let frame = Frame::filled(1, 1, [100, 100, 100]);
        let mut left = CloneLayer::empty(1, 1);
        left.color = vec![600.0, 0.0, 200.0];
        left.mask = vec![1.0];
        let right = CloneLayer::empty(1, 1);

        let out = Compositor::new(0.5).composite(&frame, &left, &right, &Mask::zeros(1, 1));
        assert_eq!(out.bgr, vec![255, 50, 150]);
    }

    #[test]
    fn subject_is_restored_over_clones() {
        let frame = Frame::filled(1, 1, [10, 20, 30]);
        let mut left = CloneLayer::empty(1, 1);
        left.color = vec![255.0, 255.0, 255.0];
        left.mask = vec![1.0];
        let right = left.clone();

        let out = Compositor::new(1.0).composite(&frame, &left, &right, &Mask::filled(1, 1, 1.0));
        assert_eq!(out.bgr, vec![10, 20, 30]);
    }

    #[test]
    fn rounds_to_nearest() {
        let frame = Frame::filled(1, 1, [0, 0, 0]);
        let mut left = CloneLayer::empty(1, 1);
        left.color = vec![3.0, 1.0, 0.0];
        left.mask = vec![1.0];
        let right = CloneLayer::empty(1, 1);

        let out = Compositor::new(0.5).composite(&frame, &left, &right, &Mask::zeros(1, 1));
        assert_eq!(out.bgr, vec![2, 1, 0]);
    }
}
