use rayon::prelude::*;

use crate::types::Mask;

/// Shifted float copy of the foreground plus its matching opacity.
#[derive(Clone, Debug, PartialEq)]
pub struct CloneLayer {
    /// Interleaved BGR, may exceed 255 after tinting.
    pub color: Vec<f32>,
    pub mask: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl CloneLayer {
    pub fn empty(width: u32, height: u32) -> Self {
        let pixels = width as usize * height as usize;
        Self {
            color: vec![0.0; pixels * 3],
            mask: vec![0.0; pixels],
            width,
            height,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.mask.iter().all(|v| *v == 0.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Left,
    Right,
}

#[derive(Clone, Copy, Debug)]
pub struct ClonePlacer {
    offset: u32,
}

impl ClonePlacer {
    pub fn new(offset: u32) -> Self {
        Self { offset }
    }

    /// Build the left and right clones from `foreground` (BGR floats with
    /// background already zeroed) and its refined `mask`.
    pub fn place(&self, foreground: &[f32], mask: &Mask) -> (CloneLayer, CloneLayer) {
        (
            self.shift(foreground, mask, Direction::Left),
            self.shift(foreground, mask, Direction::Right),
        )
    }

    fn shift(&self, foreground: &[f32], mask: &Mask, direction: Direction) -> CloneLayer {
        let mut layer = CloneLayer::empty(mask.width, mask.height);
        let width = mask.width as usize;
        let off = self.offset as usize;
        if off >= width {
            return layer;
        }

        let span = width - off;
        let (src_start, dst_start) = match direction {
            Direction::Left => (off, 0),
            Direction::Right => (0, off),
        };

        layer
            .color
            .par_chunks_exact_mut(width * 3)
            .zip(layer.mask.par_chunks_exact_mut(width))
            .zip(foreground.par_chunks_exact(width * 3))
            .zip(mask.data.par_chunks_exact(width))
            .for_each(|(((color_out, mask_out), color_in), mask_in)| {
                color_out[dst_start * 3..(dst_start + span) * 3]
                    .copy_from_slice(&color_in[src_start * 3..(src_start + span) * 3]);
                mask_out[dst_start..dst_start + span]
                    .copy_from_slice(&mask_in[src_start..src_start + span]);
            });
        layer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column_ramp(width: u32, height: u32) -> (Vec<f32>, Mask) {
        let mut color = Vec::new();
        let mut alpha = Vec::new();
        for _ in 0..height {
            for x in 0..width {
                color.extend_from_slice(&[x as f32, x as f32, x as f32]);
                alpha.push(1.0);
            }
        }
        (color, Mask::new(width, height, alpha).unwrap())
    }

    #[test]
    fn shifts_clip_without_wrapping() {
        let (color, mask) = column_ramp(5, 2);
        let (left, right) = ClonePlacer::new(2).place(&color, &mask);

        let left_row: Vec<f32> = left.color[..15].iter().step_by(3).copied().collect();
        assert_eq!(left_row, vec![2.0, 3.0, 4.0, 0.0, 0.0]);
        assert_eq!(&left.mask[..5], &[1.0, 1.0, 1.0, 0.0, 0.0]);

        let right_row: Vec<f32> = right.color[..15].iter().step_by(3).copied().collect();
        assert_eq!(right_row, vec![0.0, 0.0, 0.0, 1.0, 2.0]);
        assert_eq!(&right.mask[5..10], &[0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn zero_offset_copies_source() {
        let (color, mask) = column_ramp(4, 3);
        let (left, right) = ClonePlacer::new(0).place(&color, &mask);
        assert_eq!(left.color, color);
        assert_eq!(right.color, color);
        assert_eq!(left.mask, mask.data);
        assert_eq!(right.mask, mask.data);
    }

    #[test]
    fn offset_past_width_gives_blank_layers() {
        let (color, mask) = column_ramp(4, 3);
        for offset in [4, 5, 10_000] {
            let (left, right) = ClonePlacer::new(offset).place(&color, &mask);
            assert!(left.is_blank() && right.is_blank());
            assert!(left.color.iter().all(|v| *v == 0.0));
            assert!(right.color.iter().all(|v| *v == 0.0));
        }
    }
}
