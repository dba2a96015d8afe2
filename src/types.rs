use std::time::Instant;

use rayon::prelude::*;
use thiserror::Error;

pub const NUM_HAND_LANDMARKS: usize = 21;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame buffer size mismatch: got {actual}, expected {expected} for {width}x{height}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("mask is {mask_width}x{mask_height} but frame is {frame_width}x{frame_height}")]
    MaskSize {
        mask_width: u32,
        mask_height: u32,
        frame_width: u32,
        frame_height: u32,
    },
}

/// Interleaved 8-bit colour frame in blue, green, red order.
#[derive(Clone, Debug)]
pub struct Frame {
    pub bgr: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(width: u32, height: u32, bgr: Vec<u8>) -> Result<Self, FrameError> {
        let expected = pixel_count(width, height) * 3;
        if bgr.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                expected,
                actual: bgr.len(),
            });
        }

        Ok(Self {
            bgr,
            width,
            height,
            timestamp: Instant::now(),
        })
    }

    pub fn filled(width: u32, height: u32, color: [u8; 3]) -> Self {
        let bgr = color
            .iter()
            .copied()
            .cycle()
            .take(pixel_count(width, height) * 3)
            .collect();
        Self {
            bgr,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    pub fn pixel_count(&self) -> usize {
        pixel_count(self.width, self.height)
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.bgr[idx], self.bgr[idx + 1], self.bgr[idx + 2]])
    }

    /// Mirror left to right in place (selfie view).
    pub fn mirror_horizontal(&mut self) {
        let row_len = self.width as usize * 3;
        if row_len == 0 {
            return;
        }
        self.bgr.par_chunks_exact_mut(row_len).for_each(|row| {
            let mut left = 0;
            let mut right = row.len() / 3;
            while left + 1 < right {
                right -= 1;
                for c in 0..3 {
                    row.swap(left * 3 + c, right * 3 + c);
                }
                left += 1;
            }
        });
    }

    pub fn to_rgb(&self) -> Vec<u8> {
        let mut rgb = vec![0u8; self.bgr.len()];
        rgb.par_chunks_exact_mut(3)
            .zip(self.bgr.par_chunks_exact(3))
            .for_each(|(dst, src)| {
                dst[0] = src[2];
                dst[1] = src[1];
                dst[2] = src[0];
            });
        rgb
    }
}

/// Single-channel opacity or probability grid, values in `[0, 1]`.
#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl Mask {
    pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, FrameError> {
        let expected = pixel_count(width, height);
        if data.len() != expected {
            return Err(FrameError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn zeros(width: u32, height: u32) -> Self {
        Self::filled(width, height, 0.0)
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Self {
        Self {
            data: vec![value; pixel_count(width, height)],
            width,
            height,
        }
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn check_matches(&self, frame: &Frame) -> Result<(), FrameError> {
        if self.width == frame.width && self.height == frame.height {
            Ok(())
        } else {
            Err(FrameError::MaskSize {
                mask_width: self.width,
                mask_height: self.height,
                frame_width: frame.width,
                frame_height: frame.height,
            })
        }
    }

    /// Bilinear resample with pixel-centre alignment.
    pub fn resize_bilinear(&self, width: u32, height: u32) -> Mask {
        if width == self.width && height == self.height {
            return self.clone();
        }
        if self.width == 0 || self.height == 0 {
            return Mask::zeros(width, height);
        }

        let sx = self.width as f32 / width.max(1) as f32;
        let sy = self.height as f32 / height.max(1) as f32;
        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let src_w = self.width as usize;

        let mut data = vec![0.0f32; pixel_count(width, height)];
        if width == 0 {
            return Mask {
                data,
                width,
                height,
            };
        }
        data.par_chunks_exact_mut(width as usize)
            .enumerate()
            .for_each(|(y, row)| {
                let fy = ((y as f32 + 0.5) * sy - 0.5).clamp(0.0, max_y);
                let y0 = fy.floor() as usize;
                let y1 = (y0 + 1).min(self.height as usize - 1);
                let ty = fy - y0 as f32;
                for (x, out) in row.iter_mut().enumerate() {
                    let fx = ((x as f32 + 0.5) * sx - 0.5).clamp(0.0, max_x);
                    let x0 = fx.floor() as usize;
                    let x1 = (x0 + 1).min(src_w - 1);
                    let tx = fx - x0 as f32;
                    let top = lerp(self.data[y0 * src_w + x0], self.data[y0 * src_w + x1], tx);
                    let bottom = lerp(self.data[y1 * src_w + x0], self.data[y1 * src_w + x1], tx);
                    *out = lerp(top, bottom, ty);
                }
            });

        Mask {
            data,
            width,
            height,
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

fn pixel_count(width: u32, height: u32) -> usize {
    width as usize * height as usize
}

/// Hand keypoint in coordinates normalized to the frame size.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Landmark) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn to_pixel(&self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Fingertips the seal check reads from the 21-point hand topology.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LandmarkRole {
    IndexTip,
    MiddleTip,
}

impl LandmarkRole {
    pub fn index(self) -> usize {
        match self {
            LandmarkRole::IndexTip => 8,
            LandmarkRole::MiddleTip => 12,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else if score > 0.0 {
            Handedness::Left
        } else {
            Handedness::Unknown
        }
    }
}

#[derive(Clone, Debug)]
pub struct Hand {
    pub landmarks: Vec<Landmark>,
    pub handedness: Handedness,
    pub score: f32,
}

impl Hand {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self {
            landmarks,
            handedness: Handedness::Unknown,
            score: 1.0,
        }
    }

    pub fn landmark(&self, role: LandmarkRole) -> Option<Landmark> {
        self.landmarks.get(role.index()).copied()
    }

    pub fn index_tip(&self) -> Option<Landmark> {
        self.landmark(LandmarkRole::IndexTip)
    }

    pub fn middle_tip(&self) -> Option<Landmark> {
        self.landmark(LandmarkRole::MiddleTip)
    }
}

/// Result of one pass through the shadow clone pipeline.
#[derive(Clone, Debug)]
pub struct FrameOutcome {
    pub active: bool,
    pub frame: Frame,
    pub hands: Vec<Hand>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_wrong_buffer_size() {
        let err = Frame::new(4, 2, vec![0; 10]).unwrap_err();
        assert_eq!(
            err,
            FrameError::BufferSize {
                width: 4,
                height: 2,
                expected: 24,
                actual: 10
            }
        );
    }

    #[test]
    fn mirror_swaps_columns() {
        let mut frame = Frame::new(3, 1, vec![1, 1, 1, 2, 2, 2, 3, 3, 3]).unwrap();
        frame.mirror_horizontal();
        assert_eq!(frame.bgr, vec![3, 3, 3, 2, 2, 2, 1, 1, 1]);
    }

    #[test]
    fn to_rgb_swaps_blue_and_red() {
        let frame = Frame::new(1, 1, vec![10, 20, 30]).unwrap();
        assert_eq!(frame.to_rgb(), vec![30, 20, 10]);
    }

    #[test]
    fn resize_keeps_constant_mask_constant() {
        let mask = Mask::filled(4, 4, 0.75);
        let resized = mask.resize_bilinear(10, 7);
        assert_eq!(resized.width, 10);
        assert_eq!(resized.height, 7);
        assert!(resized.data.iter().all(|v| (v - 0.75).abs() < 1e-6));
    }

    #[test]
    fn resize_interpolates_between_halves() {
        let mask = Mask::new(2, 1, vec![0.0, 1.0]).unwrap();
        let resized = mask.resize_bilinear(4, 1);
        assert_eq!(resized.data[0], 0.0);
        assert_eq!(resized.data[3], 1.0);
        assert!(resized.data[1] > 0.0 && resized.data[1] < resized.data[2]);
    }

    #[test]
    fn hand_exposes_tip_roles() {
        let mut points = vec![Landmark::default(); NUM_HAND_LANDMARKS];
        points[8] = Landmark::new(0.1, 0.2);
        points[12] = Landmark::new(0.3, 0.4);
        let hand = Hand::new(points);
        assert_eq!(hand.index_tip(), Some(Landmark::new(0.1, 0.2)));
        assert_eq!(hand.middle_tip(), Some(Landmark::new(0.3, 0.4)));
        assert_eq!(Hand::new(Vec::new()).index_tip(), None);
    }
}
