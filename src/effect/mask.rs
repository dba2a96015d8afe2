use rayon::prelude::*;

use crate::types::Mask;

/// Binarizes a probability mask and softens its edges.
#[derive(Clone, Debug)]
pub struct MaskRefiner {
    cutoff: f32,
    kernel: Vec<f32>,
}

impl MaskRefiner {
    /// `kernel_size` must be odd; 1 disables the blur.
    pub fn new(cutoff: f32, kernel_size: u32) -> Self {
        Self {
            cutoff,
            kernel: gaussian_kernel(kernel_size.max(1) as usize),
        }
    }

    pub fn refine(&self, raw: &Mask) -> Mask {
        let cutoff = self.cutoff;
        let binary: Vec<f32> = raw
            .data
            .par_iter()
            // NaN compares false and lands on 0.
            .map(|v| if *v >= cutoff { 1.0 } else { 0.0 })
            .collect();

        let mut mask = Mask {
            data: binary,
            width: raw.width,
            height: raw.height,
        };
        if self.kernel.len() > 1 && !mask.data.is_empty() {
            mask.data = self.blur(&mask);
        }
        mask
    }

    fn blur(&self, mask: &Mask) -> Vec<f32> {
        let width = mask.width as usize;
        let height = mask.height as usize;
        let radius = self.kernel.len() / 2;
        let kernel = &self.kernel;

        let mut horizontal = vec![0.0f32; mask.data.len()];
        horizontal
            .par_chunks_exact_mut(width)
            .zip(mask.data.par_chunks_exact(width))
            .for_each(|(out, src)| {
                for (x, value) in out.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (k, weight) in kernel.iter().enumerate() {
                        let sx = reflect_101(x as isize + k as isize - radius as isize, width);
                        acc += src[sx] * weight;
                    }
                    *value = acc;
                }
            });

        let mut vertical = vec![0.0f32; mask.data.len()];
        vertical
            .par_chunks_exact_mut(width)
            .enumerate()
            .for_each(|(y, out)| {
                for (x, value) in out.iter_mut().enumerate() {
                    let mut acc = 0.0;
                    for (k, weight) in kernel.iter().enumerate() {
                        let sy = reflect_101(y as isize + k as isize - radius as isize, height);
                        acc += horizontal[sy * width + x] * weight;
                    }
                    *value = acc;
                }
            });
        vertical
    }
}

/// Normalized 1-D Gaussian weights for an odd `size`.
pub fn gaussian_kernel(size: usize) -> Vec<f32> {
    match size {
        0 | 1 => return vec![1.0],
        3 => return vec![0.25, 0.5, 0.25],
        5 => return vec![0.0625, 0.25, 0.375, 0.25, 0.0625],
        7 => {
            return vec![
                0.03125, 0.109375, 0.21875, 0.28125, 0.21875, 0.109375, 0.03125,
            ];
        }
        _ => {}
    }

    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size / 2) as f64;
    let raw: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = raw.iter().sum();
    raw.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Border index without repeating the edge sample: `gfedcb|abcdefgh|gfedcba`.
fn reflect_101(idx: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let len = len as isize;
    let period = 2 * (len - 1);
    let mut i = idx.rem_euclid(period);
    if i >= len {
        i = period - i;
    }
    i as usize
}
