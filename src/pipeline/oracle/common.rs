use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, NUM_HAND_LANDMARKS};

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;

#[derive(Clone, Debug)]
pub struct LetterboxInfo {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub orig_w: u32,
    pub orig_h: u32,
}

#[derive(Clone, Debug)]
pub struct CropTransform {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub output_size: u32,
    pub orig_w: u32,
    pub orig_h: u32,
}

fn resize_rgb(frame: &Frame, width: u32, height: u32) -> Result<Vec<u8>> {
    let src_image =
        fir::images::Image::from_vec_u8(frame.width, frame.height, frame.to_rgb(), fir::PixelType::U8x3)?;
    let mut dst_image = fir::images::Image::new(width, height, fir::PixelType::U8x3);
    let mut resizer = fir::Resizer::new();
    let resize_options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&resize_options))
        .context("fast resize failed")?;
    Ok(dst_image.into_vec())
}

fn to_nhwc_tensor(rgb: &[u8], width: u32, height: u32) -> Result<Array4<f32>> {
    let normalized: Vec<f32> = rgb.par_iter().map(|v| *v as f32 / 255.0).collect();
    Array4::<f32>::from_shape_vec((1, height as usize, width as usize, 3), normalized)
        .map_err(|err| anyhow!("failed to build input tensor: {err}"))
}

/// Aspect-preserving resize into a square, centred on a black canvas.
pub fn prepare_letterboxed(frame: &Frame, target_size: u32) -> Result<(Array4<f32>, LetterboxInfo)> {
    if frame.width == 0 || frame.height == 0 {
        return Err(anyhow!("cannot letterbox an empty frame"));
    }

    let scale = target_size as f32 / (frame.width.max(frame.height) as f32);
    let new_w = ((frame.width as f32 * scale).round().max(1.0) as u32).min(target_size);
    let new_h = ((frame.height as f32 * scale).round().max(1.0) as u32).min(target_size);
    let resized = resize_rgb(frame, new_w, new_h)?;

    let pad_x = ((target_size - new_w) / 2) as usize;
    let pad_y = ((target_size - new_h) / 2) as usize;
    let mut canvas = vec![0u8; (target_size as usize) * (target_size as usize) * 3];
    let dst_stride = target_size as usize * 3;
    let src_stride = new_w as usize * 3;
    for row in 0..(new_h as usize) {
        let dst_offset = (pad_y + row) * dst_stride + pad_x * 3;
        let src_offset = row * src_stride;
        canvas[dst_offset..dst_offset + src_stride]
            .copy_from_slice(&resized[src_offset..src_offset + src_stride]);
    }

    let input = to_nhwc_tensor(&canvas, target_size, target_size)?;
    let letterbox = LetterboxInfo {
        scale,
        pad_x: pad_x as f32,
        pad_y: pad_y as f32,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((input, letterbox))
}

/// Plain resize to the model size, aspect ratio ignored.
pub fn prepare_stretched(frame: &Frame, width: u32, height: u32) -> Result<Array4<f32>> {
    if frame.width == 0 || frame.height == 0 {
        return Err(anyhow!("cannot resize an empty frame"));
    }
    let resized = resize_rgb(frame, width, height)?;
    to_nhwc_tensor(&resized, width, height)
}

pub fn decode_landmarks(flat: &[f32]) -> Result<Vec<[f32; 3]>> {
    if flat.len() < NUM_HAND_LANDMARKS * 3 {
        return Err(anyhow!(
            "unexpected landmarks length: got {}, need {}",
            flat.len(),
            NUM_HAND_LANDMARKS * 3
        ));
    }

    Ok(flat
        .chunks_exact(3)
        .take(NUM_HAND_LANDMARKS)
        .map(|chunk| [chunk[0], chunk[1], chunk[2]])
        .collect())
}

pub fn prepare_rotated_crop(
    frame: &Frame,
    center: (f32, f32),
    side: f32,
    angle: f32,
    output_size: u32,
) -> Result<(Array4<f32>, CropTransform)> {
    let half = output_size as f32 / 2.0;
    let scale = side / output_size as f32;
    let cos = angle.cos();
    let sin = angle.sin();
    let row_len = output_size as usize * 3;

    let mut data = vec![0.0f32; output_size as usize * row_len];
    data.par_chunks_exact_mut(row_len)
        .enumerate()
        .for_each(|(y, row)| {
            let dy = (y as f32 + 0.5 - half) * scale;
            for (x, px) in row.chunks_exact_mut(3).enumerate() {
                let dx = (x as f32 + 0.5 - half) * scale;
                let src_x = center.0 + dx * cos - dy * sin;
                let src_y = center.1 + dx * sin + dy * cos;
                px.copy_from_slice(&sample_rgb(frame, src_x, src_y));
            }
        });

    let array =
        Array4::<f32>::from_shape_vec((1, output_size as usize, output_size as usize, 3), data)
            .map_err(|err| anyhow!("failed to build rotated crop tensor: {err}"))?;

    let transform = CropTransform {
        center,
        side,
        angle,
        output_size,
        orig_w: frame.width,
        orig_h: frame.height,
    };

    Ok((array, transform))
}

impl CropTransform {
    /// Map a point in crop pixels back to frame pixels.
    pub fn project(&self, x: f32, y: f32) -> (f32, f32) {
        let half = self.output_size as f32 / 2.0;
        let scale = self.side / self.output_size as f32;
        let dx = (x - half) * scale;
        let dy = (y - half) * scale;
        let cos = self.angle.cos();
        let sin = self.angle.sin();
        let ox = self.center.0 + dx * cos - dy * sin;
        let oy = self.center.1 + dx * sin + dy * cos;
        (
            ox.clamp(0.0, (self.orig_w.saturating_sub(1)) as f32),
            oy.clamp(0.0, (self.orig_h.saturating_sub(1)) as f32),
        )
    }
}

/// Bilinear RGB sample in `[0, 1]`; outside the frame reads as black.
fn sample_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if x.is_nan() || y.is_nan() {
        return [0.0, 0.0, 0.0];
    }
    let x0 = x.floor();
    let y0 = y.floor();

    let (w, h) = (frame.width as i64, frame.height as i64);
    let fetch = |cx: f32, cy: f32| -> [f32; 3] {
        let ix = cx as i64;
        let iy = cy as i64;
        if ix < 0 || iy < 0 || ix >= w || iy >= h {
            return [0.0, 0.0, 0.0];
        }
        let idx = (iy as usize * frame.width as usize + ix as usize) * 3;
        [
            frame.bgr[idx + 2] as f32 / 255.0,
            frame.bgr[idx + 1] as f32 / 255.0,
            frame.bgr[idx] as f32 / 255.0,
        ]
    };

    let fx = x - x0;
    let fy = y - y0;
    let c00 = fetch(x0, y0);
    let c10 = fetch(x0 + 1.0, y0);
    let c01 = fetch(x0, y0 + 1.0);
    let c11 = fetch(x0 + 1.0, y0 + 1.0);

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;
    [
        lerp(lerp(c00[0], c10[0], fx), lerp(c01[0], c11[0], fx), fy),
        lerp(lerp(c00[1], c10[1], fx), lerp(c01[1], c11[1], fx), fy),
        lerp(lerp(c00[2], c10[2], fx), lerp(c01[2], c11[2], fx), fy),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_pads_the_short_side() {
        let frame = Frame::filled(64, 32, [0, 0, 255]);
        let (input, info) = prepare_letterboxed(&frame, 32).unwrap();
        assert_eq!(input.shape(), &[1, 32, 32, 3]);
        assert_eq!(info.scale, 0.5);
        assert_eq!(info.pad_x, 0.0);
        assert_eq!(info.pad_y, 8.0);
        // Padding row stays black, content row is red in RGB order.
        assert_eq!(input[[0, 0, 0, 0]], 0.0);
        assert_eq!(input[[0, 16, 16, 0]], 1.0);
        assert_eq!(input[[0, 16, 16, 2]], 0.0);
    }

    #[test]
    fn stretched_input_has_model_shape() {
        let frame = Frame::filled(40, 30, [255, 0, 0]);
        let input = prepare_stretched(&frame, 16, 9).unwrap();
        assert_eq!(input.shape(), &[1, 9, 16, 3]);
        assert_eq!(input[[0, 4, 8, 2]], 1.0);
    }

    #[test]
    fn crop_projection_round_trips_centre() {
        let transform = CropTransform {
            center: (100.0, 80.0),
            side: 50.0,
            angle: 0.7,
            output_size: 224,
            orig_w: 640,
            orig_h: 480,
        };
        let (x, y) = transform.project(112.0, 112.0);
        assert!((x - 100.0).abs() < 1e-4);
        assert!((y - 80.0).abs() < 1e-4);
    }

    #[test]
    fn decode_landmarks_needs_full_hand() {
        assert!(decode_landmarks(&[0.0; 10]).is_err());
        let flat: Vec<f32> = (0..63).map(|v| v as f32).collect();
        let landmarks = decode_landmarks(&flat).unwrap();
        assert_eq!(landmarks.len(), NUM_HAND_LANDMARKS);
        assert_eq!(landmarks[20], [60.0, 61.0, 62.0]);
    }
}
