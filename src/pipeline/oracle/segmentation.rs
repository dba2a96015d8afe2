use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{SegmentationOracle, common};
use crate::types::{Frame, Mask};

/// Selfie segmentation: person probability per pixel.
pub struct OrtSegmenter {
    session: Session,
    input_width: u32,
    input_height: u32,
}

impl OrtSegmenter {
    pub fn new(model_path: &Path, input_width: u32, input_height: u32) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!(
                    "failed to load segmentation model from {}",
                    model_path.display()
                )
            })?;

        Ok(Self {
            session,
            input_width,
            input_height,
        })
    }
}

impl SegmentationOracle for OrtSegmenter {
    fn segment(&mut self, frame: &Frame) -> Result<Mask> {
        let input = common::prepare_stretched(frame, self.input_width, self.input_height)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run segmentation session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("segmentation model returned no outputs"));
        }

        let scores = outputs[0].try_extract_array::<f32>()?;
        let data: Vec<f32> = scores.iter().map(|v| v.clamp(0.0, 1.0)).collect();
        let mask = model_mask(scores.shape(), data, self.input_width, self.input_height)?;

        Ok(mask.resize_bilinear(frame.width, frame.height))
    }
}

/// Accept `[1, H, W, 1]`, `[1, 1, H, W]` or `[1, H, W]` layouts; anything else is rejected.
fn model_mask(shape: &[usize], data: Vec<f32>, width: u32, height: u32) -> Result<Mask> {
    let (w, h) = (width as usize, height as usize);
    let layout_ok = matches!(
        shape,
        [1, sh, sw, 1] | [1, 1, sh, sw] | [1, sh, sw] if (*sh, *sw) == (h, w)
    );
    if !layout_ok {
        return Err(anyhow!(
            "segmentation output shape {shape:?} does not match {width}x{height}"
        ));
    }

    let len = data.len();
    Mask::new(width, height, data).map_err(|_| {
        anyhow!("segmentation output has {len} values, expected {width}x{height}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_mask_accepts_known_layouts() {
        assert!(model_mask(&[1, 9, 16, 1], vec![0.5; 16 * 9], 16, 9).is_ok());
        assert!(model_mask(&[1, 1, 9, 16], vec![0.5; 16 * 9], 16, 9).is_ok());
        assert!(model_mask(&[1, 9, 16], vec![0.5; 16 * 9], 16, 9).is_ok());
    }

    #[test]
    fn model_mask_rejects_transposed_or_short_output() {
        // Same element count, width and height swapped.
        assert!(model_mask(&[1, 16, 9, 1], vec![0.5; 16 * 9], 16, 9).is_err());
        assert!(model_mask(&[1, 2, 9, 16], vec![0.5; 2 * 16 * 9], 16, 9).is_err());
        assert!(model_mask(&[1, 9, 16, 1], vec![0.5; 10], 16, 9).is_err());
    }
}
