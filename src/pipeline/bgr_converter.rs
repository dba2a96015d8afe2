use anyhow::{Context, Result, anyhow};
use nokhwa::{Buffer, utils::FrameFormat};
use rayon::prelude::*;
use yuv::{
    YuvBiPlanarImage, YuvConversionMode, YuvPackedImage, YuvRange, YuvStandardMatrix,
    yuv_nv12_to_rgba, yuyv422_to_rgba,
};
use zune_jpeg::{
    JpegDecoder,
    zune_core::{bytestream::ZCursor, colorspace::ColorSpace, options::DecoderOptions},
};

use crate::types::Frame;

/// Decoded camera frame plus the channel count the device delivered.
#[derive(Debug)]
pub struct DecodedFrame {
    pub frame: Frame,
    pub source_channels: u8,
}

impl DecodedFrame {
    /// Single-channel sources are usually IR sensors.
    pub fn is_grayscale(&self) -> bool {
        self.source_channels == 1
    }
}

pub fn convert_camera_frame(buffer: &Buffer) -> Result<DecodedFrame> {
    let resolution = buffer.resolution();
    let width = resolution.width_x;
    let height = resolution.height_y;
    let data = buffer.buffer();

    let (width, height, bgr, source_channels) = match buffer.source_frame_format() {
        FrameFormat::NV12 => (width, height, nv12_to_bgr(data, width, height)?, 3),
        FrameFormat::YUYV => (width, height, yuyv_to_bgr(data, width, height)?, 3),
        FrameFormat::MJPEG => {
            let (w, h, bgr) = mjpeg_to_bgr(data, width, height)?;
            (w, h, bgr, 3)
        }
        FrameFormat::RAWRGB => (width, height, raw_to_bgr(data, width, height, true)?, 3),
        FrameFormat::RAWBGR => (width, height, raw_to_bgr(data, width, height, false)?, 3),
        FrameFormat::GRAY => (width, height, gray_to_bgr(data, width, height)?, 1),
    };

    let frame = Frame::new(width, height, bgr).context("decoded frame has wrong size")?;
    Ok(DecodedFrame {
        frame,
        source_channels,
    })
}

fn nv12_to_bgr(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let y_plane_len = width as usize * height as usize;
    let uv_plane_len = y_plane_len / 2;

    if data.len() < y_plane_len + uv_plane_len {
        return Err(anyhow!(
            "NV12 buffer too small: got {}, expected {}",
            data.len(),
            y_plane_len + uv_plane_len
        ));
    }

    let image = YuvBiPlanarImage {
        y_plane: &data[..y_plane_len],
        y_stride: width,
        uv_plane: &data[y_plane_len..y_plane_len + uv_plane_len],
        uv_stride: width,
        width,
        height,
    };
    let mut rgba = vec![0u8; y_plane_len * 4];
    yuv_nv12_to_rgba(
        &image,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
        YuvConversionMode::Balanced,
    )
    .map_err(|err| anyhow!("NV12 decode failed: {err:?}"))?;

    Ok(rgba_to_bgr(&rgba))
}

fn yuyv_to_bgr(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 2;
    if data.len() < expected_len {
        return Err(anyhow!(
            "YUYV buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let packed = YuvPackedImage {
        yuy: data,
        yuy_stride: width * 2,
        width,
        height,
    };
    let mut rgba = vec![0u8; width as usize * height as usize * 4];
    yuyv422_to_rgba(
        &packed,
        &mut rgba,
        width * 4,
        YuvRange::Full,
        YuvStandardMatrix::Bt709,
    )
    .map_err(|err| anyhow!("YUYV decode failed: {err:?}"))?;

    Ok(rgba_to_bgr(&rgba))
}

/// Returns the decoded size, which wins over the size the driver reported.
fn mjpeg_to_bgr(data: &[u8], width: u32, height: u32) -> Result<(u32, u32, Vec<u8>)> {
    let options = DecoderOptions::default().jpeg_set_out_colorspace(ColorSpace::RGB);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(data), options);
    let mut pixels = decoder
        .decode()
        .map_err(|err| anyhow!("MJPEG decode failed: {err:?}"))?;

    let (width, height) = decoder
        .info()
        .and_then(|info| Some((u32::try_from(info.width).ok()?, u32::try_from(info.height).ok()?)))
        .unwrap_or((width, height));
    let expected_len = width as usize * height as usize * 3;
    if pixels.len() < expected_len {
        return Err(anyhow!(
            "MJPEG decode produced too few bytes: got {}, expected {}",
            pixels.len(),
            expected_len
        ));
    }
    pixels.truncate(expected_len);
    swap_red_blue(&mut pixels);

    Ok((width, height, pixels))
}

fn raw_to_bgr(data: &[u8], width: u32, height: u32, swap: bool) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize * 3;
    if data.len() < expected_len {
        return Err(anyhow!(
            "RGB buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut bgr = data[..expected_len].to_vec();
    if swap {
        swap_red_blue(&mut bgr);
    }
    Ok(bgr)
}

fn gray_to_bgr(data: &[u8], width: u32, height: u32) -> Result<Vec<u8>> {
    let expected_len = width as usize * height as usize;
    if data.len() < expected_len {
        return Err(anyhow!(
            "GRAY buffer too small: got {}, expected {}",
            data.len(),
            expected_len
        ));
    }

    let mut bgr = vec![0u8; expected_len * 3];
    bgr.par_chunks_exact_mut(3)
        .zip(data[..expected_len].par_iter().copied())
        .for_each(|(dst, value)| dst.fill(value));
    Ok(bgr)
}

fn rgba_to_bgr(rgba: &[u8]) -> Vec<u8> {
    let mut bgr = vec![0u8; rgba.len() / 4 * 3];
    bgr.par_chunks_exact_mut(3)
        .zip(rgba.par_chunks_exact(4))
        .for_each(|(dst, src)| {
            dst[0] = src[2];
            dst[1] = src[1];
            dst[2] = src[0];
        });
    bgr
}

fn swap_red_blue(pixels: &mut [u8]) {
    pixels.par_chunks_exact_mut(3).for_each(|px| px.swap(0, 2));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_drops_alpha_and_reorders() {
        assert_eq!(rgba_to_bgr(&[1, 2, 3, 255, 4, 5, 6, 0]), vec![3, 2, 1, 6, 5, 4]);
    }

    #[test]
    fn raw_rgb_is_swapped_and_raw_bgr_is_kept() {
        let data = [10, 20, 30, 40, 50, 60, 99];
        assert_eq!(raw_to_bgr(&data, 2, 1, true).unwrap(), vec![30, 20, 10, 60, 50, 40]);
        assert_eq!(raw_to_bgr(&data, 2, 1, false).unwrap(), vec![10, 20, 30, 40, 50, 60]);
    }

    #[test]
    fn gray_replicates_luma() {
        assert_eq!(gray_to_bgr(&[7, 9], 2, 1).unwrap(), vec![7, 7, 7, 9, 9, 9]);
    }

    #[test]
    fn short_buffers_are_rejected() {
        assert!(raw_to_bgr(&[0; 5], 2, 1, false).is_err());
        assert!(gray_to_bgr(&[0; 3], 2, 2).is_err());
        assert!(yuyv_to_bgr(&[0; 7], 2, 2).is_err());
        assert!(nv12_to_bgr(&[0; 5], 2, 2).is_err());
    }
}
