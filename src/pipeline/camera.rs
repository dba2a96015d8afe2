use anyhow::{Result, anyhow, bail};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{ApiBackend, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType},
};

use super::bgr_converter::{self, DecodedFrame};
use crate::{config::CameraConfig, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWBGR,
    FrameFormat::RAWRGB,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
    FrameFormat::GRAY,
];

fn requested_formats() -> [RequestedFormat<'static>; 4] {
    [
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestResolution,
            PREFERRED_PIXEL_FORMATS,
        ),
        // Anything Nokhwa can decode, still preferring frame rate.
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

/// Anything that hands out BGR frames of a fixed size.
pub trait FrameSource {
    /// `Ok(None)` means no frame this cycle; the caller should try again.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn label(&self) -> &str;
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: info.human_name(),
        })
        .collect())
}

fn build_camera(index: CameraIndex) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats() {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

pub struct CameraSource {
    camera: Camera,
    label: String,
    mirror: bool,
}

impl CameraSource {
    pub fn open(index: u32, mirror: bool) -> Result<Self> {
        let camera = build_camera(CameraIndex::Index(index))?;
        let label = format!("{} (#{index})", camera.info().human_name());
        Ok(Self {
            camera,
            label,
            mirror,
        })
    }

    fn read_decoded(&mut self) -> Result<DecodedFrame> {
        let buffer = self
            .camera
            .frame()
            .map_err(|err| anyhow!("camera frame read failed: {err}"))?;
        bgr_converter::convert_camera_frame(&buffer)
    }

    /// Drop the first few frames while exposure settles, then read one.
    fn warm_up(&mut self, frames: u32) -> Result<DecodedFrame> {
        for _ in 0..frames {
            if let Err(err) = self.read_decoded() {
                log::debug!("warm-up frame on {} failed: {err:#}", self.label);
            }
        }
        self.read_decoded()
    }

    fn accept(self, mut sample: DecodedFrame) -> (Self, DecodedFrame) {
        if self.mirror {
            sample.frame.mirror_horizontal();
        }
        log::info!(
            "opened {} at {}x{}",
            self.label,
            sample.frame.width,
            sample.frame.height
        );
        (self, sample)
    }
}

impl FrameSource for CameraSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut decoded = match self.read_decoded() {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("{}: {err:#}", self.label);
                return Ok(None);
            }
        };
        if self.mirror {
            decoded.frame.mirror_horizontal();
        }
        Ok(Some(decoded.frame))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(err) = self.camera.stop_stream() {
            log::debug!("failed to stop {}: {err}", self.label);
        }
    }
}

/// Open the configured camera, or the first colour camera among the first
/// `probe_limit` indices. Returns the source with one sample frame.
pub fn probe_camera(config: &CameraConfig) -> Result<(CameraSource, DecodedFrame)> {
    if let Some(index) = config.index {
        let mut source = CameraSource::open(index, config.mirror)?;
        let sample = source.warm_up(config.warmup_frames)?;
        return Ok(source.accept(sample));
    }

    for index in 0..config.probe_limit {
        let mut source = match CameraSource::open(index, config.mirror) {
            Ok(source) => source,
            Err(err) => {
                log::debug!("camera #{index} unavailable: {err:#}");
                continue;
            }
        };
        let sample = match source.warm_up(config.warmup_frames) {
            Ok(sample) => sample,
            Err(err) => {
                log::info!("skipping {}: no frame ({err:#})", source.label);
                continue;
            }
        };
        if sample.is_grayscale() {
            log::info!("skipping {}: single-channel (IR?) device", source.label);
            continue;
        }

        return Ok(source.accept(sample));
    }

    bail!(
        "no working colour camera found in indices 0..{}",
        config.probe_limit
    )
}
