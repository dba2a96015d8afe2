use std::sync::Arc;

use anyhow::{Context, Result};
use image::{ExtendedColorType, codecs::jpeg::JpegEncoder};
use parking_lot::Mutex;

use crate::{pipeline::producer::FrameSink, types::Frame};

#[derive(Clone, Debug)]
pub struct EncodedFrame {
    /// Increases by one per published frame, starting at 1.
    pub seq: u64,
    pub jpeg: Arc<Vec<u8>>,
}

/// Most recent encoded frame. Readers copy out; nothing queues.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<EncodedFrame>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, jpeg: Vec<u8>) -> u64 {
        let mut slot = self.slot.lock();
        let seq = slot.as_ref().map_or(1, |frame| frame.seq + 1);
        *slot = Some(EncodedFrame {
            seq,
            jpeg: Arc::new(jpeg),
        });
        seq
    }

    /// The current frame if it is newer than `seen`.
    pub fn newer_than(&self, seen: u64) -> Option<EncodedFrame> {
        self.slot
            .lock()
            .as_ref()
            .filter(|frame| frame.seq > seen)
            .cloned()
    }
}

pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(frame.bgr.len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode(
            &frame.to_rgb(),
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )
        .context("jpeg encode failed")?;
    Ok(out)
}

/// Producer sink that encodes into the shared slot.
pub struct JpegSink {
    slot: Arc<LatestFrame>,
    quality: u8,
}

impl JpegSink {
    pub fn new(slot: Arc<LatestFrame>, quality: u8) -> Self {
        Self { slot, quality }
    }
}

impl FrameSink for JpegSink {
    fn publish(&mut self, frame: Frame, _active: bool, _fps: f32) -> Result<()> {
        match encode_jpeg(&frame, self.quality) {
            Ok(jpeg) => {
                self.slot.publish(jpeg);
            }
            Err(err) => log::warn!("dropping frame: {err:#}"),
        }
        Ok(())
    }
}
