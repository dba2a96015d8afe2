use super::{Arc, ImageBuffer, ImageFrame, RenderImage, Rgba};
use crate::types::Frame;

/// Wrap a BGR frame as a GPUI image without going through the asset pipeline.
pub(super) fn frame_to_image(frame: &Frame) -> Option<Arc<RenderImage>> {
    // GPUI expects BGRA, so only the alpha byte is added.
    let mut bgra = Vec::with_capacity(frame.pixel_count() * 4);
    for px in frame.bgr.chunks_exact(3) {
        bgra.extend_from_slice(&[px[0], px[1], px[2], 255]);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, bgra)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}
