pub mod bgr_converter;
pub mod camera;
pub mod oracle;
pub mod overlay;
pub mod producer;

// Re-exports for convenience
pub use camera::{CameraDevice, CameraSource, FrameSource, available_cameras, probe_camera};
pub use producer::{FrameSink, Producer, ProducerOptions, Stage, start_producer};
