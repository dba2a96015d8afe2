use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::effect::Tint;

/// Named parameter sets matching the two historical renderers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Windowed renderer: wide blur, blue boost, lighter clones.
    Window,
    /// Streaming renderer: chakra tint, tighter blur, stronger clones.
    #[default]
    Stream,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("touch threshold must be in (0, 1], got {0}")]
    TouchThreshold(f32),
    #[error("mask cutoff must be in [0, 1], got {0}")]
    Cutoff(f32),
    #[error("blur kernel must be an odd size between 1 and 31, got {0}")]
    BlurKernel(u32),
    #[error("clone alpha must be in [0, 1], got {0}")]
    Alpha(f32),
    #[error("tint ratios must be finite and non-negative, got {0:?}")]
    Tint(Tint),
    #[error("jpeg quality must be in 1..=100, got {0}")]
    JpegQuality(u8),
    #[error("max hands must be 1 or 2, got {0}")]
    MaxHands(usize),
    #[error("palm score threshold must be in [0, 1], got {0}")]
    PalmScore(f32),
    #[error("segmentation input size must be non-zero, got {width}x{height}")]
    SegmentationInput { width: u32, height: u32 },
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Fingertip distance, in normalized frame units, that counts as touching.
    pub touch_threshold: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    pub cutoff: f32,
    pub blur_kernel: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloneConfig {
    /// Horizontal shift in pixels applied to each clone.
    pub offset: u32,
    pub alpha: f32,
    pub tint: Tint,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Fixed device index; probe for the first colour camera when unset.
    pub index: Option<u32>,
    pub mirror: bool,
    pub probe_limit: u32,
    pub warmup_frames: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub host: String,
    pub port: u16,
    pub jpeg_quality: u8,
    pub perf_log_interval: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub segmentation_file: String,
    pub segmentation_width: u32,
    pub segmentation_height: u32,
    pub max_hands: usize,
    pub palm_score_threshold: f32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowCloneConfig {
    pub gesture: GestureConfig,
    pub mask: MaskConfig,
    pub clone: CloneConfig,
    pub camera: CameraConfig,
    pub stream: StreamConfig,
    pub models: ModelConfig,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            touch_threshold: 0.05,
        }
    }
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self {
            cutoff: 0.5,
            blur_kernel: 3,
        }
    }
}

impl Default for CloneConfig {
    fn default() -> Self {
        Self {
            offset: 350,
            alpha: 0.7,
            tint: Tint::CHAKRA,
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: None,
            mirror: true,
            probe_limit: 5,
            warmup_frames: 5,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            jpeg_quality: 85,
            perf_log_interval: 300,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
            segmentation_file: "selfie_segmentation.onnx".to_string(),
            segmentation_width: 256,
            segmentation_height: 256,
            max_hands: 2,
            palm_score_threshold: 0.5,
        }
    }
}

impl Default for ShadowCloneConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

impl ShadowCloneConfig {
    pub fn preset(preset: Preset) -> Self {
        let (gesture, mask, clone) = match preset {
            Preset::Window => (
                GestureConfig {
                    touch_threshold: 0.04,
                },
                MaskConfig {
                    cutoff: 0.5,
                    blur_kernel: 5,
                },
                CloneConfig {
                    offset: 300,
                    alpha: 0.6,
                    tint: Tint::BLUE_BOOST,
                },
            ),
            Preset::Stream => (
                GestureConfig::default(),
                MaskConfig::default(),
                CloneConfig::default(),
            ),
        };

        Self {
            gesture,
            mask,
            clone,
            camera: CameraConfig::default(),
            stream: StreamConfig::default(),
            models: ModelConfig::default(),
        }
    }

    /// Layer a JSON file over `base`; keys absent from the file keep their base value.
    pub fn overlay_file(base: Self, path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::overlay_json(base, &text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn overlay_json(base: Self, text: &str) -> Result<Self, serde_json::Error> {
        let overlay: Value = serde_json::from_str(text)?;
        let mut merged = serde_json::to_value(base)?;
        merge_json(&mut merged, overlay);
        serde_json::from_value(merged)
    }

    pub fn segmentation_model_path(&self) -> PathBuf {
        self.models.dir.join(&self.models.segmentation_file)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.gesture.touch_threshold;
        if !(threshold.is_finite() && threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::TouchThreshold(threshold));
        }

        let cutoff = self.mask.cutoff;
        if !(0.0..=1.0).contains(&cutoff) {
            return Err(ConfigError::Cutoff(cutoff));
        }

        let kernel = self.mask.blur_kernel;
        if kernel % 2 == 0 || !(1..=31).contains(&kernel) {
            return Err(ConfigError::BlurKernel(kernel));
        }

        let alpha = self.clone.alpha;
        if !(0.0..=1.0).contains(&alpha) {
            return Err(ConfigError::Alpha(alpha));
        }

        if !self.clone.tint.is_valid() {
            return Err(ConfigError::Tint(self.clone.tint));
        }

        let quality = self.stream.jpeg_quality;
        if !(1..=100).contains(&quality) {
            return Err(ConfigError::JpegQuality(quality));
        }

        let max_hands = self.models.max_hands;
        if !(1..=2).contains(&max_hands) {
            return Err(ConfigError::MaxHands(max_hands));
        }

        let palm_score = self.models.palm_score_threshold;
        if !(0.0..=1.0).contains(&palm_score) {
            return Err(ConfigError::PalmScore(palm_score));
        }

        let (width, height) = (
            self.models.segmentation_width,
            self.models.segmentation_height,
        );
        if width == 0 || height == 0 {
            return Err(ConfigError::SegmentationInput { width, height });
        }

        Ok(())
    }
}

fn merge_json(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
