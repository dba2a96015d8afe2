use std::{
    fs,
    io::{Read, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, bail};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::Client;

use crate::config::ShadowCloneConfig;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelKind {
    HandposeEstimator,
    PalmDetector,
    Segmentation,
}

impl ModelKind {
    pub fn label(self) -> &'static str {
        match self {
            ModelKind::HandposeEstimator => "handpose estimator",
            ModelKind::PalmDetector => "palm detector",
            ModelKind::Segmentation => "selfie segmentation",
        }
    }

    /// Where the model is fetched from when missing. Segmentation has no mirror.
    fn url(self) -> Option<&'static str> {
        match self {
            ModelKind::HandposeEstimator => Some(HANDPOSE_ESTIMATOR_MODEL_URL),
            ModelKind::PalmDetector => Some(PALM_DETECTOR_MODEL_URL),
            ModelKind::Segmentation => None,
        }
    }
}

const HANDPOSE_ESTIMATOR_MODEL_FILENAME: &str = "handpose_estimation_mediapipe_2023feb.onnx";
const HANDPOSE_ESTIMATOR_MODEL_URL: &str = "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/handpose_estimation_mediapipe_2023feb.onnx";
const PALM_DETECTOR_MODEL_FILENAME: &str = "palm_detection_mediapipe_2023feb.onnx";
const PALM_DETECTOR_MODEL_URL: &str = "https://raw.githubusercontent.com/214zzl995/gesture-universe/refs/heads/main/models/palm_detection_mediapipe_2023feb.onnx";

/// Resolved on-disk locations of every model the pipeline loads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelPaths {
    pub handpose: PathBuf,
    pub palm: PathBuf,
    pub segmentation: PathBuf,
}

impl ModelPaths {
    pub fn from_config(config: &ShadowCloneConfig) -> Self {
        Self {
            handpose: config.models.dir.join(HANDPOSE_ESTIMATOR_MODEL_FILENAME),
            palm: config.models.dir.join(PALM_DETECTOR_MODEL_FILENAME),
            segmentation: config.segmentation_model_path(),
        }
    }
}

/// Download whatever hand models are missing and make sure the segmentation
/// model is present.
pub fn prepare_models(config: &ShadowCloneConfig) -> anyhow::Result<ModelPaths> {
    let paths = ModelPaths::from_config(config);
    ensure_model_ready(ModelKind::HandposeEstimator, &paths.handpose)?;
    ensure_model_ready(ModelKind::PalmDetector, &paths.palm)?;
    ensure_model_ready(ModelKind::Segmentation, &paths.segmentation)?;
    Ok(paths)
}

pub fn ensure_model_ready(model: ModelKind, model_path: &Path) -> anyhow::Result<()> {
    if model_path.exists() {
        log::info!("{} model ready at {}", model.label(), model_path.display());
        return Ok(());
    }

    let Some(url) = model.url() else {
        bail!(
            "{} model not found at {}; place the ONNX file there or set models.dir / models.segmentation_file",
            model.label(),
            model_path.display()
        );
    };

    if let Some(parent) = model_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create model directory {}", parent.display()))?;
    }

    download_to_path(model, url, model_path)
        .with_context(|| format!("failed to download {} model", model.label()))
}

fn download_to_path(model: ModelKind, url: &str, dest: &Path) -> anyhow::Result<()> {
    log::info!(
        "downloading {} model from {url} to {}",
        model.label(),
        dest.display()
    );

    let client = Client::new();
    let mut response = client
        .get(url)
        .send()
        .context("failed to start model download")?
        .error_for_status()
        .context("model download returned error status")?;

    let progress = create_progress_bar(response.content_length());

    let tmp_path = dest.with_extension("download");
    let mut file = fs::File::create(&tmp_path)
        .with_context(|| format!("failed to create {}", tmp_path.display()))?;

    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 16 * 1024];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .context("failed while reading model bytes")?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .context("failed while writing model to disk")?;
        downloaded += bytes_read as u64;
        progress.set_position(downloaded);
    }

    file.sync_all()
        .context("failed to flush downloaded model to disk")?;
    fs::rename(&tmp_path, dest).with_context(|| {
        format!(
            "failed to move temp model {} into place at {}",
            tmp_path.display(),
            dest.display()
        )
    })?;

    progress.finish_with_message(format!("{} model ready", model.label()));
    Ok(())
}

fn create_progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(total) if total > 0 => {
            let pb = ProgressBar::new(total);
            if let Ok(style) = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta})",
            ) {
                pb.set_style(style.progress_chars("=>-"));
            }
            pb
        }
        _ => {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.green} downloading model") {
                pb.set_style(style);
            }
            pb.enable_steady_tick(Duration::from_millis(100));
            pb
        }
    }
}
