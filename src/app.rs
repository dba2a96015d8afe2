use std::sync::Arc;

use anyhow::{Context, Result};
use crossbeam_channel::bounded;
use gpui::Application;

use crate::{
    config::ShadowCloneConfig,
    effect::ShadowClone,
    model_download::{self, ModelPaths},
    pipeline::{
        camera::{CameraSource, probe_camera},
        oracle::{OrtHandTracker, OrtSegmenter},
        producer::{ProducerOptions, Stage, start_producer},
    },
    session::SessionState,
    stream::{self, JpegSink, LatestFrame},
    ui::{self, WindowSink},
};

pub type CameraStage = Stage<CameraSource, OrtHandTracker, OrtSegmenter>;

pub fn build_hand_tracker(config: &ShadowCloneConfig, paths: &ModelPaths) -> Result<OrtHandTracker> {
    OrtHandTracker::new(
        &paths.handpose,
        &paths.palm,
        config.models.max_hands,
        config.models.palm_score_threshold,
    )
    .context("failed to build hand tracker")
}

pub fn build_segmenter(config: &ShadowCloneConfig, paths: &ModelPaths) -> Result<OrtSegmenter> {
    OrtSegmenter::new(
        &paths.segmentation,
        config.models.segmentation_width,
        config.models.segmentation_height,
    )
    .context("failed to build segmenter")
}

/// Open the camera and load both oracles. Runs on the producer thread.
pub fn build_stage(config: &ShadowCloneConfig, paths: &ModelPaths) -> Result<CameraStage> {
    let (source, _sample) = probe_camera(&config.camera)?;
    let hands = build_hand_tracker(config, paths)?;
    let segmenter = build_segmenter(config, paths)?;
    log::info!("models ready, shadow clone pipeline running");

    Ok(Stage {
        source,
        effect: ShadowClone::from_config(config, hands, segmenter),
    })
}

/// Capture and stream over HTTP until the camera gives out.
pub fn run_serve(config: ShadowCloneConfig) -> Result<()> {
    let paths = model_download::prepare_models(&config)?;
    let state = Arc::new(SessionState::default());
    let slot = Arc::new(LatestFrame::new());

    let setup_config = config.clone();
    let producer = start_producer(
        move || build_stage(&setup_config, &paths),
        JpegSink::new(slot.clone(), config.stream.jpeg_quality),
        state.clone(),
        ProducerOptions {
            perf_log_interval: config.stream.perf_log_interval,
            draw_fps: true,
        },
    )?;

    let result = stream::serve(&config.stream, slot, state);
    producer.stop();
    result
}

/// Open the GPUI window; returns when the app quits.
pub fn run_window(config: ShadowCloneConfig) -> Result<()> {
    let paths = model_download::prepare_models(&config)?;
    let state = Arc::new(SessionState::default());
    let (frame_tx, frame_rx) = bounded(1);

    let setup_config = config.clone();
    let producer = start_producer(
        move || build_stage(&setup_config, &paths),
        WindowSink::new(frame_tx),
        state.clone(),
        ProducerOptions {
            perf_log_interval: config.stream.perf_log_interval,
            draw_fps: false,
        },
    )?;

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, frame_rx, state.clone(), producer) {
                log::error!("failed to launch ui: {err:?}");
                state.stop();
                app.quit();
            }
        });

    Ok(())
}
