use std::fmt::Display;

use anyhow::Result;

use crate::{
    app::{build_hand_tracker, build_segmenter},
    config::ShadowCloneConfig,
    effect::ShadowClone,
    model_download,
    pipeline::{
        camera::{FrameSource, available_cameras, probe_camera},
        oracle::{HandOracle, SegmentationOracle},
    },
};

/// Tallies `[PASS]` / `[FAIL]` lines.
#[derive(Debug, Default)]
struct Report {
    passed: usize,
    failed: usize,
}

impl Report {
    fn record<T>(&mut self, name: &str, result: Result<T>, detail: impl FnOnce(&T) -> String) -> Option<T> {
        match result {
            Ok(value) => {
                println!("[PASS] {name}: {}", detail(&value));
                self.passed += 1;
                Some(value)
            }
            Err(err) => {
                self.fail(name, format!("{err:#}"));
                None
            }
        }
    }

    fn fail(&mut self, name: &str, reason: impl Display) {
        println!("[FAIL] {name}: {reason}");
        self.failed += 1;
    }

    fn skip(&mut self, name: &str, because: &str) {
        self.fail(name, format!("skipped, {because} failed"));
    }
}

/// Run every startup step once without a UI. `true` when all of them pass.
pub fn run_check(config: &ShadowCloneConfig) -> bool {
    let mut report = Report::default();

    log::info!("shadow-clone {}", env!("CARGO_PKG_VERSION"));
    match serde_json::to_string(config) {
        Ok(json) => log::info!("config: {json}"),
        Err(err) => log::warn!("could not serialize config: {err}"),
    }
    report.record("config", config.validate().map_err(Into::into), |_| {
        format!(
            "offset={} threshold={} blur={} alpha={}",
            config.clone.offset,
            config.gesture.touch_threshold,
            config.mask.blur_kernel,
            config.clone.alpha
        )
    });

    report.record("devices", available_cameras(), |devices| {
        let labels: Vec<String> = devices
            .iter()
            .map(|device| format!("{} ({})", device.label, device.index))
            .collect();
        format!("{} found [{}]", devices.len(), labels.join(", "))
    });

    let camera = report.record("camera", probe_camera(&config.camera), |(source, sample)| {
        format!(
            "{} {}x{}, {} channel(s)",
            source.label(),
            sample.frame.width,
            sample.frame.height,
            sample.source_channels
        )
    });

    let paths = report.record("models", model_download::prepare_models(config), |paths| {
        format!(
            "{}, {}, {}",
            paths.handpose.display(),
            paths.palm.display(),
            paths.segmentation.display()
        )
    });

    let (hands, segmenter) = match &paths {
        Some(paths) => (
            report.record("hand tracker", build_hand_tracker(config, paths), |_| {
                format!("max {} hand(s)", config.models.max_hands)
            }),
            report.record("segmenter", build_segmenter(config, paths), |_| {
                format!(
                    "{}x{} input",
                    config.models.segmentation_width, config.models.segmentation_height
                )
            }),
        ),
        None => {
            report.skip("hand tracker", "models");
            report.skip("segmenter", "models");
            (None, None)
        }
    };

    match (camera, hands, segmenter) {
        (Some((_source, sample)), Some(mut hands), Some(mut segmenter)) => {
            let frame = sample.frame;
            report.record("hand detection", hands.detect_hands(&frame), |found| {
                format!("{} hand(s)", found.len())
            });
            report.record("segmentation", segmenter.segment(&frame), |mask| {
                let covered = mask.data.iter().filter(|&&v| v >= config.mask.cutoff).count();
                format!(
                    "{}x{} mask, {:.1}% foreground",
                    mask.width,
                    mask.height,
                    100.0 * covered as f32 / mask.data.len().max(1) as f32
                )
            });

            let mut effect = ShadowClone::from_config(config, hands, segmenter);
            let outcome = effect.process(&frame);
            report.record("pipeline", Ok(outcome), |outcome| {
                format!(
                    "seal {}, {} hand(s), {}x{} output",
                    if outcome.active { "active" } else { "inactive" },
                    outcome.hands.len(),
                    outcome.frame.width,
                    outcome.frame.height
                )
            });
        }
        _ => report.skip("pipeline", "an earlier step"),
    }

    println!("{} passed, {} failed", report.passed, report.failed);
    report.failed == 0
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use super::*;

    #[test]
    fn report_counts_outcomes() {
        let mut report = Report::default();
        assert_eq!(report.record("ok", Ok(3), |v| v.to_string()), Some(3));
        assert_eq!(
            report.record::<u8>("bad", Err(anyhow!("boom")), |v| v.to_string()),
            None
        );
        report.skip("later", "bad");
        assert_eq!(report.passed, 1);
        assert_eq!(report.failed, 2);
    }
}
