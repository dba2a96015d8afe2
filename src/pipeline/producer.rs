use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow};
use crossbeam_channel::bounded;

use super::{
    camera::FrameSource,
    oracle::{HandOracle, SegmentationOracle},
    overlay,
};
use crate::{effect::ShadowClone, session::SessionState, types::Frame};

/// Consecutive empty reads before the device is considered gone.
const MAX_MISSED_FRAMES: u32 = 100;
const MISS_BACKOFF: Duration = Duration::from_millis(10);

/// Where processed frames go. An error means the consumer has gone away.
pub trait FrameSink {
    fn publish(&mut self, frame: Frame, active: bool, fps: f32) -> Result<()>;
}

/// Everything the producer thread owns.
pub struct Stage<F, H, S> {
    pub source: F,
    pub effect: ShadowClone<H, S>,
}

#[derive(Clone, Debug)]
pub struct ProducerOptions {
    pub perf_log_interval: u64,
    /// Burn the FPS counter into every frame.
    pub draw_fps: bool,
}

/// Running capture thread; stops the session and joins on drop.
#[derive(Debug)]
pub struct Producer {
    state: Arc<SessionState>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Producer {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(|handle| handle.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.state.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Producer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Smoothed frames-per-second from frame-to-frame intervals.
#[derive(Debug)]
pub struct FpsCounter {
    last: Option<Instant>,
    fps: f32,
}

impl FpsCounter {
    const SMOOTHING: f32 = 0.9;

    pub fn new() -> Self {
        Self { last: None, fps: 0.0 }
    }

    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&mut self, now: Instant) -> f32 {
        if let Some(last) = self.last.replace(now) {
            let dt = now.saturating_duration_since(last).as_secs_f32();
            if dt > 0.0 {
                let instant = 1.0 / dt;
                self.fps = if self.fps == 0.0 {
                    instant
                } else {
                    self.fps * Self::SMOOTHING + instant * (1.0 - Self::SMOOTHING)
                };
            }
        }
        self.fps
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn the capture and effect thread. `setup` runs on that thread so
/// device handles never cross threads; its failure is returned here.
pub fn start_producer<F, H, S, K, Setup>(
    setup: Setup,
    sink: K,
    state: Arc<SessionState>,
    options: ProducerOptions,
) -> Result<Producer>
where
    F: FrameSource + 'static,
    H: HandOracle + 'static,
    S: SegmentationOracle + 'static,
    K: FrameSink + Send + 'static,
    Setup: FnOnce() -> Result<Stage<F, H, S>> + Send + 'static,
{
    let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
    let thread_state = state.clone();

    let handle = thread::Builder::new()
        .name("shadow-clone-producer".into())
        .spawn(move || {
            let stage = match setup() {
                Ok(stage) => {
                    let _ = ready_tx.send(Ok(()));
                    stage
                }
                Err(err) => {
                    thread_state.stop();
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            run_loop(stage, sink, &thread_state, &options);
            thread_state.stop();
        })?;

    let producer = Producer {
        state,
        handle: Some(handle),
    };
    match ready_rx.recv() {
        Ok(Ok(())) => Ok(producer),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(anyhow!("producer thread exited during setup")),
    }
}

fn run_loop<F, H, S, K>(
    mut stage: Stage<F, H, S>,
    mut sink: K,
    state: &SessionState,
    options: &ProducerOptions,
) where
    F: FrameSource,
    H: HandOracle,
    S: SegmentationOracle,
    K: FrameSink,
{
    let mut fps_counter = FpsCounter::new();
    let mut missed = 0u32;
    let mut frame_size = (0, 0);
    let mut frames = 0u64;
    let mut active_frames = 0u64;

    while state.is_running() {
        let frame = match stage.source.next_frame() {
            Ok(Some(frame)) => {
                missed = 0;
                frame
            }
            other => {
                if let Err(err) = other {
                    log::warn!("frame read failed: {err:#}");
                }
                missed += 1;
                if missed >= MAX_MISSED_FRAMES {
                    log::error!(
                        "{} produced no frames {missed} times in a row, stopping",
                        stage.source.label()
                    );
                    break;
                }
                thread::sleep(MISS_BACKOFF);
                continue;
            }
        };

        if (frame.width, frame.height) != frame_size {
            frame_size = (frame.width, frame.height);
            state.set_camera(stage.source.label(), frame.width, frame.height);
        }

        let outcome = stage.effect.process(&frame);
        let fps = fps_counter.tick();
        let mut output = outcome.frame;
        if state.is_debug() {
            overlay::draw_debug(&mut output, &outcome.hands, outcome.active);
        }
        if options.draw_fps {
            overlay::draw_fps(&mut output, fps);
        }
        state.record_frame(outcome.active, fps);

        frames += 1;
        if outcome.active {
            active_frames += 1;
        }
        if options.perf_log_interval > 0 && frames % options.perf_log_interval == 0 {
            log::info!(
                "[perf] frames={frames} fps={fps:.1} seal={} active_frames={active_frames}",
                outcome.active
            );
        }

        if let Err(err) = sink.publish(output, outcome.active, fps) {
            log::info!("frame consumer closed: {err:#}");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use parking_lot::Mutex;

    use super::*;
    use crate::{
        config::ShadowCloneConfig,
        gesture::tests::hand_with_tips,
        types::{Hand, Mask},
    };

    struct ScriptedSource {
        frames: VecDeque<Option<Frame>>,
    }

    impl FrameSource for ScriptedSource {
        fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.pop_front().flatten())
        }

        fn label(&self) -> &str {
            "scripted"
        }
    }

    struct Hands(Vec<Hand>);

    impl HandOracle for Hands {
        fn detect_hands(&mut self, _frame: &Frame) -> Result<Vec<Hand>> {
            Ok(self.0.clone())
        }
    }

    struct Everything;

    impl SegmentationOracle for Everything {
        fn segment(&mut self, frame: &Frame) -> Result<Mask> {
            Ok(Mask::filled(frame.width, frame.height, 1.0))
        }
    }

    #[derive(Clone, Default)]
    struct Collect(Arc<Mutex<Vec<(Frame, bool)>>>);

    impl FrameSink for Collect {
        fn publish(&mut self, frame: Frame, active: bool, _fps: f32) -> Result<()> {
            let mut frames = self.0.lock();
            frames.push((frame, active));
            if frames.len() >= 2 {
                return Err(anyhow!("enough"));
            }
            Ok(())
        }
    }

    fn wait_until_finished(producer: &Producer) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !producer.is_finished() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn options() -> ProducerOptions {
        ProducerOptions {
            perf_log_interval: 1,
            draw_fps: false,
        }
    }

    #[test]
    fn setup_failure_is_reported_to_caller() {
        let state = Arc::new(SessionState::default());
        let result = start_producer(
            || -> Result<Stage<ScriptedSource, Hands, Everything>> { Err(anyhow!("no camera")) },
            Collect::default(),
            state.clone(),
            options(),
        );
        let err = result.err().map(|err| err.to_string());
        assert_eq!(err.as_deref(), Some("no camera"));
        assert!(!state.is_running());
    }

    #[test]
    fn frames_flow_to_sink_until_it_closes() {
        let state = Arc::new(SessionState::default());
        let sink = Collect::default();
        let collected = sink.0.clone();

        let producer = start_producer(
            || {
                let frames = VecDeque::from(vec![
                    None,
                    Some(Frame::filled(32, 24, [5, 5, 5])),
                    Some(Frame::filled(32, 24, [6, 6, 6])),
                    Some(Frame::filled(32, 24, [7, 7, 7])),
                ]);
                Ok(Stage {
                    source: ScriptedSource { frames },
                    effect: ShadowClone::from_config(
                        &ShadowCloneConfig::default(),
                        Hands(vec![hand_with_tips((0.5, 0.5), (0.51, 0.5))]),
                        Everything,
                    ),
                })
            },
            sink,
            state.clone(),
            options(),
        )
        .unwrap();
        wait_until_finished(&producer);
        producer.stop();

        let collected = collected.lock();
        assert_eq!(collected.len(), 2);
        assert!(collected.iter().all(|(_, active)| *active));
        assert_eq!(collected[0].0.pixel(0, 0), Some([5, 5, 5]));

        let snapshot = state.snapshot();
        assert!(!snapshot.running);
        assert_eq!(snapshot.frames, 2);
        assert_eq!(snapshot.camera, "scripted");
        assert_eq!(snapshot.resolution, "32x24");
    }

    #[test]
    fn source_that_dries_up_stops_the_session() {
        let state = Arc::new(SessionState::default());
        let producer = start_producer(
            || {
                Ok(Stage {
                    source: ScriptedSource {
                        frames: VecDeque::new(),
                    },
                    effect: ShadowClone::from_config(
                        &ShadowCloneConfig::default(),
                        Hands(Vec::new()),
                        Everything,
                    ),
                })
            },
            Collect::default(),
            state.clone(),
            options(),
        )
        .unwrap();

        wait_until_finished(&producer);
        assert!(producer.is_finished());
        assert!(!state.is_running());
    }

    #[test]
    fn fps_counter_smooths_intervals() {
        let mut counter = FpsCounter::new();
        let start = Instant::now();
        assert_eq!(counter.tick_at(start), 0.0);
        let first = counter.tick_at(start + Duration::from_millis(100));
        assert!((first - 10.0).abs() < 1e-3);
        let second = counter.tick_at(start + Duration::from_millis(150));
        assert!((second - 11.0).abs() < 1e-2);
    }
}
