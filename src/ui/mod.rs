use std::sync::Arc;

use anyhow::{Result, anyhow};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, KeyBinding, ObjectFit, ParentElement,
    Render, RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window,
    WindowOptions, actions, div, img, px,
};
use gpui_component::{
    ActiveTheme, Root,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};

use crate::{
    pipeline::producer::{FrameSink, Producer},
    session::SessionState,
    types::Frame,
};

mod main_view;
mod render_util;

actions!(shadow_clone, [Quit, ToggleDebug]);

const QUIT_KEY: &str = "q";
const DEBUG_KEY: &str = "d";

/// Processed frame handed from the producer thread to the window.
#[derive(Debug)]
pub struct DisplayFrame {
    pub frame: Frame,
    pub active: bool,
    pub fps: f32,
}

/// Producer sink for window mode; drops frames while the UI is busy.
pub struct WindowSink {
    tx: Sender<DisplayFrame>,
}

impl WindowSink {
    pub fn new(tx: Sender<DisplayFrame>) -> Self {
        Self { tx }
    }
}

impl FrameSink for WindowSink {
    fn publish(&mut self, frame: Frame, active: bool, fps: f32) -> Result<()> {
        match self.tx.try_send(DisplayFrame { frame, active, fps }) {
            Ok(()) | Err(TrySendError::Full(_)) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(anyhow!("window closed")),
        }
    }
}

pub fn launch_ui(
    app: &mut App,
    frame_rx: Receiver<DisplayFrame>,
    state: Arc<SessionState>,
    producer: Producer,
) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Shadow Clone".into()),
            ..Default::default()
        }),
        ..Default::default()
    };

    app.bind_keys([
        KeyBinding::new(QUIT_KEY, Quit, None),
        KeyBinding::new(DEBUG_KEY, ToggleDebug, None),
    ]);
    let quit_state = state.clone();
    app.on_action(move |_: &Quit, app| quit(&quit_state, app));
    let debug_state = state.clone();
    app.on_action(move |_: &ToggleDebug, app| {
        toggle_debug(&debug_state);
        app.refresh_windows();
    });

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(frame_rx, state, producer));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

/// Shared by the quit button and the `q` key.
fn quit(state: &SessionState, app: &mut App) {
    state.stop();
    app.quit();
}

/// Shared by the debug button and the `d` key. Returns the new value.
fn toggle_debug(state: &SessionState) -> bool {
    let debug = state.toggle_debug();
    log::info!("debug overlay {}", if debug { "on" } else { "off" });
    debug
}

struct AppView {
    frame_rx: Receiver<DisplayFrame>,
    state: Arc<SessionState>,
    _producer: Producer,
    latest: Option<LatestView>,
    latest_image: Option<Arc<RenderImage>>,
}

/// What the status row shows about the last frame.
struct LatestView {
    width: u32,
    height: u32,
    active: bool,
    fps: f32,
}

impl AppView {
    fn new(frame_rx: Receiver<DisplayFrame>, state: Arc<SessionState>, producer: Producer) -> Self {
        Self {
            frame_rx,
            state,
            _producer: producer,
            latest: None,
            latest_image: None,
        }
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        self.render_main(window, cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_key_flips_shared_state() {
        let state = SessionState::default();
        assert!(toggle_debug(&state));
        assert!(state.snapshot().debug);
        assert!(!toggle_debug(&state));
        assert!(!state.snapshot().debug);
    }

    #[test]
    fn window_sink_drops_frames_while_busy_and_fails_once_closed() {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut sink = WindowSink::new(tx);
        sink.publish(Frame::filled(2, 2, [1, 2, 3]), true, 30.0).unwrap();
        sink.publish(Frame::filled(2, 2, [4, 5, 6]), false, 31.0).unwrap();

        let first = rx.try_recv().unwrap();
        assert!(first.active);
        assert_eq!(first.frame.pixel(0, 0), Some([1, 2, 3]));
        assert!(rx.try_recv().is_err());

        drop(rx);
        assert!(sink.publish(Frame::filled(2, 2, [0, 0, 0]), false, 0.0).is_err());
    }
}
