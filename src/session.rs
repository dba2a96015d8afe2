use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;

/// Runtime state shared by the producer thread, the web server and the UI.
#[derive(Debug)]
pub struct SessionState {
    running: AtomicBool,
    active: AtomicBool,
    debug: AtomicBool,
    frames: AtomicU64,
    fps_bits: AtomicU32,
    camera: Mutex<String>,
    resolution: Mutex<(u32, u32)>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub active: bool,
    pub fps: f32,
    pub debug: bool,
    pub camera: String,
    pub resolution: String,
    pub running: bool,
    pub frames: u64,
}

impl SessionState {
    pub fn new(debug: bool) -> Self {
        Self {
            running: AtomicBool::new(true),
            active: AtomicBool::new(false),
            debug: AtomicBool::new(debug),
            frames: AtomicU64::new(0),
            fps_bits: AtomicU32::new(0f32.to_bits()),
            camera: Mutex::new(String::from("none")),
            resolution: Mutex::new((0, 0)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::Relaxed)
    }

    /// Flip the debug overlay and return the new value.
    pub fn toggle_debug(&self) -> bool {
        !self.debug.fetch_xor(true, Ordering::AcqRel)
    }

    pub fn set_camera(&self, label: &str, width: u32, height: u32) {
        *self.camera.lock() = label.to_string();
        *self.resolution.lock() = (width, height);
    }

    pub fn record_frame(&self, active: bool, fps: f32) {
        self.active.store(active, Ordering::Relaxed);
        self.fps_bits.store(fps.to_bits(), Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let (width, height) = *self.resolution.lock();
        StatusSnapshot {
            active: self.active.load(Ordering::Relaxed),
            fps: f32::from_bits(self.fps_bits.load(Ordering::Relaxed)),
            debug: self.is_debug(),
            camera: self.camera.lock().clone(),
            resolution: format!("{width}x{height}"),
            running: self.is_running(),
            frames: self.frames.load(Ordering::Relaxed),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(false)
    }
}
