use std::{
    io::{self, Cursor, Read},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use anyhow::{Result, anyhow, bail};
use serde_json::json;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use super::slot::LatestFrame;
use crate::{config::StreamConfig, session::SessionState};

const INDEX_HTML: &str = include_str!("index.html");
const BOUNDARY: &str = "frame";
const IDLE_WAIT: Duration = Duration::from_millis(10);
const MIN_PART_INTERVAL: Duration = Duration::from_millis(16);
const ACCEPT_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Index,
    VideoFeed,
    Status,
    ToggleDebug,
    NotFound,
}

fn route(method: &Method, url: &str) -> Route {
    let path = url.split('?').next().unwrap_or(url);
    match (method, path) {
        (Method::Get, "/") => Route::Index,
        (Method::Get, "/video_feed") => Route::VideoFeed,
        (Method::Get, "/status") => Route::Status,
        (Method::Post, "/toggle_debug") => Route::ToggleDebug,
        _ => Route::NotFound,
    }
}

/// Serve until the producer clears the running flag, then return an error.
pub fn serve(config: &StreamConfig, slot: Arc<LatestFrame>, state: Arc<SessionState>) -> Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let server = Server::http(&addr).map_err(|err| anyhow!("failed to bind {addr}: {err}"))?;
    log::info!("streaming on http://{addr}/ (video at /video_feed)");

    while state.is_running() {
        let request = match server.recv_timeout(ACCEPT_TIMEOUT) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(err) => {
                log::warn!("failed to accept request: {err}");
                continue;
            }
        };

        let slot = slot.clone();
        let state = state.clone();
        let spawned = thread::Builder::new()
            .name("shadow-clone-http".into())
            .spawn(move || {
                if let Err(err) = handle(request, &slot, &state) {
                    log::debug!("request ended: {err:#}");
                }
            });
        if let Err(err) = spawned {
            log::warn!("failed to spawn request handler: {err}");
        }
    }

    bail!("frame producer stopped, shutting down the stream server")
}

fn handle(request: Request, slot: &Arc<LatestFrame>, state: &Arc<SessionState>) -> Result<()> {
    let route = route(request.method(), request.url());
    log::debug!("{} {} -> {route:?}", request.method(), request.url());

    match route {
        Route::Index => {
            let response = Response::from_string(INDEX_HTML)
                .with_header(header("Content-Type", "text/html; charset=utf-8")?);
            request.respond(response)?;
        }
        Route::Status => {
            let body = serde_json::to_string(&state.snapshot())?;
            request.respond(json_response(body)?)?;
        }
        Route::ToggleDebug => {
            let debug = state.toggle_debug();
            log::info!("debug overlay {}", if debug { "on" } else { "off" });
            request.respond(json_response(json!({ "debug": debug }).to_string())?)?;
        }
        Route::VideoFeed => {
            let headers = vec![
                header(
                    "Content-Type",
                    &format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
                )?,
                header("Cache-Control", "no-cache, no-store, must-revalidate")?,
            ];
            let reader = MjpegReader::new(slot.clone(), state.clone());
            request.respond(Response::new(StatusCode(200), headers, reader, None, None))?;
        }
        Route::NotFound => {
            request.respond(Response::empty(StatusCode(404)))?;
        }
    }
    Ok(())
}

fn header(name: &str, value: &str) -> Result<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow!("invalid header {name}: {value}"))
}

fn json_response(body: String) -> Result<Response<Cursor<Vec<u8>>>> {
    Ok(Response::from_string(body).with_header(header("Content-Type", "application/json")?))
}

/// Multipart part wrapping one JPEG.
fn mjpeg_part(jpeg: &[u8]) -> Vec<u8> {
    let head = format!(
        "--{BOUNDARY}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        jpeg.len()
    );
    let mut part = Vec::with_capacity(head.len() + jpeg.len() + 2);
    part.extend_from_slice(head.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Endless body for `/video_feed`; ends when the session stops.
struct MjpegReader {
    slot: Arc<LatestFrame>,
    state: Arc<SessionState>,
    pending: Vec<u8>,
    pos: usize,
    last_seq: u64,
    last_sent: Option<Instant>,
}

impl MjpegReader {
    fn new(slot: Arc<LatestFrame>, state: Arc<SessionState>) -> Self {
        Self {
            slot,
            state,
            pending: Vec::new(),
            pos: 0,
            last_seq: 0,
            last_sent: None,
        }
    }

    /// Block until a newer frame is available. `false` once the session stops.
    fn refill(&mut self) -> bool {
        loop {
            if !self.state.is_running() {
                return false;
            }
            if let Some(last) = self.last_sent {
                let since = last.elapsed();
                if since < MIN_PART_INTERVAL {
                    thread::sleep(MIN_PART_INTERVAL - since);
                }
            }
            match self.slot.newer_than(self.last_seq) {
                Some(frame) => {
                    self.last_seq = frame.seq;
                    self.last_sent = Some(Instant::now());
                    self.pending = mjpeg_part(&frame.jpeg);
                    self.pos = 0;
                    return true;
                }
                None => thread::sleep(IDLE_WAIT),
            }
        }
    }
}

impl Read for MjpegReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.pos >= self.pending.len() && !self.refill() {
            return Ok(0);
        }
        let remaining = &self.pending[self.pos..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_match_method_and_path() {
        assert_eq!(route(&Method::Get, "/"), Route::Index);
        assert_eq!(route(&Method::Get, "/video_feed"), Route::VideoFeed);
        assert_eq!(route(&Method::Get, "/status?t=1"), Route::Status);
        assert_eq!(route(&Method::Post, "/toggle_debug"), Route::ToggleDebug);
        assert_eq!(route(&Method::Get, "/toggle_debug"), Route::NotFound);
        assert_eq!(route(&Method::Get, "/missing"), Route::NotFound);
    }

    #[test]
    fn part_has_multipart_framing() {
        let part = mjpeg_part(&[0xFF, 0xD8, 0xFF, 0xD9]);
        let head = b"--frame\r\nContent-Type: image/jpeg\r\nContent-Length: 4\r\n\r\n";
        assert!(part.starts_with(head));
        assert_eq!(&part[head.len()..], &[0xFF, 0xD8, 0xFF, 0xD9, b'\r', b'\n']);
    }

    #[test]
    fn reader_streams_new_frames_and_ends_with_session() {
        let slot = Arc::new(LatestFrame::new());
        let state = Arc::new(SessionState::default());
        slot.publish(vec![1, 2, 3]);

        let mut reader = MjpegReader::new(slot.clone(), state.clone());
        let mut buf = [0u8; 256];
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], mjpeg_part(&[1, 2, 3]).as_slice());

        slot.publish(vec![4]);
        let n = reader.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], mjpeg_part(&[4]).as_slice());

        state.stop();
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn reader_splits_large_parts_across_reads() {
        let slot = Arc::new(LatestFrame::new());
        let state = Arc::new(SessionState::default());
        slot.publish(vec![7; 100]);

        let mut reader = MjpegReader::new(slot, state);
        let expected = mjpeg_part(&[7; 100]);
        let mut out = Vec::new();
        let mut buf = [0u8; 32];
        while out.len() < expected.len() {
            let n = reader.read(&mut buf).unwrap();
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, expected);
    }
}
