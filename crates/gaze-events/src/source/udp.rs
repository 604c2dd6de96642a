use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::UdpSocket;

use super::{NativeEvent, SampleSource};
use crate::error::SourceError;
use crate::types::{EventKind, GazePos};

#[derive(Debug, Clone, Deserialize)]
struct JsonGazeMsg {
    x: f64,
    y: f64,
    #[serde(default)]
    valid: Option<bool>,
    #[serde(default)]
    timestamp: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct JsonEventMsg {
    event: EventKind,
    time: f64,
    #[serde(default)]
    start: Option<GazePos>,
    #[serde(default)]
    end: Option<GazePos>,
}

/// A decoded datagram from the tracker bridge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GazeMessage {
    Sample {
        pos: GazePos,
        /// Tracker clock at the time of the sample.
        timestamp: Option<f64>,
    },
    Event(NativeEvent),
}

pub fn udp_gaze_addr_from_env() -> Option<SocketAddr> {
    let raw = std::env::var("GAZE_EVENTS_UDP_ADDR").ok()?;
    raw.parse::<SocketAddr>().ok()
}

pub fn parse_gaze_message(msg: &str) -> Option<GazeMessage> {
    let msg = msg.trim();
    if msg.is_empty() {
        return None;
    }

    // JSON: {"x":512,"y":384,"valid":true,"timestamp":123}
    //       {"event":"saccade_start","time":123,"start":{"x":1,"y":2}}
    if msg.starts_with('{') {
        if let Ok(e) = serde_json::from_str::<JsonEventMsg>(msg) {
            return Some(GazeMessage::Event(NativeEvent {
                kind: e.event,
                time: e.time,
                start: e.start,
                end: e.end,
            }));
        }
        if let Ok(j) = serde_json::from_str::<JsonGazeMsg>(msg) {
            let pos = if j.valid.unwrap_or(true) {
                GazePos::new(j.x, j.y)
            } else {
                GazePos::INVALID
            };
            return Some(GazeMessage::Sample {
                pos,
                timestamp: j.timestamp,
            });
        }
        return None;
    }

    // k=v tokens: x=512 y=384 valid=1 ts=123
    let mut x: Option<f64> = None;
    let mut y: Option<f64> = None;
    let mut valid = true;
    let mut timestamp: Option<f64> = None;

    for tok in msg.split_whitespace() {
        let (k, v) = tok.split_once('=')?;
        match k {
            "x" => x = v.parse().ok(),
            "y" => y = v.parse().ok(),
            "valid" => valid = !matches!(v, "0" | "false" | "no"),
            "ts" | "timestamp" => timestamp = v.parse().ok(),
            _ => {}
        }
    }

    let pos = if valid {
        GazePos::new(x?, y?)
    } else {
        GazePos::INVALID
    };
    Some(GazeMessage::Sample { pos, timestamp })
}

#[derive(Debug, Default)]
struct LinkState {
    latest: Option<GazePos>,
    tracker_time: Option<(f64, Instant)>,
    events: VecDeque<NativeEvent>,
    error: Option<String>,
}

impl LinkState {
    fn apply(&mut self, msg: GazeMessage) {
        match msg {
            GazeMessage::Sample { pos, timestamp } => {
                self.latest = Some(pos);
                if let Some(ts) = timestamp {
                    self.tracker_time = Some((ts, Instant::now()));
                }
            }
            GazeMessage::Event(ev) => {
                // Event records carry tracker time even when samples do not.
                self.tracker_time = Some((ev.time, Instant::now()));
                self.events.push_back(ev);
            }
        }
    }
}

/// Samples streamed over UDP by a tracker bridge process.
///
/// A background task owns the socket and keeps the newest sample in a shared
/// slot; polling never blocks on the network.
pub struct UdpSampleSource {
    local_addr: SocketAddr,
    state: Arc<Mutex<LinkState>>,
    recording: bool,
}

impl UdpSampleSource {
    /// Bind the listener and spawn its receive task on the current runtime.
    pub async fn bind(bind_addr: SocketAddr) -> Result<Self, SourceError> {
        let sock = UdpSocket::bind(bind_addr).await?;
        let local_addr = sock.local_addr()?;
        log::info!("UDP gaze listener bound on {local_addr}");

        let state = Arc::new(Mutex::new(LinkState::default()));
        let task_state = Arc::clone(&state);

        tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            loop {
                let (len, _src) = match sock.recv_from(&mut buf).await {
                    Ok(v) => v,
                    Err(e) => {
                        log::warn!("UDP gaze recv error: {e}");
                        task_state.lock().error = Some(e.to_string());
                        break;
                    }
                };

                match std::str::from_utf8(&buf[..len]).ok().and_then(parse_gaze_message) {
                    Some(msg) => task_state.lock().apply(msg),
                    None => log::warn!("Ignoring malformed gaze datagram ({len} bytes)"),
                }
            }
        });

        Ok(Self {
            local_addr,
            state,
            recording: false,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start acquisition. Samples and events received before this call are dropped.
    pub fn start_recording(&mut self) {
        let mut state = self.state.lock();
        state.latest = None;
        state.events.clear();
        self.recording = true;
    }

    fn check_link(state: &LinkState) -> Result<(), SourceError> {
        match &state.error {
            Some(e) => Err(SourceError::Link(e.clone())),
            None => Ok(()),
        }
    }
}

impl SampleSource for UdpSampleSource {
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn sample(&mut self) -> Result<GazePos, SourceError> {
        let state = self.state.lock();
        Self::check_link(&state)?;
        Ok(state.latest.unwrap_or(GazePos::INVALID))
    }

    fn native_event(&mut self, kind: EventKind) -> Result<Option<NativeEvent>, SourceError> {
        let mut state = self.state.lock();
        Self::check_link(&state)?;
        while let Some(ev) = state.events.pop_front() {
            if ev.kind == kind {
                return Ok(Some(ev));
            }
        }
        Ok(None)
    }

    fn tracker_time_ms(&mut self) -> Result<f64, SourceError> {
        let state = self.state.lock();
        Self::check_link(&state)?;
        match state.tracker_time {
            Some((ts, received)) => Ok(ts + received.elapsed().as_secs_f64() * 1000.0),
            None => Err(SourceError::TrackerClockUnsupported),
        }
    }
}
