//! Gaze Events
//!
//! Streams detected gaze events as JSON lines on stdout.
//!
//! Samples come from a tracker bridge sending UDP datagrams to
//! `GAZE_EVENTS_UDP_ADDR` (default `127.0.0.1:5555`), or from a recorded trace
//! when `GAZE_EVENTS_REPLAY` names a JSON-lines file. The detector config is
//! read from the first argument or `GAZE_EVENTS_CONFIG`.

use anyhow::{bail, Context, Result};
use gaze_events::source::{udp_gaze_addr_from_env, ReplaySource, Trace, UdpSampleSource};
use gaze_events::{
    build_detector, calibrate_noise, Clock, DetectionMode, DetectorConfig, EventDetector, EventKind,
    ExperimentClock, GazeError, SampleSource, SimClock, SourceError,
};
use log::LevelFilter;
use std::env;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const DEFAULT_UDP_ADDR: &str = "127.0.0.1:5555";
const DEFAULT_KINDS: [EventKind; 2] = [EventKind::FixationStart, EventKind::FixationEnd];

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(LevelFilter::Info)
        .init();

    let config = match env::args().nth(1).or_else(|| env::var("GAZE_EVENTS_CONFIG").ok()) {
        Some(path) => DetectorConfig::load(&path)
            .with_context(|| format!("loading detector config {path}"))?,
        None => {
            log::info!("No config given, using defaults");
            DetectorConfig::default()
        }
    };

    let kinds = match env::var("GAZE_EVENTS_KINDS") {
        Ok(raw) => parse_kinds(&raw)?,
        Err(_) => DEFAULT_KINDS.to_vec(),
    };
    let timeout_ms = env_f64("GAZE_EVENTS_TIMEOUT_MS")?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        if handler_stop.swap(true, Ordering::SeqCst) {
            // Second Ctrl+C while a wait is blocking.
            std::process::exit(130);
        }
        log::info!("Received shutdown signal, stopping after the current wait...");
    })?;

    if let Ok(path) = env::var("GAZE_EVENTS_REPLAY") {
        let poll_ms = env_f64("GAZE_EVENTS_POLL_MS")?.unwrap_or(1.0);
        let trace = Trace::load(&path).with_context(|| format!("loading trace {path}"))?;
        let clock = SimClock::new(0.0);
        let mut source = ReplaySource::new(trace, clock.clone(), poll_ms);
        source.start_recording();
        return run(config, source, clock, &kinds, timeout_ms, &stop);
    }

    let addr = match udp_gaze_addr_from_env() {
        Some(addr) => addr,
        None => DEFAULT_UDP_ADDR.parse::<SocketAddr>()?,
    };
    // The runtime drives the UDP listener while detection blocks this thread.
    let runtime = tokio::runtime::Runtime::new()?;
    let mut source = runtime
        .block_on(UdpSampleSource::bind(addr))
        .with_context(|| format!("binding UDP gaze listener on {addr}"))?;
    source.start_recording();
    run(config, source, ExperimentClock::start(), &kinds, timeout_ms, &stop)
}

fn run<S, C>(
    mut config: DetectorConfig,
    mut source: S,
    clock: C,
    kinds: &[EventKind],
    timeout_ms: Option<f64>,
    stop: &AtomicBool,
) -> Result<()>
where
    S: SampleSource,
    C: Clock,
{
    if config.detection == DetectionMode::Heuristic && config.noise.is_none() {
        log::info!("No noise floor configured; keep the eyes on a fixed point");
        config.noise = Some(calibrate_noise(&mut source, &clock)?);
    }

    let mut detector = build_detector(&config, source, clock)?;
    log::info!("Waiting for {kinds:?}");
    stream_events(&mut detector, kinds, timeout_ms, stop, &mut std::io::stdout().lock())
}

/// Wait for `kinds` in turn, writing each event as a JSON line, until `stop`
/// is raised or the sample stream ends.
fn stream_events<D, W>(
    detector: &mut D,
    kinds: &[EventKind],
    timeout_ms: Option<f64>,
    stop: &AtomicBool,
    out: &mut W,
) -> Result<()>
where
    D: EventDetector + ?Sized,
    W: Write,
{
    'outer: loop {
        for &kind in kinds {
            if stop.load(Ordering::SeqCst) {
                break 'outer;
            }
            match detector.wait_for_event(kind, timeout_ms) {
                Ok(Some(event)) => {
                    serde_json::to_writer(&mut *out, &event)?;
                    writeln!(out)?;
                }
                Ok(None) => log::info!("No {kind} within {timeout_ms:?} ms"),
                Err(GazeError::Source(SourceError::Exhausted)) => {
                    log::info!("Sample stream finished");
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    log::info!("Shutdown complete");
    Ok(())
}

fn parse_kinds(raw: &str) -> Result<Vec<EventKind>> {
    let kinds = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| EventKind::from_name(s).with_context(|| format!("unknown event kind {s:?}")))
        .collect::<Result<Vec<_>>>()?;
    if kinds.is_empty() {
        bail!("GAZE_EVENTS_KINDS names no event kinds");
    }
    Ok(kinds)
}

fn env_f64(name: &str) -> Result<Option<f64>> {
    match env::var(name) {
        Ok(raw) => Ok(Some(
            raw.parse()
                .with_context(|| format!("{name} must be a number, got {raw:?}"))?,
        )),
        Err(_) => Ok(None),
    }
}
