//! Error types

use std::io;
use thiserror::Error;

/// Failures of the sample source (tracker link, replay trace, etc.).
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("tracker link failure: {0}")]
    Link(String),
    #[error("sample stream exhausted")]
    Exhausted,
    #[error("sample source does not provide native events")]
    NativeEventsUnsupported,
    #[error("sample source does not expose a tracker clock")]
    TrackerClockUnsupported,
    #[error("malformed sample data: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read { path: String, source: io::Error },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("heuristic detection needs a noise floor (set [noise] or run noise calibration)")]
    MissingNoiseFloor,
    #[error("invalid threshold {name}: {value}")]
    InvalidThreshold { name: &'static str, value: f64 },
}

#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("no usable samples were recorded")]
    NoSamples,
    #[error("noise floor is zero on the {0} axis")]
    Degenerate(&'static str),
}

/// Errors returned by the event detectors.
#[derive(Debug, Error)]
pub enum GazeError {
    #[error("recording was not started before waiting for gaze events")]
    NotRecording,
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Noise(#[from] NoiseError),
    #[error("event code {0} is not supported")]
    UnsupportedEventCode(u8),
}

pub type Result<T, E = GazeError> = std::result::Result<T, E>;
