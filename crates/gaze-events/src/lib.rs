//! # Gaze Events
//!
//! Fixation, saccade and blink detection for eye-tracking experiments.
//!
//! A [`SampleSource`] is polled for the newest gaze position and a [`Clock`]
//! supplies experiment time. An [`EventDetector`] turns that stream into
//! events, either by classifying raw samples ([`HeuristicDetector`]) or by
//! relaying the events the tracker parsed itself ([`NativeDetector`]).
//!
//! ```no_run
//! use gaze_events::{build_detector, DetectorConfig, EventDetector, ExperimentClock};
//! use gaze_events::source::{ReplaySource, Trace};
//! use gaze_events::clock::SimClock;
//!
//! # fn main() -> anyhow::Result<()> {
//! let clock = SimClock::new(0.0);
//! let mut source = ReplaySource::new(Trace::load("session.jsonl")?, clock.clone(), 1.0);
//! source.start_recording();
//!
//! let config = DetectorConfig::load("detector.toml")?;
//! let mut detector = build_detector(&config, source, clock)?;
//! let fix = detector.wait_for_fixation_start()?;
//! println!("fixation at {} from {:.1} ms", fix.start, fix.timestamp);
//! # let _ = ExperimentClock::start();
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod detect;
pub mod drift;
pub mod error;
pub mod noise;
pub mod source;
pub mod types;

pub use clock::{Clock, ExperimentClock, SimClock};
pub use config::{DetectionMode, DetectorConfig, ScreenGeometry, ThresholdConfig, Thresholds};
pub use detect::{build_detector, EventDetector, HeuristicDetector, NativeDetector};
pub use error::{ConfigError, GazeError, NoiseError, SourceError};
pub use noise::{calibrate_noise, record_noise, NoiseFloor};
pub use source::{NativeEvent, SampleSource};
pub use types::*;
