//! Gaze event detection
//!
//! Two interchangeable detectors implement [`EventDetector`]:
//!
//! - [`HeuristicDetector`] classifies fixations, saccades and blinks from the
//!   raw sample stream using velocity, acceleration, dwell and duration
//!   thresholds.
//! - [`NativeDetector`] waits for the events the tracker parsed itself and
//!   reports them in the same shape.
//!
//! Every wait blocks the calling thread until its event occurs. Only one wait
//! may be outstanding per detector; the `&mut self` receivers enforce that.

use crate::clock::Clock;
use crate::config::{DetectionMode, DetectorConfig, Thresholds};
use crate::error::{ConfigError, Result};
use crate::source::SampleSource;
use crate::types::{
    BlinkEnd, BlinkStart, Event, EventKind, FixationEnd, FixationStart, SaccadeEnd, SaccadeStart,
};

mod heuristic;
mod native;

pub use heuristic::HeuristicDetector;
pub use native::NativeDetector;

pub trait EventDetector {
    fn mode(&self) -> DetectionMode;

    /// Wait until the eyes start moving fast; returns where they left from.
    fn wait_for_saccade_start(&mut self) -> Result<SaccadeStart>;

    /// Wait for a complete saccade; returns its start and landing positions.
    fn wait_for_saccade_end(&mut self) -> Result<SaccadeEnd>;

    fn wait_for_fixation_start(&mut self) -> Result<FixationStart>;

    /// Wait for the current (or next) fixation to end.
    ///
    /// `timeout_ms` bounds the whole wait, including finding the fixation.
    /// Returns `Ok(None)` when it expires.
    fn wait_for_fixation_end(&mut self, timeout_ms: Option<f64>) -> Result<Option<FixationEnd>>;

    /// Returns the time the blink started, once it has lasted long enough to
    /// count as a blink.
    fn wait_for_blink_start(&mut self) -> Result<BlinkStart>;

    fn wait_for_blink_end(&mut self) -> Result<BlinkEnd>;

    /// Wait for an event of the given kind.
    ///
    /// The heuristic detector only honours `timeout_ms` for fixation ends.
    fn wait_for_event(&mut self, kind: EventKind, timeout_ms: Option<f64>) -> Result<Option<Event>> {
        Ok(Some(match kind {
            EventKind::SaccadeStart => Event::SaccadeStart(self.wait_for_saccade_start()?),
            EventKind::SaccadeEnd => Event::SaccadeEnd(self.wait_for_saccade_end()?),
            EventKind::FixationStart => Event::FixationStart(self.wait_for_fixation_start()?),
            EventKind::FixationEnd => match self.wait_for_fixation_end(timeout_ms)? {
                Some(ev) => Event::FixationEnd(ev),
                None => return Ok(None),
            },
            EventKind::BlinkStart => Event::BlinkStart(self.wait_for_blink_start()?),
            EventKind::BlinkEnd => Event::BlinkEnd(self.wait_for_blink_end()?),
        }))
    }

    /// Wait for an event given by the tracker's numeric event code.
    fn wait_for_event_code(&mut self, code: u8, timeout_ms: Option<f64>) -> Result<Option<Event>> {
        let kind = EventKind::try_from(code)?;
        self.wait_for_event(kind, timeout_ms)
    }
}

impl<D: EventDetector + ?Sized> EventDetector for Box<D> {
    fn mode(&self) -> DetectionMode {
        (**self).mode()
    }

    fn wait_for_saccade_start(&mut self) -> Result<SaccadeStart> {
        (**self).wait_for_saccade_start()
    }

    fn wait_for_saccade_end(&mut self) -> Result<SaccadeEnd> {
        (**self).wait_for_saccade_end()
    }

    fn wait_for_fixation_start(&mut self) -> Result<FixationStart> {
        (**self).wait_for_fixation_start()
    }

    fn wait_for_fixation_end(&mut self, timeout_ms: Option<f64>) -> Result<Option<FixationEnd>> {
        (**self).wait_for_fixation_end(timeout_ms)
    }

    fn wait_for_blink_start(&mut self) -> Result<BlinkStart> {
        (**self).wait_for_blink_start()
    }

    fn wait_for_blink_end(&mut self) -> Result<BlinkEnd> {
        (**self).wait_for_blink_end()
    }

    fn wait_for_event(&mut self, kind: EventKind, timeout_ms: Option<f64>) -> Result<Option<Event>> {
        (**self).wait_for_event(kind, timeout_ms)
    }
}

/// Build the detector selected by `config.detection`.
///
/// Heuristic detection needs a noise floor, taken from `config.noise`.
pub fn build_detector<'a, S, C>(
    config: &DetectorConfig,
    source: S,
    clock: C,
) -> std::result::Result<Box<dyn EventDetector + 'a>, ConfigError>
where
    S: SampleSource + 'a,
    C: Clock + 'a,
{
    match config.detection {
        DetectionMode::Heuristic => {
            let thresholds = Thresholds::from_config(config, None)?;
            log::info!(
                "Heuristic event detection: fixation radius {:.1} px, velocity {:.3} px/ms, acceleration {:.5} px/ms^2",
                thresholds.fixation_radius_px,
                thresholds.saccade_velocity_px_per_ms,
                thresholds.saccade_accel_px_per_ms2
            );
            Ok(Box::new(HeuristicDetector::new(source, clock, thresholds)))
        }
        DetectionMode::Native => {
            log::info!("Native event detection: reporting tracker-parsed events");
            Ok(Box::new(NativeDetector::new(source, clock)))
        }
    }
}
