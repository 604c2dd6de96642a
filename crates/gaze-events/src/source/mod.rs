//! Sample sources - where gaze positions and native tracker events come from

use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::types::{EventKind, GazePos};

mod replay;
mod udp;

pub use replay::{ReplaySource, Trace, TraceRecord};
pub use udp::{parse_gaze_message, udp_gaze_addr_from_env, GazeMessage, UdpSampleSource};

/// An event record parsed by the tracker itself.
///
/// `time` is on the tracker's clock, not the experiment clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NativeEvent {
    pub kind: EventKind,
    pub time: f64,
    #[serde(default)]
    pub start: Option<GazePos>,
    #[serde(default)]
    pub end: Option<GazePos>,
}

/// A polled eye tracker.
pub trait SampleSource {
    /// Whether sample acquisition has been started.
    fn is_recording(&self) -> bool;

    /// Newest known gaze position, or [`GazePos::INVALID`].
    ///
    /// Polling faster than the tracker samples returns the same position again.
    fn sample(&mut self) -> Result<GazePos, SourceError>;

    /// Next pending native event of `kind`, if one has arrived.
    ///
    /// Pending records of other kinds are consumed and dropped, the way the
    /// tracker's link buffer is drained.
    fn native_event(&mut self, _kind: EventKind) -> Result<Option<NativeEvent>, SourceError> {
        Err(SourceError::NativeEventsUnsupported)
    }

    /// Current time on the tracker's own clock.
    fn tracker_time_ms(&mut self) -> Result<f64, SourceError> {
        Err(SourceError::TrackerClockUnsupported)
    }
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn is_recording(&self) -> bool {
        (**self).is_recording()
    }

    fn sample(&mut self) -> Result<GazePos, SourceError> {
        (**self).sample()
    }

    fn native_event(&mut self, kind: EventKind) -> Result<Option<NativeEvent>, SourceError> {
        (**self).native_event(kind)
    }

    fn tracker_time_ms(&mut self) -> Result<f64, SourceError> {
        (**self).tracker_time_ms()
    }
}

impl<S: SampleSource + ?Sized> SampleSource for &mut S {
    fn is_recording(&self) -> bool {
        (**self).is_recording()
    }

    fn sample(&mut self) -> Result<GazePos, SourceError> {
        (**self).sample()
    }

    fn native_event(&mut self, kind: EventKind) -> Result<Option<NativeEvent>, SourceError> {
        (**self).native_event(kind)
    }

    fn tracker_time_ms(&mut self) -> Result<f64, SourceError> {
        (**self).tracker_time_ms()
    }
}
