//! Core data types for gaze event detection

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GazeError;

/// A polled gaze position in screen pixels.
///
/// The exact position `(-1, -1)` is the tracker's "no data" sentinel (eye
/// lost, blink, track loss). Every other position is a valid sample, including
/// off-screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GazePos {
    pub x: f64,
    pub y: f64,
}

impl GazePos {
    /// Sentinel reported when the tracker has no valid gaze data.
    pub const INVALID: GazePos = GazePos { x: -1.0, y: -1.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Squared Euclidean distance to `other`.
    pub fn distance_sq(&self, other: GazePos) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn distance(&self, other: GazePos) -> f64 {
        self.distance_sq(other).sqrt()
    }
}

impl From<(f64, f64)> for GazePos {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GazePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

/// The six event kinds, numbered with the tracker's own event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BlinkStart,
    BlinkEnd,
    SaccadeStart,
    SaccadeEnd,
    FixationStart,
    FixationEnd,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::BlinkStart,
        EventKind::BlinkEnd,
        EventKind::SaccadeStart,
        EventKind::SaccadeEnd,
        EventKind::FixationStart,
        EventKind::FixationEnd,
    ];

    pub fn code(&self) -> u8 {
        match self {
            Self::BlinkStart => 3,
            Self::BlinkEnd => 4,
            Self::SaccadeStart => 5,
            Self::SaccadeEnd => 6,
            Self::FixationStart => 7,
            Self::FixationEnd => 8,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlinkStart => "blink_start",
            Self::BlinkEnd => "blink_end",
            Self::SaccadeStart => "saccade_start",
            Self::SaccadeEnd => "saccade_end",
            Self::FixationStart => "fixation_start",
            Self::FixationEnd => "fixation_end",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl TryFrom<u8> for EventKind {
    type Error = GazeError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|k| k.code() == code)
            .ok_or(GazeError::UnsupportedEventCode(code))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Start of a saccade: the last position before the eye started moving.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaccadeStart {
    pub timestamp: f64,
    pub start: GazePos,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SaccadeEnd {
    pub timestamp: f64,
    pub start: GazePos,
    pub end: GazePos,
}

/// Start of a fixation, positioned at the dwell anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixationStart {
    pub timestamp: f64,
    pub start: GazePos,
}

/// End of a fixation. `start` is the position the fixation was anchored at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixationEnd {
    pub timestamp: f64,
    pub start: GazePos,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkStart {
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkEnd {
    pub timestamp: f64,
}

/// A detected gaze event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    SaccadeStart(SaccadeStart),
    SaccadeEnd(SaccadeEnd),
    FixationStart(FixationStart),
    FixationEnd(FixationEnd),
    BlinkStart(BlinkStart),
    BlinkEnd(BlinkEnd),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::SaccadeStart(_) => EventKind::SaccadeStart,
            Self::SaccadeEnd(_) => EventKind::SaccadeEnd,
            Self::FixationStart(_) => EventKind::FixationStart,
            Self::FixationEnd(_) => EventKind::FixationEnd,
            Self::BlinkStart(_) => EventKind::BlinkStart,
            Self::BlinkEnd(_) => EventKind::BlinkEnd,
        }
    }

    pub fn timestamp(&self) -> f64 {
        match self {
            Self::SaccadeStart(e) => e.timestamp,
            Self::SaccadeEnd(e) => e.timestamp,
            Self::FixationStart(e) => e.timestamp,
            Self::FixationEnd(e) => e.timestamp,
            Self::BlinkStart(e) => e.timestamp,
            Self::BlinkEnd(e) => e.timestamp,
        }
    }
}

macro_rules! event_variant {
    ($($variant:ident),* $(,)?) => {$(
        impl From<$variant> for Event {
            fn from(ev: $variant) -> Self {
                Event::$variant(ev)
            }
        }

        /// Gives the event back unchanged when it is a different kind.
        impl TryFrom<Event> for $variant {
            type Error = Event;

            fn try_from(ev: Event) -> std::result::Result<Self, Event> {
                match ev {
                    Event::$variant(inner) => Ok(inner),
                    other => Err(other),
                }
            }
        }
    )*};
}

event_variant!(SaccadeStart, SaccadeEnd, FixationStart, FixationEnd, BlinkStart, BlinkEnd);
