//! Replay of recorded gaze traces against a simulated clock.
//!
//! Every poll advances the shared [`SimClock`] by a fixed interval, so a
//! detector driven by a `ReplaySource` sees the trace exactly as it would have
//! seen a live tracker polled at that rate.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::io::BufRead;
use std::path::Path;

use super::{NativeEvent, SampleSource};
use crate::clock::{Clock, SimClock};
use crate::error::SourceError;
use crate::types::{EventKind, GazePos};

/// One line of a JSON-lines trace file.
///
/// `{"t":12.0,"x":512.0,"y":384.0}` is a sample, `{"t":40.0,"event":"saccade_start","start":{"x":..,"y":..}}`
/// a native event. Times are experiment milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TraceRecord {
    Event {
        t: f64,
        event: EventKind,
        #[serde(default)]
        start: Option<GazePos>,
        #[serde(default)]
        end: Option<GazePos>,
    },
    Sample {
        t: f64,
        x: f64,
        y: f64,
    },
}

/// A time-ordered recording of samples and native events.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    samples: Vec<(f64, GazePos)>,
    events: Vec<(f64, EventKind, Option<GazePos>, Option<GazePos>)>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: impl IntoIterator<Item = (f64, GazePos)>) -> Self {
        let mut trace = Self::new();
        for (t, pos) in samples {
            trace.push_sample(t, pos);
        }
        trace
    }

    pub fn push_sample(&mut self, t: f64, pos: GazePos) -> &mut Self {
        self.samples.push((t, pos));
        self
    }

    pub fn push_event(
        &mut self,
        t: f64,
        kind: EventKind,
        start: Option<GazePos>,
        end: Option<GazePos>,
    ) -> &mut Self {
        self.events.push((t, kind, start, end));
        self
    }

    pub fn push_record(&mut self, record: TraceRecord) -> &mut Self {
        match record {
            TraceRecord::Sample { t, x, y } => self.push_sample(t, GazePos::new(x, y)),
            TraceRecord::Event { t, event, start, end } => self.push_event(t, event, start, end),
        }
    }

    /// Parse a JSON-lines trace. Blank lines are skipped.
    pub fn from_jsonl(reader: impl BufRead) -> Result<Self, SourceError> {
        let mut trace = Self::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: TraceRecord = serde_json::from_str(line)
                .map_err(|e| SourceError::Parse(format!("line {}: {e}", lineno + 1)))?;
            trace.push_record(record);
        }
        Ok(trace)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_jsonl(std::io::BufReader::new(file))
    }

    /// Time of the last record, or `None` for an empty trace.
    pub fn end_ms(&self) -> Option<f64> {
        let last_sample = self.samples.iter().map(|(t, _)| *t);
        let last_event = self.events.iter().map(|(t, ..)| *t);
        last_sample.chain(last_event).reduce(f64::max)
    }

    pub fn len(&self) -> usize {
        self.samples.len() + self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sort(&mut self) {
        self.samples.sort_by(|a, b| a.0.total_cmp(&b.0));
        self.events.sort_by(|a, b| a.0.total_cmp(&b.0));
    }
}

/// Plays a [`Trace`] back as a polled tracker.
pub struct ReplaySource {
    trace: Trace,
    end_ms: Option<f64>,
    clock: SimClock,
    poll_interval_ms: f64,
    tracker_offset_ms: f64,
    recording: bool,
    sample_cursor: usize,
    event_cursor: usize,
    pending: VecDeque<NativeEvent>,
}

impl ReplaySource {
    /// `clock` is advanced by `poll_interval_ms` on every poll.
    pub fn new(mut trace: Trace, clock: SimClock, poll_interval_ms: f64) -> Self {
        trace.sort();
        Self {
            end_ms: trace.end_ms(),
            trace,
            clock,
            poll_interval_ms,
            tracker_offset_ms: 0.0,
            recording: false,
            sample_cursor: 0,
            event_cursor: 0,
            pending: VecDeque::new(),
        }
    }

    /// Offset of the simulated tracker clock from the experiment clock.
    pub fn with_tracker_offset(mut self, offset_ms: f64) -> Self {
        self.tracker_offset_ms = offset_ms;
        self
    }

    pub fn start_recording(&mut self) {
        log::info!(
            "Replaying {} trace records at {} ms per poll",
            self.trace.len(),
            self.poll_interval_ms
        );
        self.recording = true;
    }

    fn tick(&mut self) -> Result<f64, SourceError> {
        let now = self.clock.advance(self.poll_interval_ms);
        match self.end_ms {
            Some(end) if now <= end => Ok(now),
            _ => Err(SourceError::Exhausted),
        }
    }
}

impl SampleSource for ReplaySource {
    fn is_recording(&self) -> bool {
        self.recording
    }

    fn sample(&mut self) -> Result<GazePos, SourceError> {
        let now = self.tick()?;
        let samples = &self.trace.samples;
        while self.sample_cursor < samples.len() && samples[self.sample_cursor].0 <= now {
            self.sample_cursor += 1;
        }
        Ok(match self.sample_cursor {
            0 => GazePos::INVALID,
            n => samples[n - 1].1,
        })
    }

    fn native_event(&mut self, kind: EventKind) -> Result<Option<NativeEvent>, SourceError> {
        let now = self.tick()?;
        let events = &self.trace.events;
        while self.event_cursor < events.len() && events[self.event_cursor].0 <= now {
            let (t, event_kind, start, end) = events[self.event_cursor];
            self.pending.push_back(NativeEvent {
                kind: event_kind,
                time: t + self.tracker_offset_ms,
                start,
                end,
            });
            self.event_cursor += 1;
        }

        while let Some(ev) = self.pending.pop_front() {
            if ev.kind == kind {
                return Ok(Some(ev));
            }
        }
        Ok(None)
    }

    fn tracker_time_ms(&mut self) -> Result<f64, SourceError> {
        Ok(self.clock.now_ms() + self.tracker_offset_ms)
    }
}
