//! Events parsed by the tracker itself, reported in experiment time.

use super::EventDetector;
use crate::clock::Clock;
use crate::config::DetectionMode;
use crate::error::{GazeError, Result};
use crate::source::{NativeEvent, SampleSource};
use crate::types::{
    BlinkEnd, BlinkStart, Event, EventKind, FixationEnd, FixationStart, GazePos, SaccadeEnd,
    SaccadeStart,
};

/// Reports the tracker's own event records.
///
/// Records that were already buffered when a wait began are skipped, so a
/// wait only returns events that happened after it was called. Positions the
/// tracker did not report are returned as [`GazePos::INVALID`].
pub struct NativeDetector<S, C> {
    source: S,
    clock: C,
}

impl<S: SampleSource, C: Clock> NativeDetector<S, C> {
    pub fn new(source: S, clock: C) -> Self {
        Self { source, clock }
    }

    /// Wait for the next fresh record of `kind`, reported in experiment time.
    fn wait_native(&mut self, kind: EventKind, timeout_ms: Option<f64>) -> Result<Option<Event>> {
        if !self.source.is_recording() {
            return Err(GazeError::NotRecording);
        }

        let t0 = self.clock.now_ms();
        loop {
            if let Some(ev) = self.source.native_event(kind)? {
                if ev.kind != kind {
                    log::warn!("Dropping native {} delivered while waiting for {kind}", ev.kind);
                    continue;
                }
                // Tracker and experiment clocks may drift; re-measure per event.
                let offset = self.source.tracker_time_ms()? - self.clock.now_ms();
                let tc = ev.time - offset;
                if tc > t0 {
                    log::debug!("Native {kind} at {tc:.1} ms");
                    return Ok(Some(Self::to_event(tc, &ev)));
                }
                log::debug!("Skipping stale native {kind} from {tc:.1} ms");
            }

            if let Some(timeout) = timeout_ms {
                if self.clock.now_ms() - t0 > timeout {
                    return Ok(None);
                }
            }
        }
    }

    /// Typed wait for the result struct of one event kind.
    fn wait_typed<T>(&mut self, kind: EventKind, timeout_ms: Option<f64>) -> Result<Option<T>>
    where
        T: TryFrom<Event, Error = Event>,
    {
        loop {
            match self.wait_native(kind, timeout_ms)? {
                None => return Ok(None),
                Some(event) => {
                    if let Ok(typed) = T::try_from(event) {
                        return Ok(Some(typed));
                    }
                }
            }
        }
    }

    fn wait_blocking<T>(&mut self, kind: EventKind) -> Result<T>
    where
        T: TryFrom<Event, Error = Event>,
    {
        loop {
            if let Some(typed) = self.wait_typed(kind, None)? {
                return Ok(typed);
            }
        }
    }

    fn to_event(tc: f64, ev: &NativeEvent) -> Event {
        let start = ev.start.unwrap_or(GazePos::INVALID);
        let end = ev.end.unwrap_or(GazePos::INVALID);
        match ev.kind {
            EventKind::SaccadeStart => SaccadeStart { timestamp: tc, start }.into(),
            EventKind::SaccadeEnd => SaccadeEnd {
                timestamp: tc,
                start,
                end,
            }
            .into(),
            EventKind::FixationStart => FixationStart { timestamp: tc, start }.into(),
            EventKind::FixationEnd => FixationEnd { timestamp: tc, start }.into(),
            EventKind::BlinkStart => BlinkStart { timestamp: tc }.into(),
            EventKind::BlinkEnd => BlinkEnd { timestamp: tc }.into(),
        }
    }
}

impl<S: SampleSource, C: Clock> EventDetector for NativeDetector<S, C> {
    fn mode(&self) -> DetectionMode {
        DetectionMode::Native
    }

    fn wait_for_saccade_start(&mut self) -> Result<SaccadeStart> {
        self.wait_blocking(EventKind::SaccadeStart)
    }

    fn wait_for_saccade_end(&mut self) -> Result<SaccadeEnd> {
        self.wait_blocking(EventKind::SaccadeEnd)
    }

    fn wait_for_fixation_start(&mut self) -> Result<FixationStart> {
        self.wait_blocking(EventKind::FixationStart)
    }

    fn wait_for_fixation_end(&mut self, timeout_ms: Option<f64>) -> Result<Option<FixationEnd>> {
        self.wait_typed(EventKind::FixationEnd, timeout_ms)
    }

    fn wait_for_blink_start(&mut self) -> Result<BlinkStart> {
        self.wait_blocking(EventKind::BlinkStart)
    }

    fn wait_for_blink_end(&mut self) -> Result<BlinkEnd> {
        self.wait_blocking(EventKind::BlinkEnd)
    }

    /// Every kind honours `timeout_ms` in native mode.
    fn wait_for_event(&mut self, kind: EventKind, timeout_ms: Option<f64>) -> Result<Option<Event>> {
        self.wait_native(kind, timeout_ms)
    }
}
