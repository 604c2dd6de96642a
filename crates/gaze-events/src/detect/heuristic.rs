//! Threshold-based event classification over the raw sample stream.

use super::EventDetector;
use crate::clock::Clock;
use crate::config::{DetectionMode, Thresholds};
use crate::error::{GazeError, Result};
use crate::noise::NoiseFloor;
use crate::source::SampleSource;
use crate::types::{
    BlinkEnd, BlinkStart, FixationEnd, FixationStart, GazePos, SaccadeEnd, SaccadeStart,
};

/// Rolling state of one saccade wait: the previous sample, the time the
/// velocity was last measured and that velocity.
#[derive(Debug, Clone, Copy)]
struct Motion {
    prev: GazePos,
    t0: f64,
    v0: f64,
}

impl Motion {
    /// Squared displacement from `prev` in units of the noise floor.
    fn weighted_distance(&self, pos: GazePos, noise: &NoiseFloor) -> f64 {
        let wx = (pos.x - self.prev.x) / noise.rms_x;
        let wy = (pos.y - self.prev.y) / noise.rms_y;
        wx * wx + wy * wy
    }

    /// Velocity and acceleration of the step from `prev` to `pos` at `t1`.
    ///
    /// `None` while the clock has not moved since `t0`.
    fn kinematics(&self, pos: GazePos, t1: f64) -> Option<(f64, f64)> {
        let dt = t1 - self.t0;
        if dt <= 0.0 {
            return None;
        }
        let v1 = self.prev.distance(pos) / dt;
        let a = (v1 - self.v0) / dt;
        Some((v1, a))
    }

    fn roll(&mut self, t1: f64, v1: f64) {
        self.t0 = t1;
        self.v0 = v1;
    }
}

fn expired(deadline: Option<f64>, now: f64) -> bool {
    deadline.is_some_and(|d| now > d)
}

/// Classifies events from polled samples using fixed thresholds.
pub struct HeuristicDetector<S, C> {
    source: S,
    clock: C,
    thresholds: Thresholds,
}

impl<S: SampleSource, C: Clock> HeuristicDetector<S, C> {
    pub fn new(source: S, clock: C, thresholds: Thresholds) -> Self {
        Self {
            source,
            clock,
            thresholds,
        }
    }

    fn ensure_recording(&self) -> Result<()> {
        if self.source.is_recording() {
            Ok(())
        } else {
            Err(GazeError::NotRecording)
        }
    }

    /// Newest sample and the time it was read.
    fn poll(&mut self) -> Result<(GazePos, f64)> {
        let pos = self.source.sample()?;
        Ok((pos, self.clock.now_ms()))
    }

    fn next_valid(&mut self) -> Result<(GazePos, f64)> {
        loop {
            let (pos, t) = self.poll()?;
            if pos.is_valid() {
                return Ok((pos, t));
            }
        }
    }

    fn outside_fixation(&self, anchor: GazePos, pos: GazePos) -> bool {
        let r = self.thresholds.fixation_radius_px;
        anchor.distance_sq(pos) > r * r
    }

    fn fixation_start_until(&mut self, deadline: Option<f64>) -> Result<Option<FixationStart>> {
        let (mut anchor, mut t0) = loop {
            let (pos, t) = self.poll()?;
            if pos.is_valid() {
                break (pos, t);
            }
            if expired(deadline, t) {
                return Ok(None);
            }
        };

        loop {
            let (pos, t1) = self.poll()?;
            if pos.is_valid() {
                if self.outside_fixation(anchor, pos) {
                    anchor = pos;
                    t0 = t1;
                } else if t1 - t0 >= self.thresholds.fixation_min_duration_ms {
                    log::debug!("Fixation start at {t1:.1} ms, anchor {anchor}");
                    return Ok(Some(FixationStart {
                        timestamp: t1,
                        start: anchor,
                    }));
                }
            }
            if expired(deadline, t1) {
                return Ok(None);
            }
        }
    }
}

impl<S: SampleSource, C: Clock> EventDetector for HeuristicDetector<S, C> {
    fn mode(&self) -> DetectionMode {
        DetectionMode::Heuristic
    }

    fn wait_for_saccade_start(&mut self) -> Result<SaccadeStart> {
        self.ensure_recording()?;

        let (first, t) = self.next_valid()?;
        let mut m = Motion {
            prev: first,
            t0: t,
            v0: 0.0,
        };

        loop {
            let (pos, t1) = self.poll()?;
            if !pos.is_valid() || pos == m.prev {
                continue;
            }

            // Sub-noise steps move `prev` along but leave the velocity baseline alone.
            if m.weighted_distance(pos, &self.thresholds.noise) > self.thresholds.weighted_distance {
                let Some((v1, a)) = m.kinematics(pos, t1) else {
                    continue;
                };
                if v1 > self.thresholds.saccade_velocity_px_per_ms
                    || a > self.thresholds.saccade_accel_px_per_ms2
                {
                    log::debug!(
                        "Saccade start at {t1:.1} ms from {} (v={v1:.3} px/ms, a={a:.4} px/ms^2)",
                        m.prev
                    );
                    return Ok(SaccadeStart {
                        timestamp: t1,
                        start: m.prev,
                    });
                }
                m.roll(t1, v1);
            }
            m.prev = pos;
        }
    }

    fn wait_for_saccade_end(&mut self) -> Result<SaccadeEnd> {
        let start = self.wait_for_saccade_start()?;

        let (first, t1) = self.next_valid()?;
        let dt = t1 - start.timestamp;
        let v0 = if dt > 0.0 {
            start.start.distance(first) / dt
        } else {
            0.0
        };
        let mut m = Motion {
            prev: first,
            t0: t1,
            v0,
        };

        loop {
            let (pos, t1) = self.poll()?;
            if !pos.is_valid() || pos == m.prev {
                continue;
            }
            let Some((v1, a)) = m.kinematics(pos, t1) else {
                continue;
            };

            let accel = self.thresholds.saccade_accel_px_per_ms2;
            if v1 < self.thresholds.saccade_velocity_px_per_ms && a > -accel && a < 0.0 {
                log::debug!("Saccade end at {t1:.1} ms: {} -> {pos}", start.start);
                return Ok(SaccadeEnd {
                    timestamp: t1,
                    start: start.start,
                    end: pos,
                });
            }
            m.roll(t1, v1);
            m.prev = pos;
        }
    }

    fn wait_for_fixation_start(&mut self) -> Result<FixationStart> {
        self.ensure_recording()?;
        loop {
            if let Some(fix) = self.fixation_start_until(None)? {
                return Ok(fix);
            }
        }
    }

    fn wait_for_fixation_end(&mut self, timeout_ms: Option<f64>) -> Result<Option<FixationEnd>> {
        self.ensure_recording()?;
        let deadline = timeout_ms.map(|t| self.clock.now_ms() + t);

        let Some(fix) = self.fixation_start_until(deadline)? else {
            log::debug!("Fixation end wait timed out before a fixation started");
            return Ok(None);
        };

        loop {
            let (pos, t) = self.poll()?;
            if pos.is_valid() && self.outside_fixation(fix.start, pos) {
                log::debug!("Fixation end at {t:.1} ms, anchor {}", fix.start);
                return Ok(Some(FixationEnd {
                    timestamp: t,
                    start: fix.start,
                }));
            }
            if expired(deadline, t) {
                log::debug!("Fixation end wait timed out at {t:.1} ms");
                return Ok(None);
            }
        }
    }

    fn wait_for_blink_start(&mut self) -> Result<BlinkStart> {
        self.ensure_recording()?;

        loop {
            let (pos, candidate) = self.poll()?;
            if pos.is_valid() {
                continue;
            }

            loop {
                let (pos, t) = self.poll()?;
                if pos.is_valid() {
                    log::debug!(
                        "Track loss at {candidate:.1} ms lasted {:.1} ms, not a blink",
                        t - candidate
                    );
                    break;
                }
                if t - candidate >= self.thresholds.blink_duration_ms {
                    log::debug!("Blink start at {candidate:.1} ms");
                    return Ok(BlinkStart {
                        timestamp: candidate,
                    });
                }
            }
        }
    }

    fn wait_for_blink_end(&mut self) -> Result<BlinkEnd> {
        self.ensure_recording()?;

        loop {
            let (pos, t) = self.poll()?;
            if pos.is_valid() {
                log::debug!("Blink end at {t:.1} ms");
                return Ok(BlinkEnd { timestamp: t });
            }
        }
    }
}
