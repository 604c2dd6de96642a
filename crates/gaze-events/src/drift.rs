//! Fixation-triggered drift check
//!
//! Waits until the participant holds their gaze steadily, then compares the
//! mean gaze position to the target they were asked to look at.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{GazeError, Result};
use crate::source::SampleSource;
use crate::types::GazePos;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftParams {
    /// Number of steady samples to average.
    pub min_samples: usize,
    /// Largest accepted distance between the mean gaze and the target.
    pub max_deviation_px: f64,
    /// A per-axis jump larger than this restarts sample collection.
    pub reset_threshold_px: f64,
    pub timeout_ms: Option<f64>,
}

impl Default for DriftParams {
    fn default() -> Self {
        Self {
            min_samples: 30,
            max_deviation_px: 60.0,
            reset_threshold_px: 30.0,
            timeout_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftCheck {
    pub target: GazePos,
    pub mean_gaze: GazePos,
    /// Distance between `mean_gaze` and `target`.
    pub error_px: f64,
    pub accepted: bool,
    pub timestamp: f64,
}

impl DriftCheck {
    /// Offset to add to measured gaze to land on the target.
    pub fn correction(&self) -> (f64, f64) {
        (
            self.target.x - self.mean_gaze.x,
            self.target.y - self.mean_gaze.y,
        )
    }
}

/// Collect a steady run of samples and measure how far it is from `target`.
///
/// Returns `Ok(None)` if `params.timeout_ms` expires first.
pub fn check_drift<S, C>(
    source: &mut S,
    clock: &C,
    target: GazePos,
    params: &DriftParams,
) -> Result<Option<DriftCheck>>
where
    S: SampleSource + ?Sized,
    C: Clock + ?Sized,
{
    if !source.is_recording() {
        return Err(GazeError::NotRecording);
    }

    let min_samples = params.min_samples.max(1);
    let deadline = params.timeout_ms.map(|t| clock.now_ms() + t);
    let mut run: Vec<GazePos> = Vec::with_capacity(min_samples);

    while run.len() < min_samples {
        let s = source.sample()?;
        let now = clock.now_ms();
        if deadline.is_some_and(|d| now > d) {
            log::debug!("Drift check timed out with {} steady samples", run.len());
            return Ok(None);
        }
        if !s.is_valid() || s.x < 0.0 || s.y < 0.0 {
            continue;
        }

        match run.last() {
            Some(&last) if last == s => {}
            Some(&last)
                if (s.x - last.x).abs() > params.reset_threshold_px
                    || (s.y - last.y).abs() > params.reset_threshold_px =>
            {
                run.clear();
            }
            _ => run.push(s),
        }
    }

    let n = run.len() as f64;
    let mean_gaze = GazePos::new(
        run.iter().map(|p| p.x).sum::<f64>() / n,
        run.iter().map(|p| p.y).sum::<f64>() / n,
    );
    let error_px = mean_gaze.distance(target);
    let accepted = error_px <= params.max_deviation_px;
    log::info!("Drift check: mean gaze {mean_gaze}, target {target}, error {error_px:.1} px");

    Ok(Some(DriftCheck {
        target,
        mean_gaze,
        error_px,
        accepted,
        timestamp: clock.now_ms(),
    }))
}
