//! RMS noise floor estimation
//!
//! The noise floor is the per-axis root-mean-square of sample-to-sample
//! differences recorded while the participant looks at a fixed dot. The
//! heuristic saccade detector divides displacements by it to tell real
//! movement from tracker jitter.

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::error::{GazeError, NoiseError};
use crate::source::SampleSource;
use crate::types::GazePos;

/// Default length of a noise recording.
pub const NOISE_RECORDING_MS: f64 = 1000.0;

/// Time given to settle on the dot before recording starts.
pub const NOISE_SETTLE_MS: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseFloor {
    pub rms_x: f64,
    pub rms_y: f64,
}

impl NoiseFloor {
    /// Estimate the noise floor from a recording.
    ///
    /// Invalid samples, `(0, 0)` samples and repeats of the previous kept
    /// sample are dropped. The first kept sample only serves as the reference
    /// for the first difference.
    pub fn from_samples(samples: &[GazePos]) -> Result<Self, NoiseError> {
        let mut kept: Vec<GazePos> = Vec::with_capacity(samples.len());
        for &s in samples {
            if !s.is_valid() || (s.x == 0.0 && s.y == 0.0) {
                continue;
            }
            if kept.last() == Some(&s) {
                continue;
            }
            kept.push(s);
        }

        if kept.len() < 2 {
            return Err(NoiseError::NoSamples);
        }

        let n = (kept.len() - 1) as f64;
        let (sum_x, sum_y) = kept.windows(2).fold((0.0, 0.0), |(sx, sy), w| {
            let dx = w[1].x - w[0].x;
            let dy = w[1].y - w[0].y;
            (sx + dx * dx, sy + dy * dy)
        });

        let floor = Self {
            rms_x: (sum_x / n).sqrt(),
            rms_y: (sum_y / n).sqrt(),
        };
        if floor.rms_x <= 0.0 {
            return Err(NoiseError::Degenerate("x"));
        }
        if floor.rms_y <= 0.0 {
            return Err(NoiseError::Degenerate("y"));
        }
        Ok(floor)
    }
}

/// Poll `source` for `duration_ms` and estimate the noise floor.
pub fn record_noise<S, C>(source: &mut S, clock: &C, duration_ms: f64) -> Result<NoiseFloor, GazeError>
where
    S: SampleSource + ?Sized,
    C: Clock + ?Sized,
{
    if !source.is_recording() {
        return Err(GazeError::NotRecording);
    }

    log::info!("Recording noise floor for {duration_ms} ms");
    let mut samples = Vec::new();
    let t0 = clock.now_ms();
    while clock.now_ms() - t0 < duration_ms {
        let s = source.sample()?;
        if samples.last() != Some(&s) {
            samples.push(s);
        }
    }

    let floor = NoiseFloor::from_samples(&samples)?;
    log::info!(
        "Noise floor: rms_x={:.3} rms_y={:.3} from {} samples",
        floor.rms_x,
        floor.rms_y,
        samples.len()
    );
    Ok(floor)
}

/// Let the gaze settle for [`NOISE_SETTLE_MS`], then record for
/// [`NOISE_RECORDING_MS`].
pub fn calibrate_noise<S, C>(source: &mut S, clock: &C) -> Result<NoiseFloor, GazeError>
where
    S: SampleSource + ?Sized,
    C: Clock + ?Sized,
{
    if !source.is_recording() {
        return Err(GazeError::NotRecording);
    }
    clock.pause(NOISE_SETTLE_MS);
    record_noise(source, clock, NOISE_RECORDING_MS)
}
