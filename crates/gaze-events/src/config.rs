//! Detector configuration and threshold derivation
//!
//! Thresholds are configured in degrees of visual angle (the way experiments
//! are usually described) and converted to the pixel domain once, using the
//! screen geometry and the measured noise floor.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ConfigError;
use crate::noise::NoiseFloor;

/// Which implementation produces events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Classify events from the raw sample stream.
    #[default]
    Heuristic,
    /// Report the tracker's own parsed events.
    Native,
}

/// Display geometry used to convert visual angle to pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenGeometry {
    pub resolution_px: (f64, f64),
    pub size_cm: (f64, f64),
    /// Eye-to-screen distance.
    pub distance_cm: f64,
}

impl Default for ScreenGeometry {
    fn default() -> Self {
        Self {
            resolution_px: (1024.0, 768.0),
            size_cm: (39.9, 29.9),
            distance_cm: 57.0,
        }
    }
}

impl ScreenGeometry {
    /// Mean of the horizontal and vertical pixel densities.
    pub fn px_per_cm(&self) -> f64 {
        (self.resolution_px.0 / self.size_cm.0 + self.resolution_px.1 / self.size_cm.1) / 2.0
    }

    pub fn deg2pix(&self, angle_deg: f64) -> f64 {
        deg2pix(self.distance_cm, angle_deg, self.px_per_cm())
    }

    /// Pixels spanned by one degree of visual angle at the screen centre.
    pub fn px_per_deg(&self) -> f64 {
        self.deg2pix(1.0)
    }
}

/// Size in pixels of a stimulus spanning `angle_deg` at `distance_cm`.
pub fn deg2pix(distance_cm: f64, angle_deg: f64, px_per_cm: f64) -> f64 {
    angle_deg.to_radians().tan() * distance_cm * px_per_cm
}

/// Thresholds as written in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    pub fixation_radius_deg: f64,
    pub fixation_min_duration_ms: f64,
    pub saccade_velocity_deg_per_s: f64,
    pub saccade_acceleration_deg_per_s2: f64,
    pub blink_duration_ms: f64,
    /// Weighted-distance cutoff separating movement from noise. 1 accepts
    /// anything above the RMS noise, larger values only see bigger saccades.
    pub weighted_distance: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            fixation_radius_deg: 1.5,
            fixation_min_duration_ms: 100.0,
            saccade_velocity_deg_per_s: 35.0,
            saccade_acceleration_deg_per_s2: 9500.0,
            blink_duration_ms: 150.0,
            weighted_distance: 10.0,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub detection: DetectionMode,
    pub screen: ScreenGeometry,
    pub thresholds: ThresholdConfig,
    /// Result of a previous noise calibration, if any.
    pub noise: Option<NoiseFloor>,
}

impl DetectorConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading detector config from {}", path.display());
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Pixel-domain thresholds consumed by the heuristic detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub fixation_radius_px: f64,
    pub fixation_min_duration_ms: f64,
    pub saccade_velocity_px_per_ms: f64,
    pub saccade_accel_px_per_ms2: f64,
    pub blink_duration_ms: f64,
    pub weighted_distance: f64,
    pub noise: NoiseFloor,
}

impl Thresholds {
    /// Convert the configured thresholds to pixels and milliseconds.
    ///
    /// `noise` takes precedence over the noise floor stored in the config.
    pub fn from_config(
        config: &DetectorConfig,
        noise: Option<NoiseFloor>,
    ) -> Result<Self, ConfigError> {
        let noise = noise
            .or(config.noise)
            .ok_or(ConfigError::MissingNoiseFloor)?;
        let screen = &config.screen;
        let t = &config.thresholds;
        let px_per_deg = screen.px_per_deg();

        let thresholds = Self {
            fixation_radius_px: screen.deg2pix(t.fixation_radius_deg),
            fixation_min_duration_ms: t.fixation_min_duration_ms,
            saccade_velocity_px_per_ms: t.saccade_velocity_deg_per_s * px_per_deg / 1_000.0,
            saccade_accel_px_per_ms2: t.saccade_acceleration_deg_per_s2 * px_per_deg
                / 1_000_000.0,
            blink_duration_ms: t.blink_duration_ms,
            weighted_distance: t.weighted_distance,
            noise,
        };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("fixation_radius_px", self.fixation_radius_px),
            ("saccade_velocity_px_per_ms", self.saccade_velocity_px_per_ms),
            ("saccade_accel_px_per_ms2", self.saccade_accel_px_per_ms2),
            ("rms_x", self.noise.rms_x),
            ("rms_y", self.noise.rms_y),
        ];
        let non_negative = [
            ("fixation_min_duration_ms", self.fixation_min_duration_ms),
            ("blink_duration_ms", self.blink_duration_ms),
            ("weighted_distance", self.weighted_distance),
        ];

        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deg2pix_matches_small_angle() {
        // One degree at 57 cm is almost exactly 1 cm.
        let px = deg2pix(57.0, 1.0, 10.0);
        assert!((px - 9.95).abs() < 0.01, "got {px}");
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let cfg = DetectorConfig::from_toml_str(
            r#"
            detection = "native"

            [thresholds]
            blink_duration_ms = 200.0

            [noise]
            rms_x = 0.8
            rms_y = 1.2
            "#,
        )
        .unwrap();

        assert_eq!(cfg.detection, DetectionMode::Native);
        assert_eq!(cfg.thresholds.blink_duration_ms, 200.0);
        assert_eq!(cfg.thresholds.fixation_min_duration_ms, 100.0);
        assert_eq!(cfg.screen, ScreenGeometry::default());
        assert_eq!(cfg.noise, Some(NoiseFloor { rms_x: 0.8, rms_y: 1.2 }));
    }

    #[test]
    fn thresholds_need_a_noise_floor() {
        let cfg = DetectorConfig::default();
        assert!(matches!(
            Thresholds::from_config(&cfg, None),
            Err(ConfigError::MissingNoiseFloor)
        ));
    }

    #[test]
    fn thresholds_convert_units() {
        let cfg = DetectorConfig::default();
        let noise = NoiseFloor { rms_x: 1.0, rms_y: 1.0 };
        let t = Thresholds::from_config(&cfg, Some(noise)).unwrap();

        let ppd = cfg.screen.px_per_deg();
        assert!((t.saccade_velocity_px_per_ms - 35.0 * ppd / 1000.0).abs() < 1e-9);
        assert!((t.saccade_accel_px_per_ms2 - 9500.0 * ppd / 1e6).abs() < 1e-9);
        assert!(t.fixation_radius_px > 1.5 * ppd);
        assert_eq!(t.blink_duration_ms, 150.0);
        assert_eq!(t.noise, noise);
    }

    #[test]
    fn zero_noise_is_rejected() {
        let cfg = DetectorConfig::default();
        let noise = NoiseFloor { rms_x: 0.0, rms_y: 1.0 };
        assert!(matches!(
            Thresholds::from_config(&cfg, Some(noise)),
            Err(ConfigError::InvalidThreshold { name: "rms_x", .. })
        ));
    }
}
