// balltrack_core/src/config.rs

//! Tunable parameters of the ball filters.
//!
//! Every section deserializes with defaults so a scenario file only needs to
//! name the values it overrides.

use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::{millis, Timestamp};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BallFilterConfig {
    pub ground: GroundFilterParams,
    pub gate: GateParams,
    pub past_filter: PastFilterParams,
    pub possession: PossessionParams,
    /// Highest camera id the vision system can report.
    pub max_camera_id: u32,
}

impl Default for BallFilterConfig {
    fn default() -> Self {
        Self {
            ground: GroundFilterParams::default(),
            gate: GateParams::default(),
            past_filter: PastFilterParams::default(),
            possession: PossessionParams::default(),
            max_camera_id: 31,
        }
    }
}

impl BallFilterConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ground.validate()?;
        self.gate.validate()?;
        self.past_filter.validate()?;
        self.possession.validate()
    }
}

// =========================================================================
// == Sections ==
// =========================================================================

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GroundFilterParams {
    /// Rolling friction deceleration, m/s^2.
    pub rolling_deceleration: f64,
    /// Spectral density of the white-noise acceleration, m^2/s^3.
    pub acceleration_noise: f64,
    /// Standard deviation of a single detection, m.
    pub measurement_stddev: f64,
    /// Velocity standard deviation of a freshly created filter, m/s.
    pub initial_velocity_stddev: f64,
}

impl Default for GroundFilterParams {
    fn default() -> Self {
        Self {
            rolling_deceleration: 0.35,
            acceleration_noise: 2.0,
            measurement_stddev: 0.004,
            initial_velocity_stddev: 2.0,
        }
    }
}

impl GroundFilterParams {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("ground.rolling_deceleration", self.rolling_deceleration)?;
        positive("ground.acceleration_noise", self.acceleration_noise)?;
        positive("ground.measurement_stddev", self.measurement_stddev)?;
        positive("ground.initial_velocity_stddev", self.initial_velocity_stddev)
    }
}

/// The statistical gate applied against the primary filter.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GateParams {
    /// Distance always accepted regardless of uncertainty, m.
    pub base_distance: f64,
    /// Number of standard deviations added on top of `base_distance`.
    pub sigma_scale: f64,
    /// Fastest a ball can plausibly travel, m/s. Caps the lagged-filter rescue.
    pub max_ball_speed: f64,
}

impl Default for GateParams {
    fn default() -> Self {
        Self {
            base_distance: 0.05,
            sigma_scale: 4.0,
            max_ball_speed: 8.0,
        }
    }
}

impl GateParams {
    fn validate(&self) -> Result<(), ConfigError> {
        non_negative("gate.base_distance", self.base_distance)?;
        positive("gate.sigma_scale", self.sigma_scale)?;
        positive("gate.max_ball_speed", self.max_ball_speed)
    }
}

/// The lagged twin: down-sampled and noisier, so it reacts to real motion
/// changes the primary filter is too confident to follow.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PastFilterParams {
    /// Minimum spacing between two corrections of the past filter, ms.
    pub sample_interval_ms: u64,
    /// Multiplier on `ground.acceleration_noise`.
    pub noise_scale: f64,
    /// Distance always accepted by the second opinion, m.
    pub tolerance: f64,
    pub sigma_scale: f64,
}

impl Default for PastFilterParams {
    fn default() -> Self {
        Self {
            sample_interval_ms: 40,
            noise_scale: 50.0,
            tolerance: 0.1,
            sigma_scale: 4.0,
        }
    }
}

impl PastFilterParams {
    pub fn sample_interval(&self) -> Timestamp {
        millis(self.sample_interval_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        at_least("past_filter.sample_interval_ms", 1, self.sample_interval_ms)?;
        positive("past_filter.noise_scale", self.noise_scale)?;
        non_negative("past_filter.tolerance", self.tolerance)?;
        positive("past_filter.sigma_scale", self.sigma_scale)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PossessionParams {
    /// Robots whose reference point is within this distance of the ball are
    /// candidates for dribbling it, m.
    pub capture_radius: f64,
    /// Allowed drift of the ball-to-robot offset, m.
    pub offset_tolerance: f64,
    /// Consecutive coherent detections needed before possession is declared.
    pub confirm_frames: u32,
    /// How long the offset may stay violated before possession is released, ms.
    pub release_delay_ms: u64,
}

impl Default for PossessionParams {
    fn default() -> Self {
        Self {
            capture_radius: 0.15,
            offset_tolerance: 0.03,
            confirm_frames: 3,
            release_delay_ms: 50,
        }
    }
}

impl PossessionParams {
    pub fn release_delay(&self) -> Timestamp {
        millis(self.release_delay_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        positive("possession.capture_radius", self.capture_radius)?;
        positive("possession.offset_tolerance", self.offset_tolerance)?;
        at_least("possession.confirm_frames", 1, u64::from(self.confirm_frames))
    }
}

// --- Validation helpers ---

pub(crate) fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { field, value })
    }
}

pub(crate) fn non_negative(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::Negative { field, value })
    }
}

pub(crate) fn at_least(field: &'static str, min: u64, value: u64) -> Result<(), ConfigError> {
    if value >= min {
        Ok(())
    } else {
        Err(ConfigError::TooSmall { field, min, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(BallFilterConfig::default().validate(), Ok(()));
    }

    #[test]
    fn rejects_non_positive_measurement_noise() {
        let mut config = BallFilterConfig::default();
        config.ground.measurement_stddev = 0.0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::NotPositive {
                field: "ground.measurement_stddev",
                value: 0.0
            })
        );
    }

    #[test]
    fn rejects_nan_and_zero_counts() {
        let mut config = BallFilterConfig::default();
        config.gate.sigma_scale = f64::NAN;
        assert!(config.validate().is_err());

        let mut config = BallFilterConfig::default();
        config.possession.confirm_frames = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::TooSmall { min: 1, .. })
        ));
    }
}
