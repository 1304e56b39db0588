// balltrack_sim/src/simulation/config/structs.rs

use balltrack_core::config::BallFilterConfig;
use balltrack_core::messages::CameraInfo;
use balltrack_core::tracking::ManagerConfig;
use balltrack_core::types::{CameraId, RobotId, Team};
use bevy::prelude::Resource;
use nalgebra::{Vector2, Vector3};
use serde::Deserialize;

// =========================================================================
// == Top-Level Configuration Resource ==
// =========================================================================

/// # ScenarioConfig
/// The Bevy resource holding everything parsed from a scenario TOML file.
#[derive(Resource, Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: Simulation,

    // The TOML has `[[cameras]]`, which becomes a Vec of CameraConfig structs.
    #[serde(default)]
    pub cameras: Vec<CameraConfig>,

    #[serde(default)]
    pub ball: BallConfig,

    #[serde(default)]
    pub robots: Vec<RobotConfig>,

    /// Passed straight to every ball filter.
    #[serde(default)]
    pub filter: BallFilterConfig,

    #[serde(default)]
    pub tracker: ManagerConfig,
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in a scenario.toml file.
// =========================================================================

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Simulation {
    /// Optional seed for the pseudo-random number generator for determinism.
    pub seed: Option<u64>,
    /// Simulated duration in seconds.
    pub duration_seconds: f64,
    /// Simulated time advanced by every app update, in milliseconds.
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
}

fn default_step_ms() -> u64 {
    1
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: 10.0,
            step_ms: default_step_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConfig {
    pub id: u32,
    /// Mounting position `[x, y, height]` in field coordinates, m.
    pub position: [f64; 3],
    /// Visible rectangle `[min_x, min_y, max_x, max_y]` on the field, m.
    pub coverage: [f64; 4],
    pub rate_hz: f64,
    /// Delay between capture and delivery of a detection, ms.
    pub latency_ms: u64,
    pub noise_stddev: f64,
    pub dropout_probability: f64,
    /// Chance that a frame reports a spurious ball somewhere in the coverage.
    pub outlier_probability: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            id: 0,
            position: [0.0, 0.0, 4.0],
            coverage: [-4.5, -3.0, 4.5, 3.0],
            rate_hz: 60.0,
            latency_ms: 0,
            noise_stddev: 0.003,
            dropout_probability: 0.0,
            outlier_probability: 0.0,
        }
    }
}

impl CameraConfig {
    pub fn camera_id(&self) -> CameraId {
        CameraId(self.id)
    }

    pub fn info(&self) -> CameraInfo {
        let [x, y, z] = self.position;
        CameraInfo::new(self.camera_id(), Vector3::new(x, y, z))
    }

    pub fn covers(&self, point: &Vector2<f64>) -> bool {
        let [min_x, min_y, max_x, max_y] = self.coverage;
        (min_x..=max_x).contains(&point.x) && (min_y..=max_y).contains(&point.y)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BallConfig {
    pub position: [f64; 2],
    pub velocity: [f64; 2],
    /// Rolling friction of the simulated ball, m/s^2.
    pub deceleration: f64,
}

impl Default for BallConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            velocity: [0.0, 0.0],
            deceleration: 0.35,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RobotConfig {
    pub id: u32,
    pub team: Team,
    pub position: [f64; 2],
    #[serde(default)]
    pub velocity: [f64; 2],
    /// Heading in radians.
    #[serde(default)]
    pub orientation: f64,
    #[serde(default)]
    pub dribble: Option<DribbleConfig>,
}

impl RobotConfig {
    pub fn robot_id(&self) -> RobotId {
        RobotId(self.id)
    }
}

/// Scripted ball handling: the robot takes the ball at `start_s`, carries it
/// and kicks it at `end_s`.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DribbleConfig {
    pub start_s: f64,
    pub end_s: f64,
    /// Robot velocity while carrying the ball.
    #[serde(default)]
    pub carry_velocity: [f64; 2],
    /// Ball speed along the robot heading right after the kick, m/s.
    #[serde(default)]
    pub kick_speed: f64,
    /// Distance from the robot center to the dribbler, m.
    #[serde(default = "default_dribbler_distance")]
    pub dribbler_distance: f64,
}

fn default_dribbler_distance() -> f64 {
    0.09
}

pub fn vec2(v: [f64; 2]) -> Vector2<f64> {
    Vector2::new(v[0], v[1])
}
