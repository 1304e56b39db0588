// balltrack_sim/src/simulation/config/mod.rs

//! Loads and validates scenario files.

pub mod structs;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use balltrack_core::error::ConfigError;
use figment::{
    providers::{Format, Toml},
    Figment,
};
use thiserror::Error;

pub use structs::{BallConfig, CameraConfig, DribbleConfig, RobotConfig, ScenarioConfig, Simulation};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("scenario file not found: {0}")]
    Missing(PathBuf),
    #[error("failed to parse scenario: {0}")]
    Parse(#[from] figment::Error),
    #[error("invalid filter settings: {0}")]
    Filter(#[from] ConfigError),
    #[error("camera {id}: {reason}")]
    Camera { id: u32, reason: &'static str },
    #[error("robot {id}: {reason}")]
    Robot { id: u32, reason: &'static str },
    #[error("simulation: {0}")]
    Simulation(&'static str),
}

/// Reads a scenario TOML file from disk and validates it.
pub fn load_scenario(path: &Path) -> Result<ScenarioConfig, ScenarioError> {
    // Figment treats a missing file as an empty one.
    if !path.is_file() {
        return Err(ScenarioError::Missing(path.to_path_buf()));
    }
    let config: ScenarioConfig = Figment::new().merge(Toml::file(path)).extract()?;
    config.validate()?;
    Ok(config)
}

impl ScenarioConfig {
    /// Parses and validates a scenario held in memory.
    pub fn from_toml_str(toml: &str) -> Result<Self, ScenarioError> {
        let config: ScenarioConfig = Figment::new().merge(Toml::string(toml)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ScenarioError> {
        self.filter.validate()?;
        self.tracker.validate()?;

        let sim = &self.simulation;
        if !(sim.duration_seconds.is_finite() && sim.duration_seconds > 0.0) {
            return Err(ScenarioError::Simulation("duration_seconds must be positive"));
        }
        if sim.step_ms == 0 {
            return Err(ScenarioError::Simulation("step_ms must be at least 1"));
        }
        if self.cameras.is_empty() {
            return Err(ScenarioError::Simulation("at least one camera is required"));
        }

        let mut camera_ids = BTreeSet::new();
        for camera in &self.cameras {
            let fail = |reason| ScenarioError::Camera {
                id: camera.id,
                reason,
            };
            if !camera_ids.insert(camera.id) {
                return Err(fail("duplicate id"));
            }
            if camera.id > self.filter.max_camera_id {
                return Err(fail("id above filter.max_camera_id"));
            }
            if !(camera.rate_hz.is_finite() && camera.rate_hz > 0.0) {
                return Err(fail("rate_hz must be positive"));
            }
            if !(camera.noise_stddev.is_finite() && camera.noise_stddev >= 0.0) {
                return Err(fail("noise_stddev must be non-negative"));
            }
            let [min_x, min_y, max_x, max_y] = camera.coverage;
            if !(min_x < max_x && min_y < max_y) {
                return Err(fail("coverage must be [min_x, min_y, max_x, max_y]"));
            }
            let probabilities = [camera.dropout_probability, camera.outlier_probability];
            if !probabilities.iter().all(|p| (0.0..=1.0).contains(p)) {
                return Err(fail("probabilities must lie in [0, 1]"));
            }
        }

        let mut robot_ids = BTreeSet::new();
        for robot in &self.robots {
            let fail = |reason| ScenarioError::Robot {
                id: robot.id,
                reason,
            };
            if !robot_ids.insert(robot.id) {
                return Err(fail("duplicate id"));
            }
            if let Some(dribble) = &robot.dribble {
                if !(dribble.start_s >= 0.0 && dribble.end_s > dribble.start_s) {
                    return Err(fail("dribble window must satisfy 0 <= start_s < end_s"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use balltrack_core::types::Team;

    const MINIMAL: &str = r#"
        [simulation]
        seed = 7
        duration_seconds = 2.0

        [[cameras]]
        id = 0
        position = [-2.0, 0.0, 4.0]

        [[cameras]]
        id = 1
        position = [2.0, 0.0, 4.0]
        latency_ms = 5

        [ball]
        velocity = [1.5, 0.0]

        [[robots]]
        id = 3
        team = "yellow"
        position = [1.0, 0.0]
        dribble = { start_s = 0.5, end_s = 1.0, kick_speed = 4.0 }

        [filter.gate]
        sigma_scale = 5.0

        [tracker]
        max_filters = 4
    "#;

    #[test]
    fn parses_a_full_scenario() {
        let config = ScenarioConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.step_ms, 1);
        assert_eq!(config.cameras.len(), 2);
        assert_eq!(config.cameras[1].latency_ms, 5);
        assert_eq!(config.cameras[1].rate_hz, 60.0);
        assert_eq!(config.robots[0].team, Team::Yellow);

        let dribble = config.robots[0].dribble.unwrap();
        assert_eq!(dribble.dribbler_distance, 0.09);
        assert_eq!(dribble.kick_speed, 4.0);

        // Overridden values merge with the defaults of their section.
        assert_eq!(config.filter.gate.sigma_scale, 5.0);
        assert_eq!(config.filter.gate.base_distance, 0.05);
        assert_eq!(config.tracker.max_filters, 4);
    }

    #[test]
    fn rejects_unknown_fields() {
        let toml = format!("{MINIMAL}\n[ball.spin]\nrate = 3.0\n");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&toml),
            Err(ScenarioError::Parse(_))
        ));
    }

    #[test]
    fn rejects_duplicate_cameras() {
        let toml = r#"
            [[cameras]]
            id = 2
            [[cameras]]
            id = 2
        "#;
        assert!(matches!(
            ScenarioConfig::from_toml_str(toml),
            Err(ScenarioError::Camera { id: 2, .. })
        ));
    }

    #[test]
    fn rejects_invalid_filter_settings() {
        let toml = format!("{MINIMAL}\n[filter.ground]\nmeasurement_stddev = -1.0\n");
        assert!(matches!(
            ScenarioConfig::from_toml_str(&toml),
            Err(ScenarioError::Filter(_))
        ));
    }

    #[test]
    fn bundled_scenarios_are_valid() {
        for name in ["00_rolling_ball.toml", "01_dribble_and_kick.toml"] {
            let path = Path::new("assets/scenarios").join(name);
            if let Err(e) = load_scenario(&path) {
                panic!("{name}: {e}");
            }
        }
    }

    #[test]
    fn missing_file_is_reported() {
        let path = Path::new("assets/scenarios/does_not_exist.toml");
        assert!(matches!(
            load_scenario(path),
            Err(ScenarioError::Missing(_))
        ));
    }
}
