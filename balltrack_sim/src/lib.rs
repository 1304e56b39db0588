// balltrack_sim/src/lib.rs

use bevy::prelude::*;

// Import the plugins defined within the simulation crate.
use crate::simulation::core::simulation_setup::SimulationSetupPlugin;
use crate::simulation::plugins::debugging::state_error::StateErrorDebugPlugin;
use crate::simulation::plugins::sensors::camera::CameraPlugin;
use crate::simulation::plugins::tracking::TrackingPlugin;
use crate::simulation::plugins::world::WorldPlugin;

// This prelude is for convenience for other files WITHIN the balltrack_sim crate.
pub mod prelude;

// This module contains all the simulation-specific logic.
pub mod cli;
pub mod simulation;

/// `LogPlugin` filter for the binary: our crates at debug, everything else at info.
pub const LOG_FILTER: &str = "info,balltrack_sim=debug,balltrack_core=debug";

/// The main plugin that brings together all the simulation parts.
/// The binary inserts a `ScenarioConfig`, initializes `AppState` and adds this one plugin.
pub struct BallTrackSimulationPlugin;

impl Plugin for BallTrackSimulationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins((
            // Core setup (rng, clock, schedule, exit).
            SimulationSetupPlugin,
            // Ground truth: ball and robots.
            WorldPlugin,
            // Noisy detections.
            CameraPlugin,
            // The ball filters under test.
            TrackingPlugin,
            StateErrorDebugPlugin,
        ));
    }
}
