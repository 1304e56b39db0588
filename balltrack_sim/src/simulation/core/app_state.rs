// balltrack_sim/src/simulation/core/app_state.rs

use bevy::{ecs::schedule::SystemSet, prelude::States};

/// Defines the major phases of the application's lifecycle.
#[derive(States, Debug, Clone, Eq, PartialEq, Hash, Default)]
pub enum AppState {
    /// The initial state. The scene is built from the scenario here.
    #[default]
    Loading,

    /// The main simulation loop is running.
    Running,

    /// Simulated time ran out. Reports are written and the app exits.
    Finished,
}

// =========================================================================
// == Main Simulation Sets (The "Data Flow Graph") ==
// =========================================================================

#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub enum SimulationSet {
    /// Advances simulated time. Runs first.
    Clock,
    /// Moves the ball and the robots (ground truth).
    World,
    /// Cameras turn ground truth into noisy detections.
    Sensors,
    /// The ball filters consume detections and publish an estimate.
    Tracking,
    /// Compares the estimate against ground truth.
    Validation,
}
