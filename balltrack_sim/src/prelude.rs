// balltrack_sim/src/prelude.rs

// Re-export the entire Bevy prelude for convenience.
pub use bevy::prelude::*;

// Re-export the balltrack_core prelude so pure types like `VisionFrame`,
// `BallState` and `FilterManager` are at hand.
pub use balltrack_core::prelude::*;

// Re-export common simulation-specific types for easy access in other plugins.
pub use crate::simulation::config::structs::ScenarioConfig;
pub use crate::simulation::core::app_state::{AppState, SimulationSet};
pub use crate::simulation::core::clock::SimulationClock;
pub use crate::simulation::plugins::tracking::{BallTracker, EstimatedBall};
