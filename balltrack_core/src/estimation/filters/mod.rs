// balltrack_core/src/estimation/filters/mod.rs

pub mod ground;
pub mod ground_collision;

pub use ground::{GroundFilter, GroundState};
pub use ground_collision::BallGroundCollisionFilter;
