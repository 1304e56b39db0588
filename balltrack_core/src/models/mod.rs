// balltrack_core/src/models/mod.rs

use nalgebra::{Matrix4, Vector4};

/// Ball state vector `[px, py, vx, vy]`.
pub type BallVector = Vector4<f64>;
/// Covariance matching [`BallVector`].
pub type BallCovariance = Matrix4<f64>;

pub mod rolling;
