// balltrack_core/src/types.rs

use nalgebra::{Matrix2, Rotation2, Vector2};
use serde::Deserialize;

// --- Core Type Aliases ---
/// Monotonic capture time in nanoseconds. Never wall-clock.
pub type Timestamp = i64;

pub const NANOS_PER_SEC: f64 = 1e9;
pub const NANOS_PER_MILLI: i64 = 1_000_000;

/// Seconds elapsed from `from` to `to`. Negative spans are clamped to zero.
pub fn secs_between(from: Timestamp, to: Timestamp) -> f64 {
    (to.saturating_sub(from)).max(0) as f64 / NANOS_PER_SEC
}

/// `ms` milliseconds as a timestamp span, saturating at `Timestamp::MAX`.
pub fn millis(ms: u64) -> Timestamp {
    i64::try_from(ms)
        .unwrap_or(i64::MAX)
        .saturating_mul(NANOS_PER_MILLI)
}

// --- Core Identifiers ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
pub struct CameraId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
pub struct RobotId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Blue,
    Yellow,
}

impl std::fmt::Display for CameraId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cam{}", self.0)
    }
}

impl std::fmt::Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "robot{}", self.0)
    }
}

// --- Small geometry helpers shared by the filters ---

/// Rotates a field-frame vector into a frame rotated by `angle`.
pub fn to_local(v: &Vector2<f64>, angle: f64) -> Vector2<f64> {
    Rotation2::new(-angle) * v
}

/// Rotates a local-frame vector back into the field frame.
pub fn to_field(v: &Vector2<f64>, angle: f64) -> Vector2<f64> {
    Rotation2::new(angle) * v
}

/// Variance along the worst axis of a 2x2 position covariance.
pub fn largest_variance(cov: &Matrix2<f64>) -> f64 {
    cov.symmetric_eigenvalues().max().max(0.0)
}
