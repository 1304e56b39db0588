// balltrack_core/src/estimation/mod.rs

use dyn_clone::DynClone;
use std::any::Any;
use std::fmt::Debug;

use crate::messages::{BallState, RobotInfo, VisionFrame};
use crate::types::{CameraId, RobotId, Timestamp};

/// Where a ball filter is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingPhase {
    /// Created from a detection, nothing incorporated since.
    Initializing,
    /// Following detections, trusting `camera` as primary.
    Tracking { camera: CameraId },
    /// Carried by `robot`; vision is optional.
    Dribbled { robot: RobotId },
    /// No accepted detection within the stale timeout.
    Stale,
}

/// The contract for any algorithm that tracks the ball in one motion regime.
///
/// The filter manager holds every filter as a `Box<dyn BallFilter>` and feeds
/// it in timestamp order. None of these operations may fail or panic: bad
/// input degrades to keeping the best estimate available.
pub trait BallFilter: DynClone + Debug + Send + Sync {
    /// Incorporates a detection that already passed [`Self::accept_detection`].
    fn process_vision_frame(&mut self, frame: &VisionFrame, robots: &[RobotInfo]);

    /// Gating decision for a candidate detection.
    fn accept_detection(&self, frame: &VisionFrame) -> bool;

    /// Overwrites `ball` with the estimate at `time`. Pure query.
    fn write_ball_state(&self, ball: &mut BallState, time: Timestamp, robots: &[RobotInfo]);

    /// Picks one detection out of several taken at the same instant.
    /// Returns `None` only for an empty (or entirely malformed) slice.
    fn choose_ball(&self, frames: &[VisionFrame]) -> Option<usize>;

    /// A copy of this filter with its primary camera rebound to `camera`.
    fn derive_with_new_primary_camera(&self, camera: CameraId) -> Box<dyn BallFilter>;

    fn primary_camera(&self) -> CameraId;

    /// Timestamp of the most recent accepted detection (the watermark).
    fn last_vision_time(&self) -> Timestamp;

    fn creation_time(&self) -> Timestamp;

    /// Number of detections incorporated since creation.
    fn frames_processed(&self) -> u64;

    fn phase(&self, now: Timestamp, stale_timeout: Timestamp) -> TrackingPhase;

    /// Allows for dynamic downcasting to access filter-specific methods if needed.
    fn as_any(&self) -> &dyn Any;
}

// This macro automatically generates the implementation of `Clone` for `Box<dyn BallFilter>`.
dyn_clone::clone_trait_object!(BallFilter);

pub mod filters;
pub mod possession;
