// balltrack_core/src/estimation/filters/ground_collision.rs

use std::any::Any;
use std::cmp::Ordering;

use nalgebra::Vector2;
use tracing::{debug, trace};

use crate::config::BallFilterConfig;
use crate::estimation::filters::ground::GroundFilter;
use crate::estimation::possession::{BallOffsetTracker, PossessionUpdate};
use crate::estimation::{BallFilter, TrackingPhase};
use crate::messages::{BallState, CameraInfo, RobotInfo, VisionFrame};
use crate::types::{secs_between, CameraId, Timestamp};

/// Detections below this confidence are weighted as if they had it.
const MIN_CONFIDENCE: f64 = 0.1;

/// Ball filter for a ball rolling on the ground, possibly dribbled by a robot.
///
/// Owns two [`GroundFilter`]s: the primary one holds the best estimate, the
/// past one is a down-sampled, noisier twin whose opinion can overrule the
/// primary gate when the ball genuinely changed its motion.
#[derive(Debug, Clone, PartialEq)]
pub struct BallGroundCollisionFilter {
    config: BallFilterConfig,
    ground_filter: GroundFilter,
    past_filter: GroundFilter,
    offset_tracker: BallOffsetTracker,
    last_vision_time: Timestamp,
    creation_time: Timestamp,
    /// Camera, timestamp and position of the last incorporated detection, for
    /// de-duplication.
    last_detection: (CameraId, Timestamp, Vector2<f64>),
    frames_processed: u64,
}

impl BallGroundCollisionFilter {
    /// Starts a filter at the first detection of a new ball.
    ///
    /// `camera` is the camera that produced `frame`; oblique views start with a
    /// wider position variance. `config` is expected to be validated.
    pub fn new(frame: &VisionFrame, camera: &CameraInfo, config: BallFilterConfig) -> Self {
        let ground = &config.ground;
        let obliqueness = camera.obliqueness(&frame.position);
        let initial_variance = ground.measurement_stddev.powi(2) * (1.0 + obliqueness.powi(2));

        let ground_filter = GroundFilter::new(
            frame.position,
            frame.timestamp,
            frame.camera_id,
            ground,
            initial_variance,
        );
        let past_filter = ground_filter
            .clone()
            .with_noise_scale(config.past_filter.noise_scale);

        debug!(
            camera = %frame.camera_id,
            x = frame.position.x,
            y = frame.position.y,
            "created ground ball filter"
        );

        Self {
            offset_tracker: BallOffsetTracker::new(config.possession),
            config,
            ground_filter,
            past_filter,
            last_vision_time: frame.timestamp,
            creation_time: frame.timestamp,
            last_detection: (frame.camera_id, frame.timestamp, frame.position),
            frames_processed: 0,
        }
    }

    /// Handover: inherits every number of `donor` and only rebinds the camera
    /// the primary filter trusts.
    pub fn derive_with_new_primary_camera(donor: &Self, camera: CameraId) -> Self {
        let mut derived = donor.clone();
        derived.ground_filter.set_primary_camera(camera);
        debug!(
            from = %donor.ground_filter.primary_camera(),
            to = %camera,
            "primary camera handover"
        );
        derived
    }

    pub fn ground_filter(&self) -> &GroundFilter {
        &self.ground_filter
    }

    pub fn past_filter(&self) -> &GroundFilter {
        &self.past_filter
    }

    pub fn offset_tracker(&self) -> &BallOffsetTracker {
        &self.offset_tracker
    }

    // --- Private Helper Methods ---

    fn variance_scale(frame: &VisionFrame) -> f64 {
        frame
            .confidence
            .map_or(1.0, |c| 1.0 / c.max(MIN_CONFIDENCE))
    }

    fn is_redelivery(&self, frame: &VisionFrame) -> bool {
        self.last_detection == (frame.camera_id, frame.timestamp, frame.position)
    }

    /// Distance to the primary prediction and whether it is inside the gate.
    fn primary_gate(&self, frame: &VisionFrame) -> (f64, bool) {
        let gate = &self.config.gate;
        let predicted = self.ground_filter.current_state(frame.timestamp);
        let distance = (frame.position - predicted.position).norm();
        let sigma =
            (predicted.position_variance() + self.ground_filter.measurement_variance()).sqrt();
        (
            distance,
            distance <= gate.base_distance + gate.sigma_scale * sigma,
        )
    }

    /// Second opinion of the past filter, capped by how far a ball can travel
    /// since the primary filter's last update.
    fn past_gate(&self, frame: &VisionFrame) -> bool {
        let gate = &self.config.gate;
        let past = &self.config.past_filter;

        let predicted = self.past_filter.current_state(frame.timestamp);
        let distance = (frame.position - predicted.position).norm();
        let sigma =
            (predicted.position_variance() + self.past_filter.measurement_variance()).sqrt();
        let since_primary = secs_between(self.ground_filter.last_update(), frame.timestamp);
        let reach = gate.base_distance + gate.max_ball_speed * since_primary;

        distance <= (past.tolerance + past.sigma_scale * sigma).min(reach)
    }

    /// Orders two candidate detections for `choose_ball`.
    fn compare_candidates(
        (ia, da, a): (usize, f64, &VisionFrame),
        (ib, db, b): (usize, f64, &VisionFrame),
    ) -> Ordering {
        let confidence = |f: &VisionFrame| f.confidence.unwrap_or(-1.0);
        da.total_cmp(&db)
            .then_with(|| confidence(b).total_cmp(&confidence(a)))
            .then_with(|| a.camera_id.cmp(&b.camera_id))
            .then_with(|| ia.cmp(&ib))
    }
}

// --- The Public Trait Implementation ---
impl BallFilter for BallGroundCollisionFilter {
    fn process_vision_frame(&mut self, frame: &VisionFrame, robots: &[RobotInfo]) {
        if !frame.is_well_formed(self.config.max_camera_id) {
            debug!(camera = %frame.camera_id, "dropping malformed detection");
            return;
        }
        if self.is_redelivery(frame) {
            trace!(camera = %frame.camera_id, timestamp = frame.timestamp, "duplicate detection");
            return;
        }

        let variance_scale = Self::variance_scale(frame);
        if let Err(err) = self
            .ground_filter
            .correct(&frame.position, frame.timestamp, variance_scale)
        {
            debug!(camera = %frame.camera_id, "failed to correct ground filter: {err}");
            return;
        }

        // The lagged twin only sees a down-sampled view of the stream.
        let since_past = frame.timestamp.saturating_sub(self.past_filter.last_update());
        if since_past >= self.config.past_filter.sample_interval() {
            if let Err(err) =
                self.past_filter
                    .correct(&frame.position, frame.timestamp, variance_scale)
            {
                debug!("failed to correct past filter: {err}");
            }
        }

        match self
            .offset_tracker
            .update(&frame.position, robots, frame.timestamp)
        {
            PossessionUpdate::Acquired(_) | PossessionUpdate::Held(_) => {
                // A dribbled ball moves with its robot, not with rolling friction.
                let on_dribbler = self
                    .offset_tracker
                    .carried_position(frame.timestamp)
                    .is_some_and(|p| {
                        (frame.position - p).norm() <= self.config.possession.offset_tolerance
                    });
                if let (true, Some(velocity)) =
                    (on_dribbler, self.offset_tracker.carried_velocity())
                {
                    self.ground_filter.set_velocity(velocity);
                }
            }
            PossessionUpdate::Released { .. } | PossessionUpdate::Free => {}
        }

        self.last_vision_time = self.last_vision_time.max(frame.timestamp);
        self.last_detection = (frame.camera_id, frame.timestamp, frame.position);
        self.frames_processed += 1;
    }

    fn accept_detection(&self, frame: &VisionFrame) -> bool {
        if !frame.is_well_formed(self.config.max_camera_id) {
            return false;
        }

        let last_update = self.ground_filter.last_update();
        let from_primary = frame.camera_id == self.ground_filter.primary_camera();
        if frame.timestamp < last_update || (!from_primary && frame.timestamp == last_update) {
            trace!(camera = %frame.camera_id, "rejecting out-of-order detection");
            return false;
        }
        if self.is_redelivery(frame) {
            return true;
        }

        if let Some(carried) = self.offset_tracker.carried_position(frame.timestamp) {
            if (frame.position - carried).norm() <= self.config.possession.capture_radius {
                return true;
            }
        }

        let (distance, inside) = self.primary_gate(frame);
        if inside {
            return true;
        }
        if self.past_gate(frame) {
            trace!(camera = %frame.camera_id, distance, "past filter vouches for detection");
            return true;
        }

        trace!(camera = %frame.camera_id, distance, "detection rejected by gate");
        false
    }

    fn write_ball_state(&self, ball: &mut BallState, time: Timestamp, robots: &[RobotInfo]) {
        let time = time.max(self.creation_time);
        let vision_age = secs_between(self.last_vision_time, time);

        let carried = self.offset_tracker.offset().and_then(|info| {
            let position = self.offset_tracker.predicted_position(robots)?;
            let velocity = self.offset_tracker.predicted_velocity(robots)?;
            Some((info.robot_identifier, position, velocity))
        });

        *ball = match carried {
            Some((robot, position, velocity)) => BallState {
                time,
                position,
                velocity: Some(velocity),
                position_variance: self.config.possession.offset_tolerance.powi(2),
                dribbler: Some(robot),
                vision_age,
            },
            None => {
                let state = self.ground_filter.current_state(time);
                BallState {
                    time,
                    position: state.position,
                    // A single detection says nothing about velocity.
                    velocity: (self.frames_processed > 0).then_some(state.velocity),
                    position_variance: state.position_variance(),
                    dribbler: None,
                    vision_age,
                }
            }
        };
    }

    fn choose_ball(&self, frames: &[VisionFrame]) -> Option<usize> {
        let primary_camera = self.ground_filter.primary_camera();
        let candidates: Vec<(usize, f64, bool, &VisionFrame)> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_well_formed(self.config.max_camera_id))
            .map(|(i, f)| {
                let (distance, inside) = self.primary_gate(f);
                (i, distance, inside && f.camera_id == primary_camera, f)
            })
            .collect();

        let best = |primary_only: bool| {
            candidates
                .iter()
                .filter(|(_, _, primary_ok, _)| !primary_only || *primary_ok)
                .min_by(|(ia, da, _, a), (ib, db, _, b)| {
                    Self::compare_candidates((*ia, *da, *a), (*ib, *db, *b))
                })
                .map(|(i, _, _, _)| *i)
        };

        best(true).or_else(|| best(false))
    }

    fn derive_with_new_primary_camera(&self, camera: CameraId) -> Box<dyn BallFilter> {
        Box::new(Self::derive_with_new_primary_camera(self, camera))
    }

    fn primary_camera(&self) -> CameraId {
        self.ground_filter.primary_camera()
    }

    fn last_vision_time(&self) -> Timestamp {
        self.last_vision_time
    }

    fn creation_time(&self) -> Timestamp {
        self.creation_time
    }

    fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    fn phase(&self, now: Timestamp, stale_timeout: Timestamp) -> TrackingPhase {
        if now.saturating_sub(self.last_vision_time) > stale_timeout {
            TrackingPhase::Stale
        } else if self.frames_processed == 0 {
            TrackingPhase::Initializing
        } else if let Some(info) = self.offset_tracker.offset() {
            TrackingPhase::Dribbled {
                robot: info.robot_identifier,
            }
        } else {
            TrackingPhase::Tracking {
                camera: self.ground_filter.primary_camera(),
            }
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
