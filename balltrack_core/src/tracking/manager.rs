// balltrack_core/src/tracking/manager.rs

//! Owns the set of candidate ball filters and routes detections to them.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, trace, warn};

use crate::config::{at_least, non_negative, BallFilterConfig};
use crate::error::ConfigError;
use crate::estimation::filters::BallGroundCollisionFilter;
use crate::estimation::{BallFilter, TrackingPhase};
use crate::messages::{BallState, CameraInfo, RobotInfo, VisionFrame};
use crate::types::{millis, CameraId, Timestamp};

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ManagerConfig {
    /// Detections closer together than this are treated as one instant, ms.
    pub simultaneity_window_ms: u64,
    /// Silence of the primary camera before another camera takes over, ms.
    pub handover_delay_ms: u64,
    /// A filter without accepted detections for this long is dropped, ms.
    pub lost_timeout_ms: u64,
    /// A filter without accepted detections for this long reports `Stale`, ms.
    pub stale_timeout_ms: u64,
    pub max_filters: usize,
    /// Unclaimed detections this close to a tracked ball never spawn a filter, m.
    pub merge_distance: f64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            simultaneity_window_ms: 2,
            handover_delay_ms: 100,
            lost_timeout_ms: 1000,
            stale_timeout_ms: 200,
            max_filters: 8,
            merge_distance: 0.1,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        at_least("tracker.handover_delay_ms", 1, self.handover_delay_ms)?;
        at_least("tracker.lost_timeout_ms", 1, self.lost_timeout_ms)?;
        at_least("tracker.stale_timeout_ms", 1, self.stale_timeout_ms)?;
        at_least("tracker.max_filters", 1, self.max_filters as u64)?;
        non_negative("tracker.merge_distance", self.merge_distance)
    }
}

/// A filter plus the bookkeeping the manager needs for handover.
#[derive(Debug, Clone)]
struct TrackedFilter {
    filter: Box<dyn BallFilter>,
    /// Last accepted detection per camera.
    last_seen_by: BTreeMap<CameraId, Timestamp>,
}

impl TrackedFilter {
    fn new(filter: Box<dyn BallFilter>, frame: &VisionFrame) -> Self {
        Self {
            filter,
            last_seen_by: BTreeMap::from([(frame.camera_id, frame.timestamp)]),
        }
    }
}

/// Multi-hypothesis front end: every plausible ball gets its own filter and
/// the best supported one is published.
#[derive(Debug, Clone)]
pub struct FilterManager {
    filter_config: BallFilterConfig,
    config: ManagerConfig,
    cameras: BTreeMap<CameraId, CameraInfo>,
    filters: Vec<TrackedFilter>,
    queue: Vec<VisionFrame>,
}

impl FilterManager {
    pub fn new(
        filter_config: BallFilterConfig,
        config: ManagerConfig,
    ) -> Result<Self, ConfigError> {
        filter_config.validate()?;
        config.validate()?;
        Ok(Self {
            filter_config,
            config,
            cameras: BTreeMap::new(),
            filters: Vec::new(),
            queue: Vec::new(),
        })
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn add_camera(&mut self, camera: CameraInfo) {
        self.cameras.insert(camera.id, camera);
    }

    pub fn queue_frame(&mut self, frame: VisionFrame) {
        self.queue.push(frame);
    }

    pub fn queued_frames(&self) -> usize {
        self.queue.len()
    }

    pub fn filters(&self) -> impl Iterator<Item = &dyn BallFilter> {
        self.filters.iter().map(|t| t.filter.as_ref())
    }

    /// Feeds every queued detection captured up to `now` to the filters, then
    /// performs camera handover and drops lost filters.
    pub fn process(&mut self, now: Timestamp, robots: &[RobotInfo]) {
        let mut ready: Vec<VisionFrame> = Vec::new();
        self.queue.retain(|frame| {
            if frame.timestamp <= now {
                ready.push(frame.clone());
                false
            } else {
                true
            }
        });
        ready.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then(a.camera_id.cmp(&b.camera_id))
        });

        let window = millis(self.config.simultaneity_window_ms);
        let mut rest = ready.as_slice();
        while let Some(first) = rest.first() {
            let len = rest
                .iter()
                .take_while(|f| f.timestamp - first.timestamp <= window)
                .count();
            let (group, tail) = rest.split_at(len);
            self.process_group(group, robots);
            rest = tail;
        }

        self.hand_over(now);
        self.drop_lost(now);
    }

    /// The filter to publish at `now`: filters that are not stale come first,
    /// then the one with the most incorporated detections, then the oldest.
    pub fn best_filter(&self, now: Timestamp) -> Option<&dyn BallFilter> {
        let stale_timeout = millis(self.config.stale_timeout_ms);
        let is_stale = |f: &dyn BallFilter| f.phase(now, stale_timeout) == TrackingPhase::Stale;
        self.filters
            .iter()
            .map(|t| t.filter.as_ref())
            .min_by(|a, b| {
                is_stale(*a)
                    .cmp(&is_stale(*b))
                    .then(b.frames_processed().cmp(&a.frames_processed()))
                    .then(a.creation_time().cmp(&b.creation_time()))
            })
    }

    /// Estimate of the best filter at `time`, if any ball is tracked.
    pub fn write_ball_state(&self, time: Timestamp, robots: &[RobotInfo]) -> Option<BallState> {
        let filter = self.best_filter(time)?;
        let mut ball = BallState::default();
        filter.write_ball_state(&mut ball, time, robots);
        Some(ball)
    }

    pub fn tracking_phase(&self, now: Timestamp) -> Option<TrackingPhase> {
        self.best_filter(now)
            .map(|f| f.phase(now, millis(self.config.stale_timeout_ms)))
    }

    // --- Private Helper Methods ---

    fn process_group(&mut self, group: &[VisionFrame], robots: &[RobotInfo]) {
        let max_camera_id = self.filter_config.max_camera_id;
        let frames: Vec<&VisionFrame> = group
            .iter()
            .filter(|f| {
                let ok = f.is_well_formed(max_camera_id);
                if !ok {
                    debug!(camera = %f.camera_id, "discarding malformed detection");
                }
                ok
            })
            .collect();
        let mut claimed = vec![false; frames.len()];

        for tracked in &mut self.filters {
            let accepted: Vec<usize> = (0..frames.len())
                .filter(|&i| tracked.filter.accept_detection(frames[i]))
                .collect();
            if accepted.is_empty() {
                continue;
            }
            let candidates: Vec<VisionFrame> =
                accepted.iter().map(|&i| frames[i].clone()).collect();
            let Some(choice) = tracked.filter.choose_ball(&candidates) else {
                continue;
            };

            let frame = &candidates[choice];
            tracked.filter.process_vision_frame(frame, robots);
            tracked.last_seen_by.insert(frame.camera_id, frame.timestamp);
            for i in accepted {
                claimed[i] = true;
            }
        }

        let unclaimed = frames
            .iter()
            .zip(&claimed)
            .filter(|(_, claimed)| !**claimed)
            .map(|(frame, _)| *frame);
        for frame in unclaimed {
            if self.filters.len() >= self.config.max_filters {
                trace!(camera = %frame.camera_id, "filter limit reached, ignoring detection");
                break;
            }
            if self.is_covered(frame, robots) {
                trace!(camera = %frame.camera_id, "detection rejected next to a tracked ball");
                continue;
            }
            let Some(camera) = self.cameras.get(&frame.camera_id) else {
                warn!(camera = %frame.camera_id, "detection from unregistered camera");
                continue;
            };

            let filter = BallGroundCollisionFilter::new(frame, camera, self.filter_config.clone());
            debug!(
                camera = %frame.camera_id,
                filters = self.filters.len() + 1,
                "spawned ball filter"
            );
            self.filters
                .push(TrackedFilter::new(Box::new(filter), frame));
        }
    }

    /// Whether some filter already places a ball within merge distance of `frame`.
    fn is_covered(&self, frame: &VisionFrame, robots: &[RobotInfo]) -> bool {
        let mut estimate = BallState::default();
        self.filters.iter().any(|tracked| {
            tracked
                .filter
                .write_ball_state(&mut estimate, frame.timestamp, robots);
            (estimate.position - frame.position).norm() <= self.config.merge_distance
        })
    }

    fn hand_over(&mut self, now: Timestamp) {
        let delay = millis(self.config.handover_delay_ms);
        for tracked in &mut self.filters {
            let primary = tracked.filter.primary_camera();
            let primary_seen = tracked
                .last_seen_by
                .get(&primary)
                .copied()
                .unwrap_or_else(|| tracked.filter.creation_time());
            if now - primary_seen < delay {
                continue;
            }

            let successor = tracked
                .last_seen_by
                .iter()
                .filter(|(camera, seen)| **camera != primary && now - **seen < delay)
                .max_by(|(ca, a), (cb, b)| a.cmp(b).then(cb.cmp(ca)))
                .map(|(camera, _)| *camera);

            if let Some(camera) = successor {
                tracked.filter = tracked.filter.derive_with_new_primary_camera(camera);
            }
        }
    }

    fn drop_lost(&mut self, now: Timestamp) {
        let timeout = millis(self.config.lost_timeout_ms);
        self.filters.retain(|tracked| {
            let keep = now - tracked.filter.last_vision_time() <= timeout;
            if !keep {
                debug!(
                    camera = %tracked.filter.primary_camera(),
                    frames = tracked.filter.frames_processed(),
                    "removing lost ball filter"
                );
            }
            keep
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RobotId, Team};
    use approx::assert_abs_diff_eq;
    use nalgebra::{Vector2, Vector3};

    const CAM0: CameraId = CameraId(0);
    const CAM1: CameraId = CameraId(1);

    fn frame(camera: CameraId, ms: u64, x: f64, y: f64) -> VisionFrame {
        VisionFrame::new(camera, millis(ms), Vector2::new(x, y))
    }

    fn manager() -> FilterManager {
        let mut manager =
            FilterManager::new(BallFilterConfig::default(), ManagerConfig::default()).unwrap();
        manager.add_camera(CameraInfo::new(CAM0, Vector3::new(-1.5, 0.0, 4.0)));
        manager.add_camera(CameraInfo::new(CAM1, Vector3::new(1.5, 0.0, 4.0)));
        manager
    }

    fn feed(manager: &mut FilterManager, frames: impl IntoIterator<Item = VisionFrame>) {
        for f in frames {
            let now = f.timestamp;
            manager.queue_frame(f);
            manager.process(now, &[]);
        }
    }

    #[test]
    fn first_detection_spawns_a_filter() {
        let mut manager = manager();
        assert!(manager.write_ball_state(0, &[]).is_none());

        feed(&mut manager, [frame(CAM0, 0, 0.5, 0.5)]);
        assert_eq!(manager.filters().count(), 1);
        assert_eq!(
            manager.tracking_phase(millis(0)),
            Some(TrackingPhase::Initializing)
        );

        feed(&mut manager, [frame(CAM0, 10, 0.5, 0.5)]);
        assert_eq!(manager.filters().count(), 1);
        let ball = manager.write_ball_state(millis(10), &[]).unwrap();
        assert_abs_diff_eq!(ball.position.x, 0.5, epsilon = 1e-6);
        assert!(ball.velocity.is_some());
    }

    #[test]
    fn outlier_spawns_a_hypothesis_but_is_not_published() {
        let mut manager = manager();
        feed(&mut manager, (0..10).map(|i| frame(CAM0, i * 10, 0.0, 0.0)));
        feed(&mut manager, [frame(CAM0, 100, 3.0, 2.0)]);

        assert_eq!(manager.filters().count(), 2);
        let ball = manager.write_ball_state(millis(100), &[]).unwrap();
        assert_abs_diff_eq!(ball.position.norm(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn queued_frames_are_processed_in_timestamp_order() {
        let mut manager = manager();
        manager.queue_frame(frame(CAM0, 30, 0.03, 0.0));
        manager.queue_frame(frame(CAM0, 10, 0.01, 0.0));
        manager.queue_frame(frame(CAM0, 20, 0.02, 0.0));
        manager.queue_frame(frame(CAM0, 40, 0.04, 0.0));
        manager.process(millis(30), &[]);

        assert_eq!(manager.queued_frames(), 1);
        let best = manager.best_filter(millis(30)).unwrap();
        assert_eq!(best.frames_processed(), 2);
        assert_eq!(best.last_vision_time(), millis(30));
    }

    #[test]
    fn simultaneous_detections_are_incorporated_once() {
        let mut manager = manager();
        feed(&mut manager, [frame(CAM0, 0, 0.0, 0.0)]);

        manager.queue_frame(frame(CAM1, 10, 0.001, 0.0));
        manager.queue_frame(frame(CAM0, 11, 0.0, 0.0));
        manager.process(millis(11), &[]);

        assert_eq!(manager.filters().count(), 1);
        assert_eq!(manager.best_filter(millis(11)).unwrap().frames_processed(), 1);
    }

    #[test]
    fn two_cameras_seeing_a_new_ball_spawn_one_filter() {
        let mut manager = manager();
        manager.queue_frame(frame(CAM0, 0, 0.0, 0.0));
        manager.queue_frame(frame(CAM1, 0, 0.005, 0.0));
        manager.process(0, &[]);
        assert_eq!(manager.filters().count(), 1);
    }

    #[test]
    fn late_detections_of_a_tracked_ball_spawn_nothing() {
        let mut manager = manager();
        feed(&mut manager, (0..5).map(|i| frame(CAM0, i * 10, 0.0, 0.0)));

        // Camera 1 delivers its picture of the 40 ms instant after camera 0 did.
        manager.queue_frame(frame(CAM1, 40, 0.002, 0.0));
        manager.process(millis(44), &[]);
        assert_eq!(manager.filters().count(), 1);
    }

    #[test]
    fn silent_primary_camera_is_handed_over() {
        let mut manager = manager();
        feed(&mut manager, (0..=10).map(|i| frame(CAM0, i * 10, 0.0, 0.0)));
        assert_eq!(manager.best_filter(millis(100)).unwrap().primary_camera(), CAM0);

        feed(&mut manager, (11..=30).map(|i| frame(CAM1, i * 10, 0.0, 0.0)));
        let best = manager.best_filter(millis(300)).unwrap();
        assert_eq!(best.primary_camera(), CAM1);
        assert_eq!(best.frames_processed(), 30);
    }

    #[test]
    fn stale_filter_is_not_published_over_a_live_one() {
        let mut manager = manager();
        feed(&mut manager, (0..=50).map(|i| frame(CAM0, i * 10, 0.0, 0.0)));
        // The ball reappears far away and a new filter picks it up.
        feed(&mut manager, (51..=80).map(|i| frame(CAM0, i * 10, 3.0, 0.0)));
        assert_eq!(manager.filters().count(), 2);

        // Before the old filter goes stale its longer history still wins.
        let ball = manager.write_ball_state(millis(600), &[]).unwrap();
        assert_abs_diff_eq!(ball.position.x, 0.0, epsilon = 1e-6);

        let ball = manager.write_ball_state(millis(800), &[]).unwrap();
        assert_abs_diff_eq!(ball.position.x, 3.0, epsilon = 1e-3);
        assert_eq!(
            manager.tracking_phase(millis(800)),
            Some(TrackingPhase::Tracking { camera: CAM0 })
        );
    }

    #[test]
    fn lost_filters_are_removed() {
        let mut manager = manager();
        feed(&mut manager, (0..5).map(|i| frame(CAM0, i * 10, 0.0, 0.0)));
        assert_eq!(
            manager.tracking_phase(millis(500)),
            Some(TrackingPhase::Stale)
        );

        manager.process(millis(1000), &[]);
        assert_eq!(manager.filters().count(), 1);
        manager.process(millis(1100), &[]);
        assert_eq!(manager.filters().count(), 0);
        assert!(manager.write_ball_state(millis(1100), &[]).is_none());
    }

    #[test]
    fn huge_timeouts_keep_filters_alive() {
        let config = ManagerConfig {
            lost_timeout_ms: u64::MAX,
            stale_timeout_ms: u64::MAX,
            ..ManagerConfig::default()
        };
        let mut manager = FilterManager::new(BallFilterConfig::default(), config).unwrap();
        manager.add_camera(CameraInfo::new(CAM0, Vector3::new(0.0, 0.0, 4.0)));
        feed(&mut manager, (0..3).map(|i| frame(CAM0, i * 10, 0.0, 0.0)));

        manager.process(millis(3_600_000), &[]);
        assert_eq!(manager.filters().count(), 1);
        assert_eq!(
            manager.tracking_phase(millis(3_600_000)),
            Some(TrackingPhase::Tracking { camera: CAM0 })
        );
    }

    #[test]
    fn filter_count_is_bounded() {
        let config = ManagerConfig {
            max_filters: 2,
            ..ManagerConfig::default()
        };
        let mut manager = FilterManager::new(BallFilterConfig::default(), config).unwrap();
        manager.add_camera(CameraInfo::new(CAM0, Vector3::new(0.0, 0.0, 4.0)));

        feed(
            &mut manager,
            (0..5).map(|i| frame(CAM0, i * 10, i as f64, 0.0)),
        );
        assert_eq!(manager.filters().count(), 2);
    }

    #[test]
    fn unregistered_cameras_and_malformed_frames_spawn_nothing() {
        let mut manager = manager();
        feed(
            &mut manager,
            [
                frame(CameraId(5), 0, 0.0, 0.0),
                frame(CAM0, 10, f64::NAN, 0.0),
            ],
        );
        assert_eq!(manager.filters().count(), 0);
    }

    #[test]
    fn dribbled_ball_is_published_with_its_robot() {
        let mut manager = manager();
        let robot = |x: f64| {
            RobotInfo::new(RobotId(1), Team::Blue, Vector2::new(x, 0.0))
                .with_velocity(Vector2::new(0.5, 0.0))
        };
        for i in 0..6u64 {
            let x = 0.005 * i as f64;
            manager.queue_frame(frame(CAM0, i * 10, x + 0.09, 0.0));
            manager.process(millis(i * 10), &[robot(x)]);
        }

        let ball = manager.write_ball_state(millis(200), &[robot(0.1)]).unwrap();
        assert_eq!(ball.dribbler, Some(RobotId(1)));
        assert_abs_diff_eq!(ball.position.x, 0.19, epsilon = 1e-6);
        assert_eq!(
            manager.tracking_phase(millis(60)),
            Some(TrackingPhase::Dribbled { robot: RobotId(1) })
        );
    }

    #[test]
    fn rejects_invalid_tracker_config() {
        let config = ManagerConfig {
            max_filters: 0,
            ..ManagerConfig::default()
        };
        assert!(FilterManager::new(BallFilterConfig::default(), config).is_err());

        let config = ManagerConfig {
            merge_distance: -1.0,
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
