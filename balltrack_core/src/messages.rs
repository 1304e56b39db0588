// balltrack_core/src/messages.rs

use nalgebra::{Vector2, Vector3};

use crate::types::{CameraId, RobotId, Team, Timestamp};

// =========================================================================
// == Inbound Data (read-only snapshots) ==
// =========================================================================

/// One ball detection reported by a single camera.
#[derive(Clone, Debug, PartialEq)]
pub struct VisionFrame {
    /// The camera that produced the detection.
    pub camera_id: CameraId,
    /// Capture time of the image the detection was found in.
    pub timestamp: Timestamp,
    /// Ball position on the field plane, in meters.
    pub position: Vector2<f64>,
    /// Detector confidence in `[0, 1]`, if the vision pipeline reports one.
    pub confidence: Option<f64>,
}

impl VisionFrame {
    pub fn new(camera_id: CameraId, timestamp: Timestamp, position: Vector2<f64>) -> Self {
        Self {
            camera_id,
            timestamp,
            position,
            confidence: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Rejects non-finite numbers and camera ids that cannot exist.
    pub fn is_well_formed(&self, max_camera_id: u32) -> bool {
        let confidence_ok = self
            .confidence
            .map_or(true, |c| c.is_finite() && (0.0..=1.0).contains(&c));
        self.position.iter().all(|v| v.is_finite())
            && confidence_ok
            && self.camera_id.0 <= max_camera_id
    }
}

/// A tracked robot, as supplied by the robot tracker for the current call.
#[derive(Clone, Debug, PartialEq)]
pub struct RobotInfo {
    pub id: RobotId,
    pub team: Team,
    pub position: Vector2<f64>,
    /// Heading in radians, counter-clockwise from the field x axis.
    pub orientation: f64,
    pub velocity: Vector2<f64>,
}

impl RobotInfo {
    pub fn new(id: RobotId, team: Team, position: Vector2<f64>) -> Self {
        Self {
            id,
            team,
            position,
            orientation: 0.0,
            velocity: Vector2::zeros(),
        }
    }

    pub fn with_orientation(mut self, orientation: f64) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_velocity(mut self, velocity: Vector2<f64>) -> Self {
        self.velocity = velocity;
        self
    }
}

/// Finds a robot by id in a snapshot.
pub fn find_robot(robots: &[RobotInfo], id: RobotId) -> Option<&RobotInfo> {
    robots.iter().find(|r| r.id == id)
}

/// Static camera metadata. Consulted by filters, never owned by them.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraInfo {
    pub id: CameraId,
    /// Mounting position in field coordinates; `z` is the height above the field.
    pub position: Vector3<f64>,
}

impl CameraInfo {
    pub fn new(id: CameraId, position: Vector3<f64>) -> Self {
        Self { id, position }
    }

    /// Ratio of ground distance to mounting height for a point on the field.
    /// Zero straight below the camera, growing as the view gets more oblique.
    pub fn obliqueness(&self, point: &Vector2<f64>) -> f64 {
        let height = self.position.z.max(0.1);
        (point - self.position.xy()).norm() / height
    }
}

// =========================================================================
// == Public API Messages (published state) ==
// =========================================================================

/// The published ball estimate. Owned by the caller and overwritten as a whole.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BallState {
    /// The time this estimate was evaluated at.
    pub time: Timestamp,
    pub position: Vector2<f64>,
    pub velocity: Option<Vector2<f64>>,
    /// Variance of the position along its least certain axis, in m^2.
    pub position_variance: f64,
    /// The robot currently dribbling the ball, if any.
    pub dribbler: Option<RobotId>,
    /// Seconds since the last accepted detection.
    pub vision_age: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_finite_positions() {
        let frame = VisionFrame::new(CameraId(0), 0, Vector2::new(f64::NAN, 0.0));
        assert!(!frame.is_well_formed(8));
    }

    #[test]
    fn rejects_impossible_camera_ids_and_confidences() {
        let frame = VisionFrame::new(CameraId(9), 0, Vector2::zeros());
        assert!(!frame.is_well_formed(8));

        let frame = VisionFrame::new(CameraId(1), 0, Vector2::zeros()).with_confidence(1.5);
        assert!(!frame.is_well_formed(8));

        let frame = VisionFrame::new(CameraId(1), 0, Vector2::zeros()).with_confidence(0.7);
        assert!(frame.is_well_formed(8));
    }

    #[test]
    fn obliqueness_grows_away_from_camera() {
        let cam = CameraInfo::new(CameraId(0), Vector3::new(0.0, 0.0, 4.0));
        assert_eq!(cam.obliqueness(&Vector2::zeros()), 0.0);
        assert!((cam.obliqueness(&Vector2::new(3.0, 0.0)) - 0.75).abs() < 1e-12);
    }
}
