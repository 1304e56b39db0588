// balltrack_core/src/estimation/possession.rs

//! Detects a robot dribbling the ball and remembers where on the robot it sits.

use nalgebra::Vector2;
use tracing::debug;

use crate::config::PossessionParams;
use crate::messages::{find_robot, RobotInfo};
use crate::types::{secs_between, to_field, to_local, RobotId, Timestamp};

/// The ball is attached to `robot_identifier`, `ball_offset` away from its
/// reference point. The offset is stored in the robot's own frame so that it
/// turns with the robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallOffsetInfo {
    pub ball_offset: Vector2<f64>,
    pub robot_identifier: RobotId,
}

impl BallOffsetInfo {
    /// Ball position implied by the robot's current pose.
    pub fn ball_position(&self, robot: &RobotInfo) -> Vector2<f64> {
        robot.position + to_field(&self.ball_offset, robot.orientation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// The robot is no longer part of the snapshot.
    RobotMissing,
    /// The ball left the robot for longer than the release delay.
    Diverged,
}

/// Outcome of one [`BallOffsetTracker::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PossessionUpdate {
    /// Possession was confirmed by this detection.
    Acquired(BallOffsetInfo),
    /// An existing possession is still consistent.
    Held(BallOffsetInfo),
    /// The existing possession was cleared.
    Released {
        robot: RobotId,
        reason: ReleaseReason,
    },
    /// Nobody holds the ball.
    Free,
}

/// Last known carried-ball kinematics, copied out of a robot snapshot so later
/// calls can extrapolate without holding on to the robot list.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CarriedBall {
    timestamp: Timestamp,
    position: Vector2<f64>,
    velocity: Vector2<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Candidate {
    robot: RobotId,
    offset: Vector2<f64>,
    coherent_frames: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BallOffsetTracker {
    params: PossessionParams,
    offset: Option<BallOffsetInfo>,
    candidate: Option<Candidate>,
    diverging_since: Option<Timestamp>,
    carried: Option<CarriedBall>,
}

impl BallOffsetTracker {
    pub fn new(params: PossessionParams) -> Self {
        Self {
            params,
            offset: None,
            candidate: None,
            diverging_since: None,
            carried: None,
        }
    }

    pub fn offset(&self) -> Option<&BallOffsetInfo> {
        self.offset.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.offset.is_some()
    }

    pub fn clear(&mut self) {
        self.offset = None;
        self.candidate = None;
        self.diverging_since = None;
        self.carried = None;
    }

    /// Feeds one ball position observed at `timestamp` together with the robots
    /// visible at that time.
    pub fn update(
        &mut self,
        ball: &Vector2<f64>,
        robots: &[RobotInfo],
        timestamp: Timestamp,
    ) -> PossessionUpdate {
        match self.offset {
            Some(info) => self.check_possession(info, ball, robots, timestamp),
            None => self.look_for_possession(ball, robots, timestamp),
        }
    }

    /// Robot position plus stored offset, if the owning robot is in `robots`.
    pub fn predicted_position(&self, robots: &[RobotInfo]) -> Option<Vector2<f64>> {
        let info = self.offset?;
        find_robot(robots, info.robot_identifier).map(|robot| info.ball_position(robot))
    }

    /// Velocity of the dribbling robot, if it is in `robots`.
    pub fn predicted_velocity(&self, robots: &[RobotInfo]) -> Option<Vector2<f64>> {
        let info = self.offset?;
        find_robot(robots, info.robot_identifier).map(|robot| robot.velocity)
    }

    /// Where the carried ball should be at `at`, extrapolated from the last
    /// robot snapshot seen by [`Self::update`].
    pub fn carried_position(&self, at: Timestamp) -> Option<Vector2<f64>> {
        self.offset?;
        let carried = self.carried?;
        Some(carried.position + carried.velocity * secs_between(carried.timestamp, at))
    }

    /// Velocity of the carrying robot at the last update.
    pub fn carried_velocity(&self) -> Option<Vector2<f64>> {
        self.offset?;
        self.carried.map(|c| c.velocity)
    }

    // --- Private Helper Methods ---

    fn check_possession(
        &mut self,
        info: BallOffsetInfo,
        ball: &Vector2<f64>,
        robots: &[RobotInfo],
        timestamp: Timestamp,
    ) -> PossessionUpdate {
        let Some(robot) = find_robot(robots, info.robot_identifier) else {
            return self.release(info.robot_identifier, ReleaseReason::RobotMissing);
        };

        let expected = info.ball_position(robot);
        self.carried = Some(CarriedBall {
            timestamp,
            position: expected,
            velocity: robot.velocity,
        });

        if (ball - expected).norm() <= self.params.offset_tolerance {
            self.diverging_since = None;
            return PossessionUpdate::Held(info);
        }

        let since = *self.diverging_since.get_or_insert(timestamp);
        if timestamp.saturating_sub(since) >= self.params.release_delay() {
            self.release(info.robot_identifier, ReleaseReason::Diverged)
        } else {
            PossessionUpdate::Held(info)
        }
    }

    fn look_for_possession(
        &mut self,
        ball: &Vector2<f64>,
        robots: &[RobotInfo],
        timestamp: Timestamp,
    ) -> PossessionUpdate {
        let nearest = robots
            .iter()
            .map(|robot| (robot, (ball - robot.position).norm()))
            .filter(|(_, distance)| *distance <= self.params.capture_radius)
            .min_by(|(a, da), (b, db)| da.total_cmp(db).then(a.id.cmp(&b.id)));

        let Some((robot, _)) = nearest else {
            self.candidate = None;
            return PossessionUpdate::Free;
        };

        let offset = to_local(&(ball - robot.position), robot.orientation);
        let coherent_frames = match self.candidate {
            Some(c)
                if c.robot == robot.id
                    && (c.offset - offset).norm() <= self.params.offset_tolerance =>
            {
                c.coherent_frames + 1
            }
            _ => 1,
        };

        if coherent_frames < self.params.confirm_frames {
            self.candidate = Some(Candidate {
                robot: robot.id,
                offset,
                coherent_frames,
            });
            return PossessionUpdate::Free;
        }

        let info = BallOffsetInfo {
            ball_offset: offset,
            robot_identifier: robot.id,
        };
        debug!(robot = %robot.id, offset = ?offset, "ball possession acquired");
        self.offset = Some(info);
        self.candidate = None;
        self.diverging_since = None;
        self.carried = Some(CarriedBall {
            timestamp,
            position: *ball,
            velocity: robot.velocity,
        });
        PossessionUpdate::Acquired(info)
    }

    fn release(&mut self, robot: RobotId, reason: ReleaseReason) -> PossessionUpdate {
        debug!(robot = %robot, ?reason, "ball possession released");
        self.clear();
        PossessionUpdate::Released { robot, reason }
    }
}
