// balltrack_sim/src/simulation/plugins/world/mod.rs

//! Ground truth: a ball rolling on carpet and robots that may dribble and kick it.

use balltrack_core::messages::RobotInfo;
use balltrack_core::models::rolling::RollingFrictionModel;
use balltrack_core::models::BallVector;
use balltrack_core::types::{to_field, RobotId, Team};
use nalgebra::Vector2;

use crate::prelude::*;
use crate::simulation::config::structs::{vec2, DribbleConfig};
use crate::simulation::core::clock::SimulationClock;

// =========================================================================
// == Components ==
// =========================================================================

/// The true state of the ball.
#[derive(Component, Debug, Clone)]
pub struct Ball {
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub carried_by: Option<RobotId>,
    model: RollingFrictionModel,
}

impl Ball {
    pub fn new(position: Vector2<f64>, velocity: Vector2<f64>, deceleration: f64) -> Self {
        Self {
            position,
            velocity,
            carried_by: None,
            model: RollingFrictionModel::new(deceleration),
        }
    }

    /// Rolls a free ball forward by `dt` seconds.
    pub fn roll(&mut self, dt: f64) {
        let x = BallVector::new(
            self.position.x,
            self.position.y,
            self.velocity.x,
            self.velocity.y,
        );
        let (next, _) = self.model.propagate(&x, dt);
        self.position = Vector2::new(next[0], next[1]);
        self.velocity = Vector2::new(next[2], next[3]);
    }
}

/// The true state of a robot plus its scripted behavior.
#[derive(Component, Debug, Clone)]
pub struct Robot {
    pub id: RobotId,
    pub team: Team,
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub orientation: f64,
    cruise_velocity: Vector2<f64>,
    dribble: Option<DribbleConfig>,
}

impl Robot {
    /// Where a carried ball sits, `distance` in front of the robot.
    pub fn dribbler_position(&self, distance: f64) -> Vector2<f64> {
        self.position + to_field(&Vector2::new(distance, 0.0), self.orientation)
    }

    /// The snapshot the ball filters see.
    pub fn info(&self) -> RobotInfo {
        RobotInfo::new(self.id, self.team, self.position)
            .with_orientation(self.orientation)
            .with_velocity(self.velocity)
    }

    fn dribble_window(&self, t: f64) -> Option<&DribbleConfig> {
        self.dribble
            .as_ref()
            .filter(|d| (d.start_s..d.end_s).contains(&t))
    }
}

/// Balls further than this from the dribbler cannot be picked up, m.
const PICKUP_REACH: f64 = 0.25;

// =========================================================================
// == World Plugin ==
// =========================================================================

pub struct WorldPlugin;

impl Plugin for WorldPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Loading), spawn_world)
            .add_systems(
                Update,
                (move_robots, dribble_script, roll_ball)
                    .chain()
                    .in_set(SimulationSet::World),
            );
    }
}

fn spawn_world(mut commands: Commands, config: Res<ScenarioConfig>) {
    let ball = &config.ball;
    commands.spawn((
        Name::new("Ball"),
        Ball::new(vec2(ball.position), vec2(ball.velocity), ball.deceleration),
    ));

    for robot in &config.robots {
        info!("  -> Spawning robot {} ({:?})", robot.id, robot.team);
        commands.spawn((
            Name::new(format!("Robot {}", robot.id)),
            Robot {
                id: robot.robot_id(),
                team: robot.team,
                position: vec2(robot.position),
                velocity: vec2(robot.velocity),
                orientation: robot.orientation,
                cruise_velocity: vec2(robot.velocity),
                dribble: robot.dribble,
            },
        ));
    }
}

// =========================================================================
// == Runtime Systems ==
// =========================================================================

fn move_robots(clock: Res<SimulationClock>, mut robots: Query<&mut Robot>) {
    let t = clock.elapsed_secs();
    let dt = clock.dt();
    for mut robot in &mut robots {
        let velocity = match robot.dribble_window(t) {
            Some(dribble) => vec2(dribble.carry_velocity),
            None => robot.cruise_velocity,
        };
        robot.velocity = velocity;
        robot.position += velocity * dt;
    }
}

/// Picks the ball up at the start of a dribble window and kicks it at the end.
fn dribble_script(
    clock: Res<SimulationClock>,
    robots: Query<&Robot>,
    mut balls: Query<&mut Ball>,
) {
    let Ok(mut ball) = balls.single_mut() else {
        return;
    };
    let t = clock.elapsed_secs();

    if let Some(holder) = ball.carried_by {
        let Some(robot) = robots.iter().find(|r| r.id == holder) else {
            ball.carried_by = None;
            return;
        };
        let Some(dribble) = robot.dribble else {
            return;
        };
        if robot.dribble_window(t).is_some() {
            ball.position = robot.dribbler_position(dribble.dribbler_distance);
            ball.velocity = robot.velocity;
        } else {
            let heading = to_field(&Vector2::new(1.0, 0.0), robot.orientation);
            ball.velocity = robot.velocity + heading * dribble.kick_speed;
            ball.carried_by = None;
            info!(
                "Robot {} kicked the ball at {:.2} m/s.",
                holder.0,
                ball.velocity.norm()
            );
        }
        return;
    }

    for robot in &robots {
        let Some(dribble) = robot.dribble_window(t) else {
            continue;
        };
        let dribbler = robot.dribbler_position(dribble.dribbler_distance);
        if (ball.position - dribbler).norm() <= PICKUP_REACH {
            info!("Robot {} picked up the ball at t={:.2}s.", robot.id.0, t);
            ball.carried_by = Some(robot.id);
            ball.position = dribbler;
            ball.velocity = robot.velocity;
            break;
        }
    }
}

fn roll_ball(clock: Res<SimulationClock>, mut balls: Query<&mut Ball>) {
    for mut ball in &mut balls {
        if ball.carried_by.is_none() {
            ball.roll(clock.dt());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn free_ball_slows_down_and_stops() {
        let mut ball = Ball::new(Vector2::zeros(), Vector2::new(0.7, 0.0), 0.35);
        for _ in 0..100 {
            ball.roll(0.01);
        }
        assert_abs_diff_eq!(ball.velocity.x, 0.35, epsilon = 1e-9);

        for _ in 0..300 {
            ball.roll(0.01);
        }
        assert_abs_diff_eq!(ball.velocity.norm(), 0.0, epsilon = 1e-9);
        // v^2 / (2a)
        assert_abs_diff_eq!(ball.position.x, 0.7, epsilon = 1e-9);
    }

    #[test]
    fn dribbler_sits_in_front_of_the_robot() {
        let robot = Robot {
            id: RobotId(1),
            team: Team::Blue,
            position: Vector2::new(1.0, 1.0),
            velocity: Vector2::zeros(),
            orientation: std::f64::consts::FRAC_PI_2,
            cruise_velocity: Vector2::zeros(),
            dribble: None,
        };
        let dribbler = robot.dribbler_position(0.09);
        assert_abs_diff_eq!(dribbler.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dribbler.y, 1.09, epsilon = 1e-12);
        assert_eq!(robot.info().id, RobotId(1));
    }
}
