// balltrack_sim/src/simulation/plugins/sensors/camera.rs

use std::collections::VecDeque;

use balltrack_core::messages::VisionFrame;
use balltrack_core::types::{millis, Timestamp, NANOS_PER_SEC};
use nalgebra::Vector2;
use rand::Rng;
use rand_distr::{Distribution, Normal};

// --- Simulation Crate Imports ---
use crate::prelude::*;
use crate::simulation::config::structs::CameraConfig;
use crate::simulation::core::{
    clock::SimulationClock, events::VisionFrameEvent, prng::SimulationRng,
};
use crate::simulation::plugins::world::Ball;

// =========================================================================
// == Camera Components & Plugin ==
// =========================================================================

/// A Bevy component attached to a camera entity, containing its runtime state.
#[derive(Component)]
pub struct VisionCamera {
    pub config: CameraConfig,
    period: Timestamp,
    next_capture: Timestamp,
    // Store the noise distribution for efficiency
    noise_dist: Option<Normal<f64>>,
    /// Captured detections waiting out the camera latency.
    in_flight: VecDeque<VisionFrame>,
}

impl VisionCamera {
    pub fn new(config: CameraConfig) -> Self {
        let noise_dist = Normal::new(0.0, config.noise_stddev).ok();
        Self {
            period: (NANOS_PER_SEC / config.rate_hz) as Timestamp,
            next_capture: 0,
            noise_dist,
            in_flight: VecDeque::new(),
            config,
        }
    }

    /// Takes a picture if one is due at `now`.
    fn capture<R: Rng>(
        &mut self,
        now: Timestamp,
        ball: &Vector2<f64>,
        rng: &mut R,
    ) -> Option<VisionFrame> {
        if now < self.next_capture {
            return None;
        }
        while self.next_capture <= now {
            self.next_capture += self.period;
        }

        if !self.config.covers(ball) || rng.gen_bool(self.config.dropout_probability) {
            return None;
        }

        let position = if rng.gen_bool(self.config.outlier_probability) {
            let [min_x, min_y, max_x, max_y] = self.config.coverage;
            Vector2::new(rng.gen_range(min_x..=max_x), rng.gen_range(min_y..=max_y))
        } else {
            let mut noise = || self.noise_dist.map_or(0.0, |n| n.sample(rng));
            Vector2::new(ball.x + noise(), ball.y + noise())
        };
        let confidence = rng.gen_range(0.6..=1.0);

        Some(VisionFrame::new(self.config.camera_id(), now, position).with_confidence(confidence))
    }

    /// Detections whose latency has elapsed by `now`.
    fn deliver(&mut self, now: Timestamp) -> Vec<VisionFrame> {
        let latency = millis(self.config.latency_ms);
        let mut ready = Vec::new();
        while let Some(frame) = self.in_flight.front() {
            if frame.timestamp + latency > now {
                break;
            }
            ready.extend(self.in_flight.pop_front());
        }
        ready
    }
}

pub struct CameraPlugin;

impl Plugin for CameraPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(AppState::Loading), spawn_cameras)
            .add_systems(Update, camera_sensor_system.in_set(SimulationSet::Sensors));
    }
}

// =========================================================================
// == Spawning System ==
// =========================================================================

fn spawn_cameras(mut commands: Commands, config: Res<ScenarioConfig>) {
    for camera in &config.cameras {
        info!(
            "  -> Spawning camera {} at {:?}, {} Hz",
            camera.id, camera.position, camera.rate_hz
        );
        commands.spawn((
            Name::new(format!("Camera {}", camera.id)),
            VisionCamera::new(camera.clone()),
        ));
    }
}

// =========================================================================
// == Runtime System ==
// =========================================================================

/// Runs every step to simulate the cameras and publish detections.
fn camera_sensor_system(
    mut frame_writer: EventWriter<VisionFrameEvent>,
    clock: Res<SimulationClock>,
    mut rng: ResMut<SimulationRng>,
    balls: Query<&Ball>,
    mut cameras: Query<&mut VisionCamera>,
) {
    let Ok(ball) = balls.single() else {
        return;
    };

    for mut camera in &mut cameras {
        if let Some(frame) = camera.capture(clock.now, &ball.position, &mut rng.0) {
            camera.in_flight.push_back(frame);
        }
        for frame in camera.deliver(clock.now) {
            frame_writer.write(VisionFrameEvent(frame));
        }
    }
}
