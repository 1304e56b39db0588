// balltrack_sim/src/simulation/plugins/tracking/mod.rs

//! Runs the ball filters of `balltrack_core` inside the simulation.

use balltrack_core::estimation::TrackingPhase;
use balltrack_core::messages::{BallState, RobotInfo};
use balltrack_core::tracking::FilterManager;

use crate::prelude::*;
use crate::simulation::core::{clock::SimulationClock, events::VisionFrameEvent};
use crate::simulation::plugins::world::Robot;

// =========================================================================
// == Resources ==
// =========================================================================

/// A newtype wrapper around the pure `FilterManager` to make it a Bevy Resource.
#[derive(Resource)]
pub struct BallTracker(pub FilterManager);

/// The latest published ball estimate, if any ball is tracked.
#[derive(Resource, Default, Debug, Clone)]
pub struct EstimatedBall(pub Option<BallState>);

// =========================================================================
// == Tracking Plugin ==
// =========================================================================

pub struct TrackingPlugin;

impl Plugin for TrackingPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EstimatedBall>()
            .add_systems(OnEnter(AppState::Loading), spawn_tracker)
            .add_systems(
                Update,
                ball_tracking_system
                    .in_set(SimulationSet::Tracking)
                    .run_if(resource_exists::<BallTracker>),
            );
    }
}

fn spawn_tracker(
    mut commands: Commands,
    config: Res<ScenarioConfig>,
    mut exit: EventWriter<AppExit>,
) {
    let mut manager = match FilterManager::new(config.filter.clone(), config.tracker) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Cannot start the ball tracker: {}", e);
            exit.write(AppExit::error());
            return;
        }
    };
    for camera in &config.cameras {
        manager.add_camera(camera.info());
    }
    info!(
        "Ball tracker ready with {} cameras, at most {} filters.",
        config.cameras.len(),
        config.tracker.max_filters
    );
    commands.insert_resource(BallTracker(manager));
}

// =========================================================================
// == Runtime System ==
// =========================================================================

/// Feeds delivered detections to the filters and publishes the best estimate.
fn ball_tracking_system(
    mut frame_reader: EventReader<VisionFrameEvent>,
    clock: Res<SimulationClock>,
    mut tracker: ResMut<BallTracker>,
    mut estimate: ResMut<EstimatedBall>,
    robots: Query<&Robot>,
    mut last_phase: Local<Option<TrackingPhase>>,
) {
    let manager = &mut tracker.0;
    for event in frame_reader.read() {
        manager.queue_frame(event.0.clone());
    }

    let robots: Vec<RobotInfo> = robots.iter().map(Robot::info).collect();
    manager.process(clock.now, &robots);
    estimate.0 = manager.write_ball_state(clock.now, &robots);

    let phase = manager.tracking_phase(clock.now);
    if phase != *last_phase {
        debug!("t={:.3}s tracking phase: {:?}", clock.elapsed_secs(), phase);
        *last_phase = phase;
    }
}
