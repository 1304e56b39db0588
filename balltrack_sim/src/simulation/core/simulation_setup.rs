// balltrack_sim/src/simulation/core/simulation_setup.rs

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::prelude::*;
use crate::simulation::core::clock::SimulationClock;
use crate::simulation::core::events::VisionFrameEvent;
use crate::simulation::core::prng::SimulationRng;

pub struct SimulationSetupPlugin;

impl Plugin for SimulationSetupPlugin {
    fn build(&self, app: &mut App) {
        // This is CRITICAL. It registers the detection event with Bevy's event system.
        app.add_event::<VisionFrameEvent>();

        // Configure the runtime schedule graph. Everything only runs while the
        // simulation is live.
        app.configure_sets(
            Update,
            (
                SimulationSet::Clock,
                SimulationSet::World,
                SimulationSet::Sensors,
                SimulationSet::Tracking,
                SimulationSet::Validation,
            )
                .chain()
                .run_if(in_state(AppState::Running)),
        );

        app.add_systems(
            OnEnter(AppState::Loading),
            (insert_core_resources, transition_to_running).chain(),
        )
        .add_systems(Update, advance_clock.in_set(SimulationSet::Clock))
        .add_systems(OnEnter(AppState::Finished), exit_app);
    }
}

// =========================================================================
// == Setup Systems ==
// =========================================================================

fn insert_core_resources(mut commands: Commands, config: Res<ScenarioConfig>) {
    let sim = &config.simulation;

    // --- 1. Add the Deterministic PRNG Resource ---
    let rng = match sim.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => {
            warn!("No seed configured; this run is not reproducible.");
            ChaCha8Rng::from_entropy()
        }
    };
    commands.insert_resource(SimulationRng(rng));

    // --- 2. Simulated time ---
    commands.insert_resource(SimulationClock::new(sim.step_ms, sim.duration_seconds));
    info!(
        "Simulating {:.2}s in steps of {}ms.",
        sim.duration_seconds, sim.step_ms
    );
}

fn transition_to_running(mut next_state: ResMut<NextState<AppState>>) {
    info!("Scene built. Transitioning to Running state.");
    next_state.set(AppState::Running);
}

// =========================================================================
// == Runtime Systems ==
// =========================================================================

fn advance_clock(mut clock: ResMut<SimulationClock>, mut next_state: ResMut<NextState<AppState>>) {
    if !clock.advance() {
        info!("Simulated time is up after {:.2}s.", clock.elapsed_secs());
        next_state.set(AppState::Finished);
    }
}

fn exit_app(mut exit: EventWriter<AppExit>) {
    exit.write(AppExit::Success);
}
