// balltrack_sim/src/main.rs

//! Runs one scenario headless and reports the ball estimation error.
//!
//! `cargo run -p balltrack_sim -- --scenario assets/scenarios/01_dribble_and_kick.toml`

use std::process::ExitCode;

use bevy::{log::LogPlugin, prelude::*, state::app::StatesPlugin};
use clap::Parser;

use balltrack_sim::cli::Cli;
use balltrack_sim::prelude::AppState;
use balltrack_sim::simulation::config::load_scenario;
use balltrack_sim::{BallTrackSimulationPlugin, LOG_FILTER};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // --- 1. Load Simulation Configuration ---
    let mut config = match load_scenario(&cli.scenario) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Could not load scenario '{}': {}", cli.scenario.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(seed) = cli.seed {
        config.simulation.seed = Some(seed);
    }

    let mut app = App::new();

    // --- 2. Add Core Bevy Plugins & Resources ---
    app.add_plugins(MinimalPlugins)
        .add_plugins(LogPlugin {
            level: bevy::log::Level::INFO,
            // A good filter for focusing on our crates' logs during development.
            filter: LOG_FILTER.to_string(),
            ..default()
        })
        .add_plugins(StatesPlugin)
        // Insert the loaded configuration as a Bevy resource so all systems can access it.
        .insert_resource(config)
        .insert_resource(cli);

    app.init_state::<AppState>();

    // --- 3. Add the Main Simulation Plugin ---
    app.add_plugins(BallTrackSimulationPlugin);

    // --- 4. Run the App ---
    match app.run() {
        AppExit::Success => ExitCode::SUCCESS,
        AppExit::Error(code) => ExitCode::from(code.get()),
    }
}
