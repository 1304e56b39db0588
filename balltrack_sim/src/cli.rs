// balltrack_sim/src/cli.rs

use bevy::prelude::Resource;
use clap::Parser;
use std::path::PathBuf;

/// Balltrack: replays a scripted scene through the ball filters.
///
/// This struct defines the command-line arguments accepted by the simulation binary.
#[derive(Parser, Debug, Resource, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run.
    #[arg(short, long, default_value = "assets/scenarios/00_rolling_ball.toml")]
    pub scenario: PathBuf,

    /// Overrides the seed of the scenario file.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Accepted for compatibility; the simulation never opens a window.
    #[arg(long, default_value_t = true)]
    pub headless: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_scenario_and_seed() {
        let cli = Cli::parse_from(["balltrack_sim", "--scenario", "a.toml", "--seed", "9"]);
        assert_eq!(cli.scenario, PathBuf::from("a.toml"));
        assert_eq!(cli.seed, Some(9));
        assert!(cli.headless);
    }
}
