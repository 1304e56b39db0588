// balltrack_sim/src/simulation/plugins/debugging/mod.rs

pub mod state_error;
