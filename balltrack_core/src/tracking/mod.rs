// balltrack_core/src/tracking/mod.rs

pub mod manager;

pub use manager::{FilterManager, ManagerConfig};
