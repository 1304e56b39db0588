// balltrack_sim/src/simulation/core/events.rs
use bevy::prelude::Event;
// Import the pure data struct from the core library
use balltrack_core::messages::VisionFrame;

/// A ball detection delivered by a simulated camera.
#[derive(Event, Clone, Debug)]
pub struct VisionFrameEvent(pub VisionFrame);
