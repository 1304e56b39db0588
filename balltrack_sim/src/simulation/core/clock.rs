// balltrack_sim/src/simulation/core/clock.rs

use balltrack_core::types::{millis, Timestamp, NANOS_PER_SEC};
use bevy::prelude::Resource;

/// Simulated capture time. Advances by a fixed step per app update and never
/// looks at the wall clock, so a run is reproducible.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SimulationClock {
    pub now: Timestamp,
    pub step: Timestamp,
    pub end: Timestamp,
}

impl SimulationClock {
    pub fn new(step_ms: u64, duration_seconds: f64) -> Self {
        Self {
            now: 0,
            step: millis(step_ms),
            end: (duration_seconds * NANOS_PER_SEC) as Timestamp,
        }
    }

    /// Step length in seconds.
    pub fn dt(&self) -> f64 {
        self.step as f64 / NANOS_PER_SEC
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.now as f64 / NANOS_PER_SEC
    }

    /// Moves time forward by one step. Returns `false` once the end is reached.
    pub fn advance(&mut self) -> bool {
        self.now += self.step;
        self.now < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn advances_in_fixed_steps_until_the_end() {
        let mut clock = SimulationClock::new(10, 0.03);
        assert_abs_diff_eq!(clock.dt(), 0.01);
        assert!(clock.advance());
        assert!(clock.advance());
        assert!(!clock.advance());
        assert_abs_diff_eq!(clock.elapsed_secs(), 0.03, epsilon = 1e-12);
    }
}
