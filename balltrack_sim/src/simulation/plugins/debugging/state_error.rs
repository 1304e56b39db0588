// balltrack_sim/src/simulation/plugins/debugging/state_error.rs

use crate::prelude::*;
use crate::simulation::plugins::tracking::EstimatedBall;
use crate::simulation::plugins::world::Ball;

// =========================================================================
// == Plugin Definition ==
// =========================================================================

pub struct StateErrorDebugPlugin;

impl Plugin for StateErrorDebugPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<EstimationErrorStats>()
            .add_systems(
                Update,
                accumulate_estimation_error.in_set(SimulationSet::Validation),
            )
            .add_systems(OnEnter(AppState::Finished), report_estimation_error);
    }
}

/// Running position error of the published estimate against ground truth.
#[derive(Resource, Default, Debug, Clone, PartialEq)]
pub struct EstimationErrorStats {
    pub samples: u64,
    /// Steps in which no estimate was published.
    pub missing: u64,
    pub sum_squared: f64,
    pub max: f64,
    /// Steps in which the ball was carried by a robot.
    pub dribbled: u64,
    /// Carried steps in which the estimate named the right robot.
    pub dribbler_matches: u64,
}

impl EstimationErrorStats {
    pub fn rms(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        (self.sum_squared / self.samples as f64).sqrt()
    }

    pub fn record(&mut self, error: f64) {
        self.samples += 1;
        self.sum_squared += error * error;
        self.max = self.max.max(error);
    }
}

// =========================================================================
// == Error Logging Systems ==
// =========================================================================

/// Compares the published estimate with the true ball every step.
fn accumulate_estimation_error(
    estimate: Res<EstimatedBall>,
    balls: Query<&Ball>,
    mut stats: ResMut<EstimationErrorStats>,
) {
    let Ok(truth) = balls.single() else {
        return;
    };
    let Some(estimate) = &estimate.0 else {
        stats.missing += 1;
        return;
    };

    stats.record((estimate.position - truth.position).norm());
    if let Some(holder) = truth.carried_by {
        stats.dribbled += 1;
        if estimate.dribbler == Some(holder) {
            stats.dribbler_matches += 1;
        }
    }
}

fn report_estimation_error(stats: Res<EstimationErrorStats>) {
    info!(
        "Ball Estimation Error | Samples: {} | RMS: {:.4}m | Max: {:.4}m | No estimate: {} steps",
        stats.samples,
        stats.rms(),
        stats.max,
        stats.missing
    );
    if stats.dribbled > 0 {
        info!(
            "Dribbler identified in {}/{} carried steps.",
            stats.dribbler_matches, stats.dribbled
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rms_and_max_follow_the_recorded_errors() {
        let mut stats = EstimationErrorStats::default();
        assert_eq!(stats.rms(), 0.0);

        stats.record(0.03);
        stats.record(0.04);
        assert_abs_diff_eq!(stats.rms(), (0.0025f64 / 2.0).sqrt(), epsilon = 1e-12);
        assert_eq!(stats.max, 0.04);
    }
}
