// balltrack_core/src/models/rolling.rs

use nalgebra::{Matrix4, Vector2};

use crate::models::{BallCovariance, BallVector};

/// Below this speed (m/s) the ball is treated as lying still.
const RESTING_SPEED: f64 = 1e-6;

/// Constant-deceleration model of a ball rolling on carpet.
///
/// State layout is `[px, py, vx, vy]`. The speed drops linearly at
/// `deceleration` until the ball stops; it never reverses direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingFrictionModel {
    /// Rolling deceleration in m/s^2.
    pub deceleration: f64,
}

impl RollingFrictionModel {
    pub fn new(deceleration: f64) -> Self {
        Self { deceleration }
    }

    /// Time in seconds until a ball rolling at `speed` comes to rest.
    pub fn stopping_time(&self, speed: f64) -> f64 {
        if self.deceleration <= 0.0 {
            return f64::INFINITY;
        }
        speed / self.deceleration
    }

    /// Propagates the state forward by `dt` seconds (analytic solution).
    ///
    /// # Returns
    /// The propagated state and the transition Jacobian `F = ∂x'/∂x`, linearised
    /// as a constant-velocity step over the rolling time with the velocity
    /// scaled by the fraction of speed that remains.
    pub fn propagate(&self, x: &BallVector, dt: f64) -> (BallVector, BallCovariance) {
        let dt = dt.max(0.0);
        let velocity = Vector2::new(x[2], x[3]);
        let speed = velocity.norm();

        let (rolling_time, remaining) = if speed > RESTING_SPEED {
            let tau = dt.min(self.stopping_time(speed));
            let remaining = (1.0 - self.deceleration * tau / speed).clamp(0.0, 1.0);
            (tau, remaining)
        } else {
            (dt, 1.0)
        };

        let mut next = *x;
        if speed > RESTING_SPEED {
            let direction = velocity / speed;
            let travelled = velocity * rolling_time
                - direction * (0.5 * self.deceleration * rolling_time * rolling_time);
            next[0] += travelled.x;
            next[1] += travelled.y;
            next[2] = velocity.x * remaining;
            next[3] = velocity.y * remaining;
        }

        let mut f_jac = Matrix4::identity();
        f_jac[(0, 2)] = rolling_time;
        f_jac[(1, 3)] = rolling_time;
        f_jac[(2, 2)] = remaining;
        f_jac[(3, 3)] = remaining;

        (next, f_jac)
    }

    /// Discrete white-noise-acceleration process noise for a step of `dt` seconds.
    pub fn process_noise(spectral_density: f64, dt: f64) -> BallCovariance {
        let dt = dt.max(0.0);
        let q_pp = spectral_density * dt.powi(3) / 3.0;
        let q_pv = spectral_density * dt.powi(2) / 2.0;
        let q_vv = spectral_density * dt;

        let mut q = Matrix4::zeros();
        for axis in 0..2 {
            q[(axis, axis)] = q_pp;
            q[(axis, axis + 2)] = q_pv;
            q[(axis + 2, axis)] = q_pv;
            q[(axis + 2, axis + 2)] = q_vv;
        }
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::Vector4;

    #[test]
    fn ball_at_rest_stays_put() {
        let model = RollingFrictionModel::new(0.35);
        let x = Vector4::new(1.0, -2.0, 0.0, 0.0);
        let (next, f_jac) = model.propagate(&x, 0.5);
        assert_eq!(next, x);
        // A resting ball still carries velocity uncertainty into position.
        assert_abs_diff_eq!(f_jac[(0, 2)], 0.5);
    }

    #[test]
    fn rolling_ball_decelerates_linearly() {
        let model = RollingFrictionModel::new(0.5);
        let x = Vector4::new(0.0, 0.0, 2.0, 0.0);
        let (next, _) = model.propagate(&x, 1.0);
        assert_abs_diff_eq!(next[0], 2.0 - 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(next[2], 1.5, epsilon = 1e-12);
    }

    #[test]
    fn rolling_ball_stops_and_never_reverses() {
        let model = RollingFrictionModel::new(0.5);
        let x = Vector4::new(0.0, 0.0, 0.0, -1.0);
        // Stops after 2 s, having travelled v^2 / 2a = 1 m.
        let (next, f_jac) = model.propagate(&x, 10.0);
        assert_abs_diff_eq!(next[1], -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(next[3], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(f_jac[(1, 3)], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn process_noise_is_symmetric_and_grows_with_dt() {
        let short = RollingFrictionModel::process_noise(2.0, 0.01);
        let long = RollingFrictionModel::process_noise(2.0, 0.1);
        assert_eq!(short, short.transpose());
        assert!(long[(0, 0)] > short[(0, 0)]);
        assert!(long[(2, 2)] > short[(2, 2)]);
    }
}
