// balltrack_core/src/estimation/filters/ground.rs

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};

use crate::config::GroundFilterParams;
use crate::error::{FilterError, Result};
use crate::models::rolling::RollingFrictionModel;
use crate::models::{BallCovariance, BallVector};
use crate::types::{largest_variance, secs_between, CameraId, Timestamp};

/// A snapshot of a [`GroundFilter`] evaluated at some point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundState {
    pub timestamp: Timestamp,
    pub position: Vector2<f64>,
    pub velocity: Vector2<f64>,
    pub covariance: BallCovariance,
}

impl GroundState {
    fn from_parts(timestamp: Timestamp, x: &BallVector, covariance: BallCovariance) -> Self {
        Self {
            timestamp,
            position: Vector2::new(x[0], x[1]),
            velocity: Vector2::new(x[2], x[3]),
            covariance,
        }
    }

    pub fn position_covariance(&self) -> Matrix2<f64> {
        self.covariance.fixed_view::<2, 2>(0, 0).into_owned()
    }

    /// Variance along the least certain position axis.
    pub fn position_variance(&self) -> f64 {
        largest_variance(&self.position_covariance())
    }
}

/// Linear estimator for a ball rolling on the field plane.
///
/// Holds `[px, py, vx, vy]`, its covariance, the time of the last update and the
/// camera it currently trusts as primary. Time only ever moves forward.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundFilter {
    state: BallVector,
    covariance: BallCovariance,
    last_update: Timestamp,
    primary_camera: CameraId,
    model: RollingFrictionModel,
    /// Spectral density of the process noise (Q).
    acceleration_noise: f64,
    /// Variance of a single position detection (R = r * I).
    measurement_variance: f64,
}

impl GroundFilter {
    /// Creates a filter resting at `position` with the given position variance.
    pub fn new(
        position: Vector2<f64>,
        timestamp: Timestamp,
        primary_camera: CameraId,
        params: &GroundFilterParams,
        initial_position_variance: f64,
    ) -> Self {
        let velocity_variance = params.initial_velocity_stddev.powi(2);
        let covariance = Matrix4::from_diagonal(&Vector4::new(
            initial_position_variance,
            initial_position_variance,
            velocity_variance,
            velocity_variance,
        ));

        Self {
            state: Vector4::new(position.x, position.y, 0.0, 0.0),
            covariance,
            last_update: timestamp,
            primary_camera,
            model: RollingFrictionModel::new(params.rolling_deceleration),
            acceleration_noise: params.acceleration_noise,
            measurement_variance: params.measurement_stddev.powi(2),
        }
    }

    /// Inflates the process noise, making the filter quicker to follow changes.
    pub fn with_noise_scale(mut self, scale: f64) -> Self {
        self.acceleration_noise *= scale;
        self
    }

    pub fn last_update(&self) -> Timestamp {
        self.last_update
    }

    pub fn primary_camera(&self) -> CameraId {
        self.primary_camera
    }

    pub fn set_primary_camera(&mut self, camera: CameraId) {
        self.primary_camera = camera;
    }

    pub fn measurement_variance(&self) -> f64 {
        self.measurement_variance
    }

    /// Trace of the position covariance, in m^2.
    pub fn uncertainty(&self) -> f64 {
        self.covariance[(0, 0)] + self.covariance[(1, 1)]
    }

    /// Replaces the velocity estimate while keeping position and covariance.
    pub fn set_velocity(&mut self, velocity: Vector2<f64>) {
        if velocity.iter().all(|v| v.is_finite()) {
            self.state[2] = velocity.x;
            self.state[3] = velocity.y;
        }
    }

    /// Advances the estimate to `to`. A timestamp at or before the last update
    /// leaves the state untouched.
    pub fn predict(&mut self, to: Timestamp) -> GroundState {
        if to > self.last_update {
            let (state, covariance) = self.propagated(to);
            self.state = state;
            self.covariance = covariance;
            self.last_update = to;
        }
        self.snapshot()
    }

    /// Read-only prediction used for publication and gating.
    pub fn current_state(&self, at: Timestamp) -> GroundState {
        if at <= self.last_update {
            return self.snapshot();
        }
        let (state, covariance) = self.propagated(at);
        GroundState::from_parts(at, &state, covariance)
    }

    /// Incorporates one position detection taken at `timestamp`.
    ///
    /// A detection at the time of the last update counts as an additional
    /// observation of the same instant. Earlier timestamps are clamped to the
    /// last update. `variance_scale` multiplies the configured detection noise.
    /// On error the filter is left exactly as it was.
    pub fn correct(
        &mut self,
        measurement: &Vector2<f64>,
        timestamp: Timestamp,
        variance_scale: f64,
    ) -> Result<()> {
        if !measurement.iter().all(|v| v.is_finite())
            || !variance_scale.is_finite()
            || variance_scale <= 0.0
        {
            return Err(FilterError::NonFiniteMeasurement);
        }

        let before = self.clone();
        self.predict(timestamp);

        match self.kalman_update(measurement, variance_scale) {
            Ok((state, covariance)) => {
                self.state = state;
                self.covariance = covariance;
                Ok(())
            }
            Err(err) => {
                *self = before;
                Err(err)
            }
        }
    }

    // --- Private Helper Methods ---

    fn snapshot(&self) -> GroundState {
        GroundState::from_parts(self.last_update, &self.state, self.covariance)
    }

    fn propagated(&self, to: Timestamp) -> (BallVector, BallCovariance) {
        let dt = secs_between(self.last_update, to);
        let (state, f_jac) = self.model.propagate(&self.state, dt);
        let q = RollingFrictionModel::process_noise(self.acceleration_noise, dt);
        let covariance = f_jac * self.covariance * f_jac.transpose() + q;
        (state, covariance)
    }

    fn kalman_update(
        &self,
        measurement: &Vector2<f64>,
        variance_scale: f64,
    ) -> Result<(BallVector, BallCovariance)> {
        #[rustfmt::skip]
        let h_jac = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );
        let r_mat = Matrix2::identity() * (self.measurement_variance * variance_scale);

        let innovation = measurement - h_jac * self.state;
        let s = h_jac * self.covariance * h_jac.transpose() + r_mat;
        let s_inv = s.try_inverse().ok_or(FilterError::SingularInnovation)?;
        let k_gain: Matrix4x2<f64> = self.covariance * h_jac.transpose() * s_inv;

        let state = self.state + k_gain * innovation;

        // Joseph form keeps the covariance positive semi-definite.
        let i_kh = Matrix4::identity() - k_gain * h_jac;
        let covariance =
            i_kh * self.covariance * i_kh.transpose() + k_gain * r_mat * k_gain.transpose();
        let covariance = (covariance + covariance.transpose()) * 0.5;

        if state.iter().all(|v| v.is_finite()) && covariance.iter().all(|v| v.is_finite()) {
            Ok((state, covariance))
        } else {
            Err(FilterError::NonFiniteState)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::millis;
    use approx::assert_abs_diff_eq;

    fn resting_filter() -> GroundFilter {
        let params = GroundFilterParams::default();
        GroundFilter::new(Vector2::zeros(), 0, CameraId(0), &params, 1e-4)
    }

    #[test]
    fn predicting_backwards_is_a_no_op() {
        let mut filter = resting_filter();
        filter.correct(&Vector2::new(0.1, 0.0), millis(100), 1.0).unwrap();
        let before = filter.clone();

        let state = filter.predict(millis(50));
        assert_eq!(filter, before);
        assert_eq!(state.timestamp, millis(100));
    }

    #[test]
    fn current_state_does_not_mutate() {
        let mut filter = resting_filter();
        filter.correct(&Vector2::new(0.0, 0.0), millis(10), 1.0).unwrap();
        let before = filter.clone();

        let later = filter.current_state(millis(500));
        assert_eq!(filter, before);
        assert_eq!(later.timestamp, millis(500));
        assert!(later.position_variance() > filter.current_state(millis(10)).position_variance());
    }

    #[test]
    fn correction_never_increases_uncertainty() {
        let mut filter = resting_filter();
        for i in 1..40 {
            let t = millis(i * 10);
            let z = Vector2::new(0.02 * i as f64, 0.003 * (i % 3) as f64);

            let mut predicted = filter.clone();
            predicted.predict(t);
            let prior = predicted.uncertainty();

            filter.correct(&z, t, 1.0).unwrap();
            assert!(filter.uncertainty() <= prior);
        }
    }

    #[test]
    fn simultaneous_detection_is_an_extra_observation() {
        let mut filter = resting_filter();
        filter.correct(&Vector2::new(0.0, 0.0), millis(20), 1.0).unwrap();
        let uncertainty = filter.uncertainty();

        filter.correct(&Vector2::new(0.004, 0.0), millis(20), 1.0).unwrap();
        assert_eq!(filter.last_update(), millis(20));
        assert!(filter.uncertainty() < uncertainty);
        assert!(filter.current_state(millis(20)).position.x > 0.0);
    }

    #[test]
    fn stale_correction_is_clamped_to_last_update() {
        let mut filter = resting_filter();
        filter.correct(&Vector2::new(0.0, 0.0), millis(100), 1.0).unwrap();
        filter.correct(&Vector2::new(0.0, 0.0), millis(40), 1.0).unwrap();
        assert_eq!(filter.last_update(), millis(100));
    }

    #[test]
    fn non_finite_measurement_keeps_prior_state() {
        let mut filter = resting_filter();
        filter.correct(&Vector2::new(0.1, 0.1), millis(10), 1.0).unwrap();
        let before = filter.clone();

        let result = filter.correct(&Vector2::new(f64::INFINITY, 0.0), millis(20), 1.0);
        assert_eq!(result, Err(FilterError::NonFiniteMeasurement));
        assert_eq!(filter, before);

        let result = filter.correct(&Vector2::new(0.1, 0.1), millis(20), f64::NAN);
        assert_eq!(result, Err(FilterError::NonFiniteMeasurement));
        assert_eq!(filter, before);
    }

    #[test]
    fn learns_velocity_of_a_rolling_ball() {
        let mut filter = resting_filter();
        for i in 1..=50 {
            let t = millis(i * 10);
            filter.correct(&Vector2::new(2.0 * 0.01 * i as f64, 0.0), t, 1.0).unwrap();
        }
        let state = filter.current_state(millis(500));
        assert_abs_diff_eq!(state.velocity.x, 2.0, epsilon = 0.1);
        assert_abs_diff_eq!(state.velocity.y, 0.0, epsilon = 0.05);
    }

    #[test]
    fn extrapolation_is_continuous_in_time() {
        let mut filter = resting_filter();
        for i in 1..=20 {
            let t = millis(i * 10);
            filter.correct(&Vector2::new(0.03 * i as f64, 0.0), t, 1.0).unwrap();
        }
        let t = millis(350);
        let a = filter.current_state(t);
        let b = filter.current_state(t + 1);
        assert_abs_diff_eq!(a.position.x, b.position.x, epsilon = 1e-6);
        assert_abs_diff_eq!(a.velocity.x, b.velocity.x, epsilon = 1e-6);

        // The query at the last update itself joins the extrapolation seamlessly.
        let at = filter.current_state(millis(200));
        let after = filter.current_state(millis(200) + 1);
        assert_abs_diff_eq!(at.position.x, after.position.x, epsilon = 1e-6);
    }
}
