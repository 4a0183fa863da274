//! Filter state store
//!
//! Holds the current Gaussian estimate of `[px, py, v, yaw, yaw_rate]` and the
//! filter lifecycle (`Uninitialized` until the first measurement, then
//! `Ready` with the reference clock).

use nalgebra::RealField;
use num_traits::Float;

use crate::models::{STATE_DIM, YAW_INDEX};
use crate::types::spaces::{StateCovariance, StateVector};
use crate::utils::normalize_angle;

/// State estimate of the CTRV filter.
///
/// # Type Parameters
///
/// - `T`: Scalar type (typically `f32` or `f64`)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UkfState<T: RealField> {
    /// State estimate mean `[px, py, v, yaw, yaw_rate]`
    pub mean: StateVector<T, STATE_DIM>,
    /// State estimate covariance
    pub covariance: StateCovariance<T, STATE_DIM>,
}

impl<T: RealField + Float + Copy> UkfState<T> {
    #[inline]
    pub fn new(mean: StateVector<T, STATE_DIM>, covariance: StateCovariance<T, STATE_DIM>) -> Self {
        Self { mean, covariance }
    }

    /// Returns the trace of the covariance matrix (sum of variances).
    #[inline]
    pub fn uncertainty(&self) -> T {
        self.covariance.trace()
    }

    #[inline]
    pub fn position(&self) -> (T, T) {
        (*self.mean.index(0), *self.mean.index(1))
    }

    #[inline]
    pub fn speed(&self) -> T {
        *self.mean.index(2)
    }

    #[inline]
    pub fn yaw(&self) -> T {
        *self.mean.index(YAW_INDEX)
    }

    #[inline]
    pub fn yaw_rate(&self) -> T {
        *self.mean.index(4)
    }

    /// Cartesian velocity `(v·cos ψ, v·sin ψ)`.
    #[inline]
    pub fn velocity(&self) -> (T, T) {
        let (sin_yaw, cos_yaw) = Float::sin_cos(self.yaw());
        (self.speed() * cos_yaw, self.speed() * sin_yaw)
    }

    /// Returns the same estimate with the heading wrapped into `(-π, π]`.
    #[inline]
    pub fn with_normalized_yaw(mut self) -> Self {
        let mut mean = self.mean.into_svector();
        mean[YAW_INDEX] = normalize_angle(mean[YAW_INDEX]);
        self.mean = StateVector::from_svector(mean);
        self
    }
}

/// Filter lifecycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Lifecycle<T: RealField> {
    /// No measurement received yet
    Uninitialized,
    /// Estimate valid at `timestamp_us`
    Ready {
        state: UkfState<T>,
        timestamp_us: i64,
    },
}

impl<T: RealField> Lifecycle<T> {
    #[inline]
    pub fn is_ready(&self) -> bool {
        matches!(self, Lifecycle::Ready { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn test_accessors() {
        let state = UkfState::new(
            StateVector::from_array([1.0, 2.0, 4.0, FRAC_PI_2, 0.1]),
            StateCovariance::identity(),
        );

        assert_eq!(state.position(), (1.0, 2.0));
        assert!((state.uncertainty() - 5.0).abs() < 1e-12);
        let (vx, vy) = state.velocity();
        assert!(vx.abs() < 1e-12);
        assert!((vy - 4.0).abs() < 1e-12);
        assert!((state.yaw_rate() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_yaw_normalization() {
        let state = UkfState::new(
            StateVector::from_array([0.0, 0.0, 1.0, 4.0 * PI + 0.5, 0.0]),
            StateCovariance::identity(),
        )
        .with_normalized_yaw();
        assert!((state.yaw() - 0.5).abs() < 1e-9, "yaw: {}", state.yaw());
    }

    #[test]
    fn test_lifecycle() {
        let uninit: Lifecycle<f64> = Lifecycle::Uninitialized;
        assert!(!uninit.is_ready());

        let ready: Lifecycle<f64> = Lifecycle::Ready {
            state: UkfState::new(StateVector::zeros(), StateCovariance::identity()),
            timestamp_us: 0,
        };
        assert!(ready.is_ready());
    }
}
