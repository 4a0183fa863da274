//! Constant Turn Rate and Velocity (CTRV) motion model
//!
//! State: `[px, py, v, yaw, yaw_rate]` where `v` is the speed along the
//! heading `yaw`. Process noise enters as two zero-mean accelerations held
//! constant over a step: longitudinal `nu_a` and yaw `nu_yawdd`.
//!
//! The deterministic part of the motion is
//! - px' = px + (v/ψ̇)[sin(ψ + ψ̇Δt) - sin(ψ)]
//! - py' = py + (v/ψ̇)[cos(ψ) - cos(ψ + ψ̇Δt)]
//! - ψ'  = ψ + ψ̇Δt
//!
//! with straight-line motion when |ψ̇| is below [`YAW_RATE_EPSILON`].

use nalgebra::{RealField, SVector};
use num_traits::Float;

use crate::types::spaces::{AugmentedCovariance, AugmentedVector, StateCovariance, StateVector};
use crate::utils::normalize_angle;

/// Dimension of the CTRV state.
pub const STATE_DIM: usize = 5;

/// Number of process noise terms appended during prediction.
pub const NOISE_DIM: usize = 2;

/// Dimension of the augmented state.
pub const AUGMENTED_DIM: usize = STATE_DIM + NOISE_DIM;

/// Index of the heading angle in the state vector.
pub const YAW_INDEX: usize = 3;

/// Turn rates at or below this magnitude (rad/s) use straight-line motion.
pub const YAW_RATE_EPSILON: f64 = 1e-3;

/// CTRV process model with tunable process noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CtrvModel<T: RealField> {
    /// Longitudinal acceleration noise standard deviation (m/s²)
    pub std_a: T,
    /// Yaw acceleration noise standard deviation (rad/s²)
    pub std_yawdd: T,
}

impl<T: RealField + Float + Copy> CtrvModel<T> {
    /// Creates a new CTRV model.
    ///
    /// # Panics
    /// Panics if either standard deviation is not strictly positive; a zero
    /// noise term would make the augmented covariance singular.
    pub fn new(std_a: T, std_yawdd: T) -> Self {
        assert!(std_a > T::zero(), "Process noise std_a must be positive");
        assert!(std_yawdd > T::zero(), "Process noise std_yawdd must be positive");
        Self { std_a, std_yawdd }
    }

    /// Builds the augmented mean `[x, 0, 0]` and covariance `diag(P, σa², σψ̈²)`.
    pub fn augment(
        &self,
        mean: &StateVector<T, STATE_DIM>,
        covariance: &StateCovariance<T, STATE_DIM>,
    ) -> (
        AugmentedVector<T, AUGMENTED_DIM>,
        AugmentedCovariance<T, AUGMENTED_DIM>,
    ) {
        let mut x_aug = SVector::<T, AUGMENTED_DIM>::zeros();
        x_aug
            .fixed_rows_mut::<STATE_DIM>(0)
            .copy_from(mean.as_svector());

        let mut p_aug = nalgebra::SMatrix::<T, AUGMENTED_DIM, AUGMENTED_DIM>::zeros();
        p_aug
            .fixed_view_mut::<STATE_DIM, STATE_DIM>(0, 0)
            .copy_from(covariance.as_matrix());
        p_aug[(STATE_DIM, STATE_DIM)] = self.std_a * self.std_a;
        p_aug[(STATE_DIM + 1, STATE_DIM + 1)] = self.std_yawdd * self.std_yawdd;

        (
            AugmentedVector::from_svector(x_aug),
            AugmentedCovariance::from_matrix(p_aug),
        )
    }

    /// Propagates a state over `dt` seconds with the given noise accelerations.
    ///
    /// The caller guarantees `dt >= 0`.
    pub fn propagate(
        &self,
        state: &StateVector<T, STATE_DIM>,
        nu_a: T,
        nu_yawdd: T,
        dt: T,
    ) -> StateVector<T, STATE_DIM> {
        let px = *state.index(0);
        let py = *state.index(1);
        let v = *state.index(2);
        let yaw = *state.index(3);
        let yaw_rate = *state.index(4);

        let (sin_yaw, cos_yaw) = Float::sin_cos(yaw);
        let eps: T = nalgebra::convert(YAW_RATE_EPSILON);

        let (dx, dy) = if Float::abs(yaw_rate) > eps {
            let yaw_next = yaw + yaw_rate * dt;
            let (sin_next, cos_next) = Float::sin_cos(yaw_next);
            let radius = v / yaw_rate;
            (radius * (sin_next - sin_yaw), radius * (cos_yaw - cos_next))
        } else {
            // Division by a near-zero turn rate is avoided
            (v * cos_yaw * dt, v * sin_yaw * dt)
        };

        let half_dt2 = nalgebra::convert::<f64, T>(0.5) * dt * dt;

        StateVector::from_array([
            px + dx + half_dt2 * cos_yaw * nu_a,
            py + dy + half_dt2 * sin_yaw * nu_a,
            v + dt * nu_a,
            yaw + yaw_rate * dt + half_dt2 * nu_yawdd,
            yaw_rate + dt * nu_yawdd,
        ])
    }

    /// Propagates an augmented sigma point, dropping the noise dimensions.
    #[inline]
    pub fn propagate_augmented(
        &self,
        point: &AugmentedVector<T, AUGMENTED_DIM>,
        dt: T,
    ) -> StateVector<T, STATE_DIM> {
        let x = point.as_svector();
        let state = StateVector::from_svector(x.fixed_rows::<STATE_DIM>(0).into_owned());
        self.propagate(&state, x[STATE_DIM], x[STATE_DIM + 1], dt)
    }
}

/// Wraps the heading component of a state residual into `(-π, π]`.
#[inline]
pub fn normalize_state_residual<T: RealField + Copy>(
    mut residual: SVector<T, STATE_DIM>,
) -> SVector<T, STATE_DIM> {
    residual[YAW_INDEX] = normalize_angle(residual[YAW_INDEX]);
    residual
}
