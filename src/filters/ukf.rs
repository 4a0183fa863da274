//! Unscented Kalman Filter prediction over the CTRV model
//!
//! The state is augmented with the two process noise terms so that the sigma
//! points carry process noise through the nonlinear motion model, rather than
//! adding a linearized Q afterwards.
//!
//! # Sigma Point Selection
//!
//! For the augmented dimension n = 7 with lower Cholesky factor A of P_aug:
//! - χ₀ = x_aug
//! - χᵢ = x_aug + √(λ+n)·Aᵢ for i = 1...n
//! - χᵢ₊ₙ = x_aug - √(λ+n)·Aᵢ for i = 1...n
//!
//! with λ = 3 - n. The weights w₀ = λ/(λ+n), wᵢ = 1/(2(λ+n)) are used for
//! both the mean and the covariance.

use nalgebra::{RealField, SMatrix, SVector};
use num_traits::Float;
use tracing::debug;

use super::state::UkfState;
use crate::models::{normalize_state_residual, CtrvModel, AUGMENTED_DIM, STATE_DIM};
use crate::types::spaces::{AugmentedVector, Covariance, StateCovariance, StateVector};
use crate::{Result, UkfError};

/// Number of sigma points, 2·n_aug + 1.
pub const SIGMA_POINT_COUNT: usize = 2 * AUGMENTED_DIM + 1;

// ============================================================================
// UKF Parameters
// ============================================================================

/// Sigma point weights, one per sigma point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SigmaWeights<T: RealField> {
    values: SVector<T, SIGMA_POINT_COUNT>,
}

impl<T: RealField + Copy> SigmaWeights<T> {
    #[inline]
    pub fn as_svector(&self) -> &SVector<T, SIGMA_POINT_COUNT> {
        &self.values
    }

    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    #[inline]
    pub fn sum(&self) -> T {
        self.values.sum()
    }
}

/// Spread parameter λ and the weights derived from it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UkfParams<T: RealField> {
    lambda: T,
    weights: SigmaWeights<T>,
}

impl<T: RealField + Float + Copy> Default for UkfParams<T> {
    fn default() -> Self {
        Self::standard()
    }
}

impl<T: RealField + Float + Copy> UkfParams<T> {
    /// λ = 3 - n_aug.
    pub fn standard() -> Self {
        let n: T = nalgebra::convert(AUGMENTED_DIM as f64);
        Self::with_lambda(nalgebra::convert::<f64, T>(3.0) - n)
    }

    /// Creates parameters with a custom spread.
    ///
    /// # Panics
    /// Panics if λ + n_aug ≤ 0.
    pub fn with_lambda(lambda: T) -> Self {
        let n: T = nalgebra::convert(AUGMENTED_DIM as f64);
        let spread = lambda + n;
        assert!(spread > T::zero(), "lambda + n_aug must be positive");

        let half: T = nalgebra::convert(0.5);
        let mut values = SVector::<T, SIGMA_POINT_COUNT>::repeat(half / spread);
        values[0] = lambda / spread;

        Self {
            lambda,
            weights: SigmaWeights { values },
        }
    }

    #[inline]
    pub fn lambda(&self) -> T {
        self.lambda
    }

    /// γ = √(λ + n_aug), the sigma point spread factor.
    #[inline]
    pub fn gamma(&self) -> T {
        let n: T = nalgebra::convert(AUGMENTED_DIM as f64);
        Float::sqrt(self.lambda + n)
    }

    #[inline]
    pub fn weights(&self) -> &SigmaWeights<T> {
        &self.weights
    }
}

// ============================================================================
// Sigma Points
// ============================================================================

/// Augmented sigma points, one per column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AugmentedSigmaPoints<T: RealField> {
    points: SMatrix<T, AUGMENTED_DIM, SIGMA_POINT_COUNT>,
}

impl<T: RealField + Float + Copy> AugmentedSigmaPoints<T> {
    /// Generates augmented sigma points from a state estimate.
    ///
    /// # Errors
    /// [`UkfError::NotPositiveDefinite`] if the augmented covariance has no
    /// Cholesky factor.
    pub fn generate(
        state: &UkfState<T>,
        model: &CtrvModel<T>,
        params: &UkfParams<T>,
    ) -> Result<Self> {
        let (x_aug, p_aug) = model.augment(&state.mean, &state.covariance);

        let sqrt_p = p_aug.cholesky().ok_or(UkfError::NotPositiveDefinite)?;
        let scaled_sqrt_p = sqrt_p * params.gamma();

        let mean = x_aug.as_svector();
        let mut points = SMatrix::<T, AUGMENTED_DIM, SIGMA_POINT_COUNT>::zeros();
        points.set_column(0, mean);
        for i in 0..AUGMENTED_DIM {
            let offset = scaled_sqrt_p.column(i);
            points.set_column(i + 1, &(mean + offset));
            points.set_column(i + 1 + AUGMENTED_DIM, &(mean - offset));
        }

        Ok(Self { points })
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, AUGMENTED_DIM, SIGMA_POINT_COUNT> {
        &self.points
    }

    #[inline]
    pub fn column(&self, i: usize) -> AugmentedVector<T, AUGMENTED_DIM> {
        AugmentedVector::from_svector(self.points.column(i).into_owned())
    }

    /// Pushes every sigma point through the CTRV model over `dt` seconds.
    pub fn propagate(&self, model: &CtrvModel<T>, dt: T) -> PredictedSigmaPoints<T> {
        let mut points = SMatrix::<T, STATE_DIM, SIGMA_POINT_COUNT>::zeros();
        for i in 0..SIGMA_POINT_COUNT {
            let predicted = model.propagate_augmented(&self.column(i), dt);
            points.set_column(i, predicted.as_svector());
        }
        PredictedSigmaPoints { points }
    }
}

/// Sigma points after the motion model, noise dimensions dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedSigmaPoints<T: RealField> {
    points: SMatrix<T, STATE_DIM, SIGMA_POINT_COUNT>,
}

impl<T: RealField + Float + Copy> PredictedSigmaPoints<T> {
    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, STATE_DIM, SIGMA_POINT_COUNT> {
        &self.points
    }

    #[inline]
    pub fn column(&self, i: usize) -> StateVector<T, STATE_DIM> {
        StateVector::from_svector(self.points.column(i).into_owned())
    }

    /// Maps every sigma point through `transform`, one output column per point.
    pub fn map<const D: usize, F>(&self, transform: F) -> SMatrix<T, D, SIGMA_POINT_COUNT>
    where
        F: Fn(&StateVector<T, STATE_DIM>) -> SVector<T, D>,
    {
        let mut out = SMatrix::<T, D, SIGMA_POINT_COUNT>::zeros();
        for i in 0..SIGMA_POINT_COUNT {
            out.set_column(i, &transform(&self.column(i)));
        }
        out
    }
}

// ============================================================================
// Weighted Statistics
// ============================================================================

/// Weighted mean Σ wᵢ·χᵢ.
#[inline]
pub fn weighted_mean<T: RealField + Copy, const D: usize>(
    points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
    weights: &SigmaWeights<T>,
) -> SVector<T, D> {
    points * weights.as_svector()
}

/// Weighted mean taken as offsets from the central point.
///
/// Computes χ₀ + Σ wᵢ·normalize(χᵢ - χ₀), which equals [`weighted_mean`] for
/// linear quantities and stays correct for angles straddling ±π.
pub fn weighted_mean_about<T, const D: usize, F>(
    points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
    weights: &SigmaWeights<T>,
    normalize: F,
) -> SVector<T, D>
where
    T: RealField + Copy,
    F: Fn(SVector<T, D>) -> SVector<T, D>,
{
    let reference: SVector<T, D> = points.column(0).into_owned();
    let mut offset = SVector::<T, D>::zeros();
    for (i, &w) in weights.iter().enumerate().skip(1) {
        offset += normalize(points.column(i) - reference) * w;
    }
    normalize(reference + offset)
}

/// Weighted covariance Σ wᵢ·dᵢ·dᵢᵀ with dᵢ = normalize(χᵢ - mean).
pub fn weighted_covariance<T, const D: usize, F>(
    points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
    mean: &SVector<T, D>,
    weights: &SigmaWeights<T>,
    normalize: F,
) -> SMatrix<T, D, D>
where
    T: RealField + Copy,
    F: Fn(SVector<T, D>) -> SVector<T, D>,
{
    let mut cov = SMatrix::<T, D, D>::zeros();
    for (i, &w) in weights.iter().enumerate() {
        let diff = normalize(points.column(i) - mean);
        cov += diff * diff.transpose() * w;
    }
    cov
}

/// Weighted cross-covariance Σ wᵢ·(Xᵢ - x)(Zᵢ - ẑ)ᵀ with both residuals normalized.
pub fn weighted_cross_covariance<T, const N: usize, const D: usize, FX, FZ>(
    x_points: &SMatrix<T, N, SIGMA_POINT_COUNT>,
    x_mean: &SVector<T, N>,
    z_points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
    z_mean: &SVector<T, D>,
    weights: &SigmaWeights<T>,
    normalize_x: FX,
    normalize_z: FZ,
) -> SMatrix<T, N, D>
where
    T: RealField + Copy,
    FX: Fn(SVector<T, N>) -> SVector<T, N>,
    FZ: Fn(SVector<T, D>) -> SVector<T, D>,
{
    let mut cross_cov = SMatrix::<T, N, D>::zeros();
    for (i, &w) in weights.iter().enumerate() {
        let x_diff = normalize_x(x_points.column(i) - x_mean);
        let z_diff = normalize_z(z_points.column(i) - z_mean);
        cross_cov += x_diff * z_diff.transpose() * w;
    }
    cross_cov
}

/// Covariance of the sigma points taken about the central point.
///
/// The central residual is zero, so the negative central weight drops out and
/// the result is positive semi-definite for any spread. It equals the
/// covariance about the weighted mean plus the outer product of the mean shift
/// `x̄ - χ₀`.
pub fn central_covariance<T, const D: usize, F, Space>(
    points: &SMatrix<T, D, SIGMA_POINT_COUNT>,
    weights: &SigmaWeights<T>,
    normalize: F,
) -> Covariance<T, D, Space>
where
    T: RealField + Copy,
    F: Fn(SVector<T, D>) -> SVector<T, D>,
{
    let central: SVector<T, D> = points.column(0).into_owned();
    Covariance::from_matrix(weighted_covariance(points, &central, weights, normalize)).symmetrize()
}

// ============================================================================
// Prediction
// ============================================================================

/// Output of the prediction step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction<T: RealField> {
    /// Predicted mean and covariance
    pub state: UkfState<T>,
    /// Sigma points the prediction was recovered from, reused by the update
    pub sigma_points: PredictedSigmaPoints<T>,
}

/// Predicts the state `dt` seconds ahead.
///
/// 1. Augment the state with the process noise terms
/// 2. Generate augmented sigma points
/// 3. Propagate them through the CTRV model
/// 4. Recover the predicted mean and covariance (yaw residuals wrapped)
///
/// # Errors
/// - [`UkfError::InvalidTimeStep`] if `dt` is negative or not finite
/// - [`UkfError::NotPositiveDefinite`] if the input covariance has no Cholesky
///   factor, or the predicted one has none even about the central point
///
/// The predicted covariance is taken about the weighted mean. When the
/// negative central weight leaves it without a Cholesky factor, it is
/// recomputed with [`central_covariance`].
pub fn predict<T: RealField + Float + Copy>(
    state: &UkfState<T>,
    dt: T,
    model: &CtrvModel<T>,
    params: &UkfParams<T>,
) -> Result<Prediction<T>> {
    if dt < T::zero() || !Float::is_finite(dt) {
        return Err(UkfError::InvalidTimeStep);
    }

    let augmented = AugmentedSigmaPoints::generate(state, model, params)?;
    let sigma_points = augmented.propagate(model, dt);

    let weights = params.weights();
    let points = sigma_points.as_matrix();
    let mean = weighted_mean(points, weights);

    let mut covariance = StateCovariance::from_matrix(weighted_covariance(
        points,
        &mean,
        weights,
        normalize_state_residual,
    ))
    .symmetrize();
    if covariance.cholesky().is_none() {
        debug!(dt = ?dt, "Predicted covariance lost definiteness, using central residuals");
        covariance = central_covariance(points, weights, normalize_state_residual);
        if covariance.cholesky().is_none() {
            return Err(UkfError::NotPositiveDefinite);
        }
    }

    let predicted = UkfState::new(StateVector::from_svector(mean), covariance);

    Ok(Prediction {
        state: predicted.with_normalized_yaw(),
        sigma_points,
    })
}

// ============================================================================
// Tests
// ============================================================================
