//! Typed transformation matrices
//!
//! Matrices that map vectors between spaces, with the source and target
//! spaces encoded in the type.

use ::core::marker::PhantomData;
use nalgebra::{RealField, SMatrix, Scalar};

use super::spaces::{
    Innovation, InnovationSpace, MeasurementCovariance, MeasurementSpace, StateCovariance,
    StateSpace, StateVector,
};

// ============================================================================
// Transform Matrix
// ============================================================================

/// A matrix that maps vectors from the `From` space to the `To` space.
#[repr(transparent)]
#[derive(Debug, Clone, PartialEq)]
pub struct Transform<T: Scalar, const ROWS: usize, const COLS: usize, To, From> {
    inner: SMatrix<T, ROWS, COLS>,
    _marker: PhantomData<(To, From)>,
}

impl<T: Scalar, const ROWS: usize, const COLS: usize, To, From> Transform<T, ROWS, COLS, To, From> {
    #[inline]
    pub fn from_matrix(inner: SMatrix<T, ROWS, COLS>) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn as_matrix(&self) -> &SMatrix<T, ROWS, COLS> {
        &self.inner
    }

    #[inline]
    pub fn into_matrix(self) -> SMatrix<T, ROWS, COLS> {
        self.inner
    }
}

impl<T: Scalar + Copy, const ROWS: usize, const COLS: usize, To: Clone, From: Clone> Copy
    for Transform<T, ROWS, COLS, To, From>
where
    SMatrix<T, ROWS, COLS>: Copy,
{
}

/// Cross-covariance between state and measurement: Tc = Σ wᵢ (Xᵢ - x)(Zᵢ - ẑ)ᵀ
pub type CrossCovariance<T, const N: usize, const M: usize> =
    Transform<T, N, M, StateSpace, MeasurementSpace>;

/// Kalman gain: InnovationSpace -> StateSpace
pub type KalmanGain<T, const N: usize, const M: usize> =
    Transform<T, N, M, StateSpace, InnovationSpace>;

impl<T: RealField + Copy, const N: usize, const M: usize> KalmanGain<T, N, M> {
    /// Applies the gain to an innovation, giving the state correction K·ν.
    #[inline]
    pub fn correct(&self, innovation: &Innovation<T, M>) -> StateVector<T, N> {
        StateVector::from_svector(self.inner * innovation.as_svector())
    }

    /// Removes the information gained from the measurement: P - K·S·Kᵀ
    #[inline]
    pub fn reduce_covariance(
        &self,
        state_cov: &StateCovariance<T, N>,
        innovation_cov: &MeasurementCovariance<T, M>,
    ) -> StateCovariance<T, N> {
        StateCovariance::from_matrix(
            state_cov.as_matrix() - self.inner * innovation_cov.as_matrix() * self.inner.transpose(),
        )
    }
}

/// Computes the Kalman gain K = Tc · S⁻¹ from a precomputed S⁻¹.
#[inline]
pub fn compute_kalman_gain<T: RealField + Copy, const N: usize, const M: usize>(
    cross_cov: &CrossCovariance<T, N, M>,
    innovation_cov_inv: &SMatrix<T, M, M>,
) -> KalmanGain<T, N, M> {
    KalmanGain::from_matrix(cross_cov.as_matrix() * innovation_cov_inv)
}
