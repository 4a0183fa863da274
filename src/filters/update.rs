//! Unscented measurement update
//!
//! Reuses the predicted sigma points: each one is mapped into measurement
//! space, and the predicted measurement, innovation covariance and
//! state/measurement cross-covariance are recovered from the weighted
//! points. Periodic components (heading, bearing) are wrapped in every
//! residual.

use nalgebra::{RealField, SMatrix, SVector};
use num_traits::Float;
use tracing::debug;

use super::state::UkfState;
use super::ukf::{
    central_covariance, weighted_covariance, weighted_cross_covariance, weighted_mean_about,
    Prediction, SigmaWeights, SIGMA_POINT_COUNT,
};
use crate::models::{
    normalize_state_residual, NonlinearObservationModel, PositionSensor2D,
    RangeBearingRateSensor, STATE_DIM,
};
use crate::types::spaces::{Innovation, Measurement, MeasurementCovariance, StateCovariance};
use crate::types::transforms::{compute_kalman_gain, CrossCovariance, KalmanGain};
use crate::{Result, UkfError};

/// Output of a measurement update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction<T: RealField, const M: usize> {
    /// Posterior estimate
    pub state: UkfState<T>,
    /// Predicted measurement ẑ
    pub predicted_measurement: Measurement<T, M>,
    /// Innovation z - ẑ (periodic components wrapped)
    pub innovation: Innovation<T, M>,
    /// Innovation covariance S
    pub innovation_covariance: MeasurementCovariance<T, M>,
    /// Normalized Innovation Squared νᵀS⁻¹ν
    pub nis: T,
}

/// Innovation covariance, its inverse, and the posterior covariance obtained
/// from one set of sigma-point moments.
struct GainedMoments<T: RealField, const M: usize> {
    innovation_cov: MeasurementCovariance<T, M>,
    innovation_cov_inv: SMatrix<T, M, M>,
    gain: KalmanGain<T, STATE_DIM, M>,
    covariance: StateCovariance<T, STATE_DIM>,
}

/// Forms S = Σ wᵢ·dzᵢ·dzᵢᵀ + R and Tc about the given references, then the
/// gain and the reduced covariance P - K·S·Kᵀ.
#[allow(clippy::too_many_arguments)]
fn gain_about<T, F, const M: usize>(
    prior: &StateCovariance<T, STATE_DIM>,
    x_points: &SMatrix<T, STATE_DIM, SIGMA_POINT_COUNT>,
    x_ref: &SVector<T, STATE_DIM>,
    z_points: &SMatrix<T, M, SIGMA_POINT_COUNT>,
    z_ref: &SVector<T, M>,
    weights: &SigmaWeights<T>,
    noise: &MeasurementCovariance<T, M>,
    normalize_z: F,
) -> Result<GainedMoments<T, M>>
where
    T: RealField + Float + Copy,
    F: Fn(SVector<T, M>) -> SVector<T, M> + Copy,
{
    let innovation_cov = MeasurementCovariance::from_matrix(
        weighted_covariance(z_points, z_ref, weights, normalize_z) + noise.as_matrix(),
    )
    .symmetrize();

    let cross_cov = CrossCovariance::from_matrix(weighted_cross_covariance(
        x_points,
        x_ref,
        z_points,
        z_ref,
        weights,
        normalize_state_residual,
        normalize_z,
    ));

    let innovation_cov_inv = innovation_cov
        .try_inverse()
        .ok_or(UkfError::SingularMatrix)?;

    let gain = compute_kalman_gain(&cross_cov, &innovation_cov_inv);
    let covariance = gain.reduce_covariance(prior, &innovation_cov).symmetrize();

    Ok(GainedMoments {
        innovation_cov,
        innovation_cov_inv,
        gain,
        covariance,
    })
}

/// Fuses one measurement into a prediction.
///
/// The moments are first taken about the predicted mean and measurement. If
/// the negative central weight leaves the posterior covariance without a
/// Cholesky factor, prior, innovation and cross-covariance are all recomputed
/// about the central sigma point, whose joint covariance is positive
/// semi-definite.
///
/// # Errors
/// - [`UkfError::SingularMatrix`] if the innovation covariance cannot be inverted
/// - [`UkfError::NotPositiveDefinite`] if the posterior covariance has no
///   Cholesky factor either way; nothing is returned to store
pub fn unscented_update<T, O, const M: usize>(
    prediction: &Prediction<T>,
    weights: &SigmaWeights<T>,
    sensor: &O,
    measurement: &Measurement<T, M>,
) -> Result<Correction<T, M>>
where
    T: RealField + Float + Copy,
    O: NonlinearObservationModel<T, STATE_DIM, M>,
{
    let normalize_z = |r: SVector<T, M>| sensor.normalize_residual(r);
    let noise = sensor.measurement_noise();

    let x_points = prediction.sigma_points.as_matrix();
    let z_points = prediction
        .sigma_points
        .map::<M, _>(|x| sensor.observe(x).into_svector());

    let z_pred = weighted_mean_about(&z_points, weights, normalize_z);

    let mut moments = gain_about(
        &prediction.state.covariance,
        x_points,
        prediction.state.mean.as_svector(),
        &z_points,
        &z_pred,
        weights,
        &noise,
        normalize_z,
    )?;

    if moments.covariance.cholesky().is_none() {
        debug!("Posterior covariance lost definiteness, using central residuals");
        let x_central: SVector<T, STATE_DIM> = x_points.column(0).into_owned();
        let z_central: SVector<T, M> = z_points.column(0).into_owned();
        let prior = central_covariance(x_points, weights, normalize_state_residual);
        moments = gain_about(
            &prior,
            x_points,
            &x_central,
            &z_points,
            &z_central,
            weights,
            &noise,
            normalize_z,
        )?;
        if moments.covariance.cholesky().is_none() {
            return Err(UkfError::NotPositiveDefinite);
        }
    }

    let predicted_measurement = Measurement::from_svector(z_pred);
    let innovation = sensor.innovation(measurement, &predicted_measurement);
    let mean = prediction.state.mean + moments.gain.correct(&innovation);

    let nu = innovation.as_svector();
    let nis = (nu.transpose() * moments.innovation_cov_inv * nu)[(0, 0)];

    Ok(Correction {
        state: UkfState::new(mean, moments.covariance).with_normalized_yaw(),
        predicted_measurement,
        innovation,
        innovation_covariance: moments.innovation_cov,
        nis,
    })
}

/// Update with a position measurement `[px, py]`.
pub fn update_position<T: RealField + Float + Copy>(
    prediction: &Prediction<T>,
    weights: &SigmaWeights<T>,
    measurement: &Measurement<T, 2>,
    sensor: &PositionSensor2D<T>,
) -> Result<Correction<T, 2>> {
    unscented_update(prediction, weights, sensor, measurement)
}

/// Update with a `[range, bearing, range_rate]` measurement.
pub fn update_range<T: RealField + Float + Copy>(
    prediction: &Prediction<T>,
    weights: &SigmaWeights<T>,
    measurement: &Measurement<T, 3>,
    sensor: &RangeBearingRateSensor<T>,
) -> Result<Correction<T, 3>> {
    unscented_update(prediction, weights, sensor, measurement)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::ukf::{predict, UkfParams};
    use crate::models::CtrvModel;
    use crate::types::spaces::{StateCovariance, StateVector};
    use std::f64::consts::{FRAC_PI_4, PI};

    fn predicted(mean: [f64; 5], variances: [f64; 5]) -> (Prediction<f64>, UkfParams<f64>) {
        let state = UkfState::new(
            StateVector::from_array(mean),
            StateCovariance::from_diagonal(&SVector::from(variances)),
        );
        let params = UkfParams::standard();
        let prediction = predict(&state, 0.0, &CtrvModel::new(1.5, 0.5), &params).unwrap();
        (prediction, params)
    }

    #[test]
    fn test_linear_position_update() {
        let (prediction, params) = predicted([5.0, 3.0, 1.0, 0.0, 0.0], [1.0; 5]);
        let sensor = PositionSensor2D::lidar();
        let z = Measurement::from_array([6.0, 5.0]);

        let correction = update_position(&prediction, params.weights(), &z, &sensor).unwrap();

        // Observation is linear, so S = P_pos + R exactly
        let s = 1.0 + 0.15 * 0.15;
        assert!((correction.predicted_measurement.index(0) - 5.0).abs() < 1e-9);
        assert!((correction.innovation_covariance.as_matrix()[(0, 0)] - s).abs() < 1e-9);
        assert!(correction.innovation_covariance.as_matrix()[(0, 1)].abs() < 1e-9);

        let expected_nis = (1.0 + 4.0) / s;
        assert!(
            (correction.nis - expected_nis).abs() < 1e-9,
            "NIS: {} vs {}",
            correction.nis,
            expected_nis
        );

        let (px, py) = correction.state.position();
        assert!((px - (5.0 + 1.0 / s)).abs() < 1e-9);
        assert!((py - (3.0 + 2.0 / s)).abs() < 1e-9);
    }

    #[test]
    fn test_precise_sensor_recovers_position() {
        let (prediction, params) = predicted([5.0, 3.0, 1.0, 0.2, 0.0], [1.0; 5]);
        let sensor = PositionSensor2D::new(1e-4, 1e-4);
        let z = Measurement::from_array([6.0, 2.0]);

        let correction = update_position(&prediction, params.weights(), &z, &sensor).unwrap();
        let (px, py) = correction.state.position();
        assert!((px - 6.0).abs() < 1e-3, "px: {}", px);
        assert!((py - 2.0).abs() < 1e-3, "py: {}", py);
    }

    #[test]
    fn test_update_shrinks_covariance() {
        let (prediction, params) = predicted([5.0, 3.0, 2.0, 0.4, 0.1], [0.5, 0.5, 1.0, 0.3, 0.2]);
        let sensor = PositionSensor2D::lidar();
        let z = Measurement::from_array([5.2, 2.9]);

        let correction = update_position(&prediction, params.weights(), &z, &sensor).unwrap();

        assert!(correction.state.uncertainty() < prediction.state.uncertainty());
        assert!(correction.state.covariance.is_symmetric(0.0));
        assert!(correction.state.covariance.cholesky().is_some());
        assert!(correction.nis >= 0.0);
    }

    #[test]
    fn test_range_update_near_origin() {
        let (prediction, params) = predicted([1.0, 1.0, 0.5, 0.3, 0.0], [1.0, 1.0, 1.0, 0.5, 0.5]);
        let sensor = RangeBearingRateSensor::radar();
        let z = Measurement::from_array([1.414, FRAC_PI_4, 0.0]);

        let correction = update_range(&prediction, params.weights(), &z, &sensor).unwrap();

        assert!(correction.state.mean.is_finite());
        let (px, py) = correction.state.position();
        assert!(((px - 1.0).powi(2) + (py - 1.0).powi(2)).sqrt() < 0.5, "({}, {})", px, py);
        assert!(correction.state.uncertainty() < prediction.state.uncertainty());
    }

    #[test]
    fn test_bearing_wraps_across_pi() {
        // Object just above the negative x axis; measured just below it
        let (prediction, params) = predicted([-10.0, 0.05, 0.0, 0.0, 0.0], [0.1, 0.1, 0.1, 0.1, 0.1]);
        let sensor = RangeBearingRateSensor::radar();
        let z = Measurement::from_array([10.0, -PI + 0.005, 0.0]);

        let correction = update_range(&prediction, params.weights(), &z, &sensor).unwrap();

        let bearing = *correction.predicted_measurement.index(1);
        assert!(bearing.abs() > 3.0, "predicted bearing: {}", bearing);
        assert!(
            correction.innovation.index(1).abs() < 0.1,
            "bearing innovation: {}",
            correction.innovation.index(1)
        );
        assert!(correction.nis < 10.0, "NIS: {}", correction.nis);

        let (px, py) = correction.state.position();
        assert!((px + 10.0).abs() < 0.5, "px: {}", px);
        assert!(py < 0.05 && py > -0.1, "py: {}", py);
    }

    #[test]
    fn test_posterior_positive_definite_after_long_uncertain_prediction() {
        // A second of heavy process noise spreads the sigma points far enough
        // for the negative central weight to matter
        let model = CtrvModel::new(30.0, 30.0);
        let params = UkfParams::standard();
        let sensor = RangeBearingRateSensor::radar();

        for (mean, z) in [
            ([1.0, 0.5, 4.0, 0.3, 1.0], [1.2, 0.4, 3.0]),
            ([10.0, 5.0, 5.0, 2.0, 0.3], [11.0, 0.5, 4.0]),
            ([-3.0, 0.1, 8.0, -2.5, -1.5], [3.0, 3.1, -6.0]),
        ] {
            let state = UkfState::new(
                StateVector::from_array(mean),
                StateCovariance::from_diagonal(&SVector::from([0.5, 0.5, 4.0, 1.0, 2.0])),
            );
            let prediction = predict(&state, 1.0, &model, &params).unwrap();
            assert!(prediction.state.covariance.cholesky().is_some());

            let z = Measurement::from_array(z);
            let correction = update_range(&prediction, params.weights(), &z, &sensor).unwrap();
            assert!(correction.state.mean.is_finite());
            assert!(correction.state.covariance.is_symmetric(0.0));
            assert!(
                correction.state.covariance.cholesky().is_some(),
                "Posterior has no Cholesky factor for {:?}",
                mean
            );
            assert!(correction.nis.is_finite() && correction.nis >= 0.0);
        }
    }

    struct ConstantSensor;

    impl NonlinearObservationModel<f64, STATE_DIM, 1> for ConstantSensor {
        fn observe(&self, _state: &StateVector<f64, STATE_DIM>) -> Measurement<f64, 1> {
            Measurement::from_array([1.0])
        }

        fn measurement_noise(&self) -> MeasurementCovariance<f64, 1> {
            MeasurementCovariance::zeros()
        }
    }

    #[test]
    fn test_singular_innovation_covariance() {
        let (prediction, params) = predicted([0.0, 0.0, 1.0, 0.0, 0.0], [1.0; 5]);
        let z = Measurement::from_array([2.0]);

        let result = unscented_update(&prediction, params.weights(), &ConstantSensor, &z);
        assert_eq!(result, Err(UkfError::SingularMatrix));
    }
}
