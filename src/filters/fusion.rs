//! Measurement dispatcher
//!
//! [`SensorFusionUkf`] owns the filter lifecycle. It initializes from the
//! first measurement of either sensor, then for every later measurement
//! predicts to its timestamp and fuses it with the matching sensor model.
//! The stored estimate only changes once a full cycle has succeeded.

use nalgebra::RealField;
use num_traits::Float;
use tracing::{debug, trace, warn};

use super::state::{Lifecycle, UkfState};
use super::ukf::{predict, PredictedSigmaPoints, Prediction, UkfParams};
use super::update::{update_position, update_range};
use crate::models::{CtrvModel, PositionSensor2D, RangeBearingRateSensor};
use crate::types::measurement::{SensorData, SensorKind, SensorMeasurement, MICROS_PER_SECOND};
use crate::types::spaces::{StateCovariance, StateVector};
use crate::{Result, UkfError};

// ============================================================================
// Configuration
// ============================================================================

/// What to do with a measurement older than the filter clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutOfOrderPolicy {
    /// Return [`UkfError::OutOfOrderMeasurement`] and leave the filter untouched
    #[default]
    Reject,
    /// Fuse it with `dt = 0`, keeping the newer filter clock
    ClampToZero,
}

/// Variances for the state components a first measurement cannot observe.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialUncertainty<T> {
    pub speed_variance: T,
    pub yaw_variance: T,
    pub yaw_rate_variance: T,
}

impl<T: RealField + Copy> Default for InitialUncertainty<T> {
    fn default() -> Self {
        Self {
            speed_variance: T::one(),
            yaw_variance: T::one(),
            yaw_rate_variance: T::one(),
        }
    }
}

/// Filter configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionConfig<T> {
    /// Longitudinal acceleration noise standard deviation (m/s²)
    pub std_a: T,
    /// Yaw acceleration noise standard deviation (rad/s²)
    pub std_yawdd: T,
    /// Fuse position measurements
    pub use_position: bool,
    /// Fuse range/bearing/range-rate measurements
    pub use_range: bool,
    pub out_of_order: OutOfOrderPolicy,
    pub initial_uncertainty: InitialUncertainty<T>,
    /// Longest single prediction step in seconds; `None` predicts any gap in one step.
    /// A step that is not finite and positive is treated as `None`.
    pub max_prediction_step: Option<T>,
}

impl<T: RealField + Float + Copy> Default for FusionConfig<T> {
    fn default() -> Self {
        Self {
            std_a: nalgebra::convert(1.5),
            std_yawdd: nalgebra::convert(0.5),
            use_position: true,
            use_range: true,
            out_of_order: OutOfOrderPolicy::Reject,
            initial_uncertainty: InitialUncertainty::default(),
            max_prediction_step: None,
        }
    }
}

impl<T: RealField + Float + Copy> FusionConfig<T> {
    pub fn with_process_noise(mut self, std_a: T, std_yawdd: T) -> Self {
        self.std_a = std_a;
        self.std_yawdd = std_yawdd;
        self
    }

    pub fn with_position_sensor(mut self, enabled: bool) -> Self {
        self.use_position = enabled;
        self
    }

    pub fn with_range_sensor(mut self, enabled: bool) -> Self {
        self.use_range = enabled;
        self
    }

    pub fn with_out_of_order_policy(mut self, policy: OutOfOrderPolicy) -> Self {
        self.out_of_order = policy;
        self
    }

    pub fn with_initial_uncertainty(mut self, uncertainty: InitialUncertainty<T>) -> Self {
        self.initial_uncertainty = uncertainty;
        self
    }

    /// Splits long prediction gaps into steps of at most `step` seconds.
    ///
    /// # Panics
    /// Panics if `step` is not strictly positive.
    pub fn with_max_prediction_step(mut self, step: T) -> Self {
        assert!(step > T::zero(), "Prediction step must be positive");
        self.max_prediction_step = Some(step);
        self
    }
}

// ============================================================================
// Filter
// ============================================================================

/// Outcome of processing one measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterStatus<T> {
    /// First measurement, used to initialize the estimate
    Initialized,
    /// Predicted and fused
    Updated { sensor: SensorKind, nis: T },
    /// Predicted only; the sensor is disabled
    Predicted { sensor: SensorKind },
}

/// CTRV Unscented Kalman Filter fusing position and range/bearing/range-rate sensors.
#[derive(Debug, Clone)]
pub struct SensorFusionUkf<T: RealField> {
    config: FusionConfig<T>,
    model: CtrvModel<T>,
    params: UkfParams<T>,
    position_sensor: PositionSensor2D<T>,
    range_sensor: RangeBearingRateSensor<T>,
    lifecycle: Lifecycle<T>,
    sigma_points: Option<PredictedSigmaPoints<T>>,
    last_nis: Option<T>,
}

impl<T: RealField + Float + Copy> SensorFusionUkf<T> {
    /// Creates an uninitialized filter.
    ///
    /// # Panics
    /// Panics if the configured process noise is not strictly positive.
    pub fn new(config: FusionConfig<T>) -> Self {
        Self {
            model: CtrvModel::new(config.std_a, config.std_yawdd),
            config,
            params: UkfParams::standard(),
            position_sensor: PositionSensor2D::lidar(),
            range_sensor: RangeBearingRateSensor::radar(),
            lifecycle: Lifecycle::Uninitialized,
            sigma_points: None,
            last_nis: None,
        }
    }

    /// Processes one measurement.
    ///
    /// # Errors
    /// - [`UkfError::InvalidMeasurement`] for NaN or infinite values
    /// - [`UkfError::OutOfOrderMeasurement`] for stale timestamps under
    ///   [`OutOfOrderPolicy::Reject`]
    /// - [`UkfError::NotPositiveDefinite`] / [`UkfError::SingularMatrix`] from
    ///   the numerical stages
    ///
    /// The filter is left unchanged on error.
    pub fn process_measurement(
        &mut self,
        measurement: &SensorMeasurement<T>,
    ) -> Result<FilterStatus<T>> {
        if !measurement.is_finite() {
            return Err(UkfError::InvalidMeasurement);
        }

        let sensor = measurement.kind();
        let (state, last_us) = match self.lifecycle {
            Lifecycle::Uninitialized => {
                let state = self.initial_state(&measurement.data);
                debug!(
                    ?sensor,
                    timestamp_us = measurement.timestamp_us,
                    "Initialized from first measurement"
                );
                self.lifecycle = Lifecycle::Ready {
                    state,
                    timestamp_us: measurement.timestamp_us,
                };
                self.sigma_points = None;
                self.last_nis = None;
                return Ok(FilterStatus::Initialized);
            }
            Lifecycle::Ready {
                state,
                timestamp_us,
            } => (state, timestamp_us),
        };

        let elapsed_us = measurement.timestamp_us.saturating_sub(last_us);
        let (dt, timestamp_us) = if elapsed_us < 0 {
            match self.config.out_of_order {
                OutOfOrderPolicy::Reject => {
                    warn!(
                        last_us,
                        received_us = measurement.timestamp_us,
                        "Rejected out-of-order measurement"
                    );
                    return Err(UkfError::OutOfOrderMeasurement {
                        last_us,
                        received_us: measurement.timestamp_us,
                    });
                }
                OutOfOrderPolicy::ClampToZero => {
                    warn!(
                        last_us,
                        received_us = measurement.timestamp_us,
                        "Out-of-order measurement fused at filter time"
                    );
                    (T::zero(), last_us)
                }
            }
        } else {
            let seconds = elapsed_us as f64 / MICROS_PER_SECOND;
            (nalgebra::convert::<f64, T>(seconds), measurement.timestamp_us)
        };

        let prediction = self.predict_over(&state, dt)?;
        trace!(dt = ?dt, uncertainty = ?prediction.state.uncertainty(), "Predicted");

        let weights = self.params.weights();
        let (posterior, status) = match &measurement.data {
            SensorData::Position(z) if self.config.use_position => {
                let correction = update_position(&prediction, weights, z, &self.position_sensor)?;
                (correction.state, FilterStatus::Updated {
                    sensor,
                    nis: correction.nis,
                })
            }
            SensorData::RangeBearing(z) if self.config.use_range => {
                let correction = update_range(&prediction, weights, z, &self.range_sensor)?;
                (correction.state, FilterStatus::Updated {
                    sensor,
                    nis: correction.nis,
                })
            }
            _ => {
                debug!(?sensor, "Sensor disabled, update skipped");
                (prediction.state, FilterStatus::Predicted { sensor })
            }
        };

        if let FilterStatus::Updated { nis, .. } = status {
            trace!(?sensor, nis = ?nis, "Updated");
            self.last_nis = Some(nis);
        }
        self.lifecycle = Lifecycle::Ready {
            state: posterior,
            timestamp_us,
        };
        self.sigma_points = Some(prediction.sigma_points);

        Ok(status)
    }

    /// Predicts over `dt`, in sub-steps when a maximum step is configured.
    fn predict_over(&self, state: &UkfState<T>, dt: T) -> Result<Prediction<T>> {
        let max_step = match self.config.max_prediction_step {
            Some(step) if Float::is_finite(step) && step > T::zero() && dt > step => step,
            _ => return predict(state, dt, &self.model, &self.params),
        };

        let mut current = *state;
        let mut remaining = dt;
        loop {
            let step = Float::min(remaining, max_step);
            let prediction = predict(&current, step, &self.model, &self.params)?;
            remaining -= step;
            if remaining <= T::zero() {
                return Ok(prediction);
            }
            current = prediction.state;
        }
    }

    /// Builds the first estimate from a raw measurement.
    fn initial_state(&self, data: &SensorData<T>) -> UkfState<T> {
        let (px, py, var_px, var_py) = match data {
            SensorData::Position(z) => {
                let (px, py) = self.position_sensor.to_cartesian(z);
                let sensor = &self.position_sensor;
                (px, py, sensor.std_px * sensor.std_px, sensor.std_py * sensor.std_py)
            }
            SensorData::RangeBearing(z) => {
                let (px, py) = self.range_sensor.to_cartesian(z);
                let var = self.range_sensor.std_range * self.range_sensor.std_range;
                (px, py, var, var)
            }
        };

        let unobserved = &self.config.initial_uncertainty;
        UkfState::new(
            StateVector::from_array([px, py, T::zero(), T::zero(), T::zero()]),
            StateCovariance::from_diagonal(&nalgebra::vector![
                var_px,
                var_py,
                unobserved.speed_variance,
                unobserved.yaw_variance,
                unobserved.yaw_rate_variance
            ]),
        )
    }

    /// Current estimate, `None` before the first measurement.
    #[inline]
    pub fn state(&self) -> Option<&UkfState<T>> {
        match &self.lifecycle {
            Lifecycle::Ready { state, .. } => Some(state),
            Lifecycle::Uninitialized => None,
        }
    }

    /// Timestamp of the current estimate in microseconds.
    #[inline]
    pub fn timestamp_us(&self) -> Option<i64> {
        match self.lifecycle {
            Lifecycle::Ready { timestamp_us, .. } => Some(timestamp_us),
            Lifecycle::Uninitialized => None,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.lifecycle.is_ready()
    }

    /// Sigma points of the most recent prediction.
    #[inline]
    pub fn predicted_sigma_points(&self) -> Option<&PredictedSigmaPoints<T>> {
        self.sigma_points.as_ref()
    }

    /// NIS of the most recent measurement update.
    #[inline]
    pub fn last_nis(&self) -> Option<T> {
        self.last_nis
    }

    #[inline]
    pub fn config(&self) -> &FusionConfig<T> {
        &self.config
    }

    #[inline]
    pub fn model(&self) -> &CtrvModel<T> {
        &self.model
    }

    /// Discards the estimate; the next measurement initializes again.
    pub fn reset(&mut self) {
        self.lifecycle = Lifecycle::Uninitialized;
        self.sigma_points = None;
        self.last_nis = None;
    }
}
