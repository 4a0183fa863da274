//! Observation (sensor) models
//!
//! Describes how sensor measurements relate to the CTRV state. Measurement
//! noise levels are fixed by the sensor manufacturers and exposed as
//! constants; the filter always uses them.

use nalgebra::{RealField, SVector};
use num_traits::Float;

use crate::models::transition::STATE_DIM;
use crate::types::spaces::{Innovation, Measurement, MeasurementCovariance, StateVector};
use crate::utils::normalize_angle;

/// Position sensor noise standard deviation along x (m).
pub const LIDAR_STD_PX: f64 = 0.15;
/// Position sensor noise standard deviation along y (m).
pub const LIDAR_STD_PY: f64 = 0.15;
/// Range noise standard deviation (m).
pub const RADAR_STD_RANGE: f64 = 0.3;
/// Bearing noise standard deviation (rad).
pub const RADAR_STD_BEARING: f64 = 0.03;
/// Range-rate noise standard deviation (m/s).
pub const RADAR_STD_RANGE_RATE: f64 = 0.3;

/// Ranges below this value (m) are clamped when dividing for the range rate.
pub const MIN_RANGE: f64 = 1e-4;

/// Trait for nonlinear observation models used by the unscented update.
///
/// Describes the measurement process z = h(x) + v, where v is zero-mean
/// Gaussian noise with covariance R.
pub trait NonlinearObservationModel<T: RealField, const N: usize, const M: usize> {
    /// Maps a state to its noise-free measurement.
    fn observe(&self, state: &StateVector<T, N>) -> Measurement<T, M>;

    /// Returns the measurement noise covariance R.
    fn measurement_noise(&self) -> MeasurementCovariance<T, M>;

    /// Brings a measurement-space difference back into its canonical range.
    ///
    /// The default leaves linear components untouched.
    fn normalize_residual(&self, residual: SVector<T, M>) -> SVector<T, M> {
        residual
    }

    /// Computes the innovation z - ẑ with periodic components wrapped.
    fn innovation(
        &self,
        measurement: &Measurement<T, M>,
        predicted: &Measurement<T, M>,
    ) -> Innovation<T, M> {
        Innovation::from_svector(
            self.normalize_residual(measurement.as_svector() - predicted.as_svector()),
        )
    }
}

// ============================================================================
// Position Sensor
// ============================================================================

/// Position-only sensor (lidar-like).
///
/// Observes `[px, py]` from `[px, py, v, yaw, yaw_rate]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionSensor2D<T: RealField> {
    /// X position noise standard deviation
    pub std_px: T,
    /// Y position noise standard deviation
    pub std_py: T,
}

impl<T: RealField + Float + Copy> PositionSensor2D<T> {
    /// Creates a position sensor with custom noise.
    ///
    /// For driving [`update_position`](crate::filters::update::update_position)
    /// directly and for tests. [`SensorFusionUkf`](crate::filters::fusion::SensorFusionUkf)
    /// always fuses with [`lidar`](Self::lidar).
    ///
    /// # Panics
    /// Panics if either standard deviation is not strictly positive.
    pub fn new(std_px: T, std_py: T) -> Self {
        assert!(std_px > T::zero(), "Measurement noise std_px must be positive");
        assert!(std_py > T::zero(), "Measurement noise std_py must be positive");
        Self { std_px, std_py }
    }

    /// The manufacturer-specified lidar.
    pub fn lidar() -> Self {
        Self::new(nalgebra::convert(LIDAR_STD_PX), nalgebra::convert(LIDAR_STD_PY))
    }

    /// Position implied by a raw measurement.
    #[inline]
    pub fn to_cartesian(&self, measurement: &Measurement<T, 2>) -> (T, T) {
        (*measurement.index(0), *measurement.index(1))
    }
}

impl<T: RealField + Float + Copy> NonlinearObservationModel<T, STATE_DIM, 2>
    for PositionSensor2D<T>
{
    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, 2> {
        Measurement::from_array([*state.index(0), *state.index(1)])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 2> {
        MeasurementCovariance::from_diagonal(&nalgebra::vector![
            self.std_px * self.std_px,
            self.std_py * self.std_py
        ])
    }
}

// ============================================================================
// Range / Bearing / Range-Rate Sensor
// ============================================================================

/// Polar sensor (radar-like) located at the origin.
///
/// Observes `[range, bearing, range_rate]`:
/// - range = √(px² + py²)
/// - bearing = atan2(py, px)
/// - range_rate = (px·v·cos ψ + py·v·sin ψ) / max(range, [`MIN_RANGE`])
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeBearingRateSensor<T: RealField> {
    /// Range noise standard deviation
    pub std_range: T,
    /// Bearing noise standard deviation (radians)
    pub std_bearing: T,
    /// Range-rate noise standard deviation
    pub std_range_rate: T,
}

impl<T: RealField + Float + Copy> RangeBearingRateSensor<T> {
    /// Creates a polar sensor with custom noise.
    ///
    /// For driving [`update_range`](crate::filters::update::update_range)
    /// directly and for tests. [`SensorFusionUkf`](crate::filters::fusion::SensorFusionUkf)
    /// always fuses with [`radar`](Self::radar).
    ///
    /// # Panics
    /// Panics if any standard deviation is not strictly positive.
    pub fn new(std_range: T, std_bearing: T, std_range_rate: T) -> Self {
        assert!(std_range > T::zero(), "Range noise std_range must be positive");
        assert!(std_bearing > T::zero(), "Bearing noise std_bearing must be positive");
        assert!(
            std_range_rate > T::zero(),
            "Range-rate noise std_range_rate must be positive"
        );
        Self {
            std_range,
            std_bearing,
            std_range_rate,
        }
    }

    /// The manufacturer-specified radar.
    pub fn radar() -> Self {
        Self::new(
            nalgebra::convert(RADAR_STD_RANGE),
            nalgebra::convert(RADAR_STD_BEARING),
            nalgebra::convert(RADAR_STD_RANGE_RATE),
        )
    }

    /// Converts the polar part of a measurement to `(px, py)`.
    #[inline]
    pub fn to_cartesian(&self, measurement: &Measurement<T, 3>) -> (T, T) {
        let range = *measurement.index(0);
        let (sin_b, cos_b) = Float::sin_cos(*measurement.index(1));
        (range * cos_b, range * sin_b)
    }
}

impl<T: RealField + Float + Copy> NonlinearObservationModel<T, STATE_DIM, 3>
    for RangeBearingRateSensor<T>
{
    fn observe(&self, state: &StateVector<T, STATE_DIM>) -> Measurement<T, 3> {
        let px = *state.index(0);
        let py = *state.index(1);
        let v = *state.index(2);
        let yaw = *state.index(3);

        let range = Float::sqrt(px * px + py * py);
        let bearing = Float::atan2(py, px);
        let (sin_yaw, cos_yaw) = Float::sin_cos(yaw);
        let denominator = Float::max(range, nalgebra::convert(MIN_RANGE));
        let range_rate = (px * v * cos_yaw + py * v * sin_yaw) / denominator;

        Measurement::from_array([range, bearing, range_rate])
    }

    fn measurement_noise(&self) -> MeasurementCovariance<T, 3> {
        MeasurementCovariance::from_diagonal(&nalgebra::vector![
            self.std_range * self.std_range,
            self.std_bearing * self.std_bearing,
            self.std_range_rate * self.std_range_rate
        ])
    }

    fn normalize_residual(&self, mut residual: SVector<T, 3>) -> SVector<T, 3> {
        residual[1] = normalize_angle(residual[1]);
        residual
    }
}
