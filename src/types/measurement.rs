//! Timestamped sensor records handed to the filter
//!
//! A record pairs a timestamp in integer microseconds with a payload whose
//! dimension is fixed by the sensor kind, so a position reading can never be
//! routed to the range/bearing model.

use nalgebra::RealField;

use super::spaces::Measurement;

/// Microseconds per second, for converting record timestamps to `dt`.
pub const MICROS_PER_SECOND: f64 = 1_000_000.0;

/// Which sensor produced a measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// Cartesian position sensor reporting `[px, py]`
    Position,
    /// Polar sensor reporting `[range, bearing, range_rate]`
    RangeBearing,
}

/// Raw values of a measurement, shaped by the sensor kind.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorData<T: RealField> {
    /// `[px, py]`
    Position(Measurement<T, 2>),
    /// `[range, bearing, range_rate]`, bearing in radians
    RangeBearing(Measurement<T, 3>),
}

/// A single timestamped measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorMeasurement<T: RealField> {
    /// Acquisition time in microseconds
    pub timestamp_us: i64,
    /// Sensor payload
    pub data: SensorData<T>,
}

impl<T: RealField + Copy> SensorMeasurement<T> {
    /// Creates a position-sensor record.
    pub fn position(timestamp_us: i64, px: T, py: T) -> Self {
        Self {
            timestamp_us,
            data: SensorData::Position(Measurement::from_array([px, py])),
        }
    }

    /// Creates a range/bearing/range-rate record.
    pub fn range_bearing(timestamp_us: i64, range: T, bearing: T, range_rate: T) -> Self {
        Self {
            timestamp_us,
            data: SensorData::RangeBearing(Measurement::from_array([range, bearing, range_rate])),
        }
    }

    /// The sensor that produced this record.
    #[inline]
    pub fn kind(&self) -> SensorKind {
        match self.data {
            SensorData::Position(_) => SensorKind::Position,
            SensorData::RangeBearing(_) => SensorKind::RangeBearing,
        }
    }

    /// Returns true if every raw value is finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        match &self.data {
            SensorData::Position(z) => z.is_finite(),
            SensorData::RangeBearing(z) => z.is_finite(),
        }
    }
}
