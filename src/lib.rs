//! CTRV-UKF: Unscented Kalman Filter sensor fusion for a single moving object
//!
//! Estimates `[px, py, v, yaw, yaw_rate]` from asynchronous position-only
//! (lidar-like) and range/bearing/range-rate (radar-like) measurements using an
//! Unscented Kalman Filter over the Constant Turn Rate and Velocity model.
//!
//! # Features
//!
//! - **Type Safety**: State, augmented, measurement and innovation vectors live
//!   in distinct types
//! - **Pure Stages**: [`filters::ukf::predict`], [`filters::update::update_position`]
//!   and [`filters::update::update_range`] take immutable inputs and return new values
//! - **no_std Support**: Fixed-size storage only, no allocation
//!
//! # Example
//!
//! ```
//! use ctrv_ukf::prelude::*;
//!
//! let mut ukf = SensorFusionUkf::new(FusionConfig::<f64>::default());
//!
//! ukf.process_measurement(&SensorMeasurement::position(0, 1.0, 1.0)).unwrap();
//! let status = ukf
//!     .process_measurement(&SensorMeasurement::position(100_000, 1.1, 1.0))
//!     .unwrap();
//!
//! assert!(matches!(status, FilterStatus::Updated { .. }));
//! let px = *ukf.state().unwrap().mean.index(0);
//! assert!(px > 1.0 && px < 1.1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

pub mod types;
pub mod models;
pub mod filters;
pub mod utils;

pub mod prelude {
    pub use crate::types::spaces::*;
    pub use crate::types::measurement::*;
    pub use crate::models::*;
    pub use crate::filters::fusion::*;
    pub use crate::filters::state::UkfState;
    pub use crate::filters::ukf::{predict, Prediction, UkfParams};
    pub use crate::filters::update::{update_position, update_range, Correction};
    pub use crate::utils::*;
    pub use crate::{Result, UkfError};
}

/// Error types for the library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UkfError {
    /// Augmented covariance has no Cholesky factor
    NotPositiveDefinite,
    /// Innovation covariance cannot be inverted
    SingularMatrix,
    /// Elapsed time handed to the predictor is negative or not finite
    InvalidTimeStep,
    /// Measurement timestamp precedes the filter clock
    OutOfOrderMeasurement {
        /// Timestamp of the last processed measurement (microseconds)
        last_us: i64,
        /// Timestamp of the rejected measurement (microseconds)
        received_us: i64,
    },
    /// Measurement carries a NaN or infinite component
    InvalidMeasurement,
}

#[cfg(feature = "std")]
impl std::error::Error for UkfError {}

impl ::core::fmt::Display for UkfError {
    fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
        match self {
            UkfError::NotPositiveDefinite => write!(f, "Covariance is not positive definite"),
            UkfError::SingularMatrix => write!(f, "Innovation covariance is singular"),
            UkfError::InvalidTimeStep => write!(f, "Time step must be finite and non-negative"),
            UkfError::OutOfOrderMeasurement {
                last_us,
                received_us,
            } => write!(
                f,
                "Measurement at {} us is older than filter time {} us",
                received_us, last_us
            ),
            UkfError::InvalidMeasurement => write!(f, "Measurement contains non-finite values"),
        }
    }
}

pub type Result<T> = ::core::result::Result<T, UkfError>;
