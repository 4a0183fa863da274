//! CTRV Unscented Kalman Filter
//!
//! - [`state`]: estimate store and lifecycle
//! - [`ukf`]: sigma points and the prediction stage
//! - [`update`]: position and range/bearing/range-rate updates
//! - [`fusion::SensorFusionUkf`]: per-measurement dispatcher

pub mod fusion;
pub mod state;
pub mod ukf;
pub mod update;
