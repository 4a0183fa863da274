//! Utility functions for the filter
//!
//! Angle wrapping and NIS consistency checks.

mod angle;
mod consistency;

pub use angle::*;
pub use consistency::*;
