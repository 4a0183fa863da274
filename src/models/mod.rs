//! Motion and sensor models
//!
//! The CTRV process model and the two sensor observation models.

mod transition;
mod observation;

pub use transition::*;
pub use observation::*;
