//! Core types for type-safe vector spaces, transformations and sensor records

pub mod measurement;
pub mod spaces;
pub mod transforms;
