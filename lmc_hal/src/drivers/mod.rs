//! Hardware backends.

pub mod host;
pub mod simulation;
