//! Coordinated motion: trapezoid planning and step generation.

pub mod plan;
pub mod profiler;

pub use plan::{AxisLimits, TrapezoidPlan};
pub use profiler::{ProfilePhase, ProfileTick, Profiler, StartOutcome, StopMode};
