//! LMC HAL: backends for the controller's hardware seam.
//!
//! - [`drivers::simulation`]: software board (pin map, mechanical model
//!   with endstops, load-cell shifter, manual clock, in-memory serial link).
//! - [`drivers::host`]: wall clock and a stdin/stdout serial link for
//!   running the controller as a host process.

pub mod drivers;

pub use drivers::host::{StdClock, StdioLink};
pub use drivers::simulation::{SimBoard, SimClock, SimLink};
