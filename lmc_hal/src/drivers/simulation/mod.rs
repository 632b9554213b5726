//! Simulation driver module.
//!
//! Software stand-ins for the board, the clock and the serial link, used by
//! the integration tests and by the `lmc_controller` binary when no
//! hardware is attached.

mod board;
mod clock;
mod link;
mod mechanics;

pub use board::{PinWrite, SimBoard};
pub use clock::SimClock;
pub use link::SimLink;
pub use mechanics::{SimAxis, SimEndstop, SimLoadCell};
