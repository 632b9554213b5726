//! Pin-level helpers on top of [`PinIo`].
//!
//! The endstop helper is the only place a raw endstop level is turned into
//! a triggered / open reading.

use lmc_common::axis::{AxisConfig, EndstopPolarity};
use lmc_common::hal::{PinIo, PinMode};

/// Logical endstop state of `axis`.
#[inline]
pub fn read_endstop<P: PinIo>(pins: &mut P, axis: &AxisConfig) -> bool {
    axis.endstop_polarity.is_triggered(pins.read(axis.endstop_pin))
}

/// Input mode matching the sensor type: NPN switches need the pull-up.
#[inline]
pub const fn endstop_mode(polarity: EndstopPolarity) -> PinMode {
    match polarity {
        EndstopPolarity::ActiveLow => PinMode::InputPullup,
        EndstopPolarity::ActiveHigh => PinMode::Input,
    }
}
