//! Motor-power lifecycle over the axis table.
//!
//! | Moment              | always_on        | temporary        |
//! |---------------------|------------------|------------------|
//! | boot                | asserted         | deasserted       |
//! | operation start     | asserted         | participants on  |
//! | idle delay elapsed  | asserted         | deasserted       |
//! | emergency shutdown  | deasserted       | deasserted       |
//! | reset               | re-asserted      | deasserted       |

use crate::axis::{AxisDriver, EnableOutcome};
use lmc_common::consts::NUM_MOTORS;
use lmc_common::hal::PinIo;
use lmc_common::mask::AxisMask;
use tracing::{debug, info};

/// Configure every axis and assert the `always_on` ones.
pub fn boot<P: PinIo>(axes: &mut [AxisDriver; NUM_MOTORS], pins: &mut P, now_us: u64) {
    for axis in axes.iter_mut() {
        axis.init(pins, now_us);
    }
    restore(axes, pins, now_us);
}

/// Assert the enable line of every axis in `mask`. Returns the time from
/// which all of them are settled.
pub fn power_up<P: PinIo>(
    axes: &mut [AxisDriver; NUM_MOTORS],
    pins: &mut P,
    mask: AxisMask,
    settle_us: u32,
    now_us: u64,
) -> u64 {
    let mut ready_at = now_us;
    for i in mask.indices() {
        axes[i].set_enabled(pins, true, now_us);
        if let Some(t) = axes[i].settled_at_us(settle_us) {
            ready_at = ready_at.max(t);
        }
    }
    ready_at
}

/// Deassert every energized `temporary` axis.
pub fn power_down_idle<P: PinIo>(
    axes: &mut [AxisDriver; NUM_MOTORS],
    pins: &mut P,
    now_us: u64,
) -> AxisMask {
    let mut released = AxisMask::empty();
    for axis in axes.iter_mut() {
        if axis.is_enabled()
            && !axis.config().is_always_on()
            && axis.set_enabled(pins, false, now_us) == EnableOutcome::Changed
        {
            released |= AxisMask::single(axis.index());
        }
    }
    if !released.is_empty() {
        debug!(axes = ?released, "idle power-down");
    }
    released
}

/// Deassert every enable line, `always_on` included.
pub fn shutdown<P: PinIo>(axes: &mut [AxisDriver; NUM_MOTORS], pins: &mut P, now_us: u64) {
    for axis in axes.iter_mut() {
        axis.force_disable(pins, now_us);
    }
    info!("all drivers disabled");
}

/// Re-assert the `always_on` axes.
pub fn restore<P: PinIo>(axes: &mut [AxisDriver; NUM_MOTORS], pins: &mut P, now_us: u64) {
    for axis in axes.iter_mut().filter(|a| a.config().is_always_on()) {
        axis.set_enabled(pins, true, now_us);
    }
}

/// Host `enable` / `disable`. Returns the axes that refused the request.
pub fn set_all<P: PinIo>(
    axes: &mut [AxisDriver; NUM_MOTORS],
    pins: &mut P,
    on: bool,
    now_us: u64,
) -> AxisMask {
    let mut refused = AxisMask::empty();
    for axis in axes.iter_mut() {
        if axis.set_enabled(pins, on, now_us) == EnableOutcome::Refused {
            refused |= AxisMask::single(axis.index());
        }
    }
    refused
}
