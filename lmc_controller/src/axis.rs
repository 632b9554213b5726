//! Axis driver.
//!
//! Owns the step, direction and enable lines of one axis and its signed
//! step counter. Performs no scheduling: callers decide when to pulse.
//!
//! ## Power policy
//!
//! | Policy      | `set_enabled(false)`         | Emergency shutdown |
//! |-------------|------------------------------|--------------------|
//! | `AlwaysOn`  | refused, logged              | deasserted         |
//! | `Temporary` | deasserted                   | deasserted         |

use crate::pins::{endstop_mode, read_endstop};
use lmc_common::axis::AxisConfig;
use lmc_common::hal::{Level, PinIo, PinMode};
use tracing::{trace, warn};

/// Travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    /// Direction of a signed delta (zero counts as positive).
    #[inline]
    pub const fn from_delta(delta: i64) -> Self {
        if delta < 0 { Self::Negative } else { Self::Positive }
    }

    #[inline]
    pub const fn sign(self) -> i32 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }
}

/// Result of an enable request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableOutcome {
    /// Line changed level.
    Changed,
    /// Line already at the requested level.
    Unchanged,
    /// Deassert refused by the `always_on` policy.
    Refused,
}

/// Driver for one stepper axis.
#[derive(Debug, Clone)]
pub struct AxisDriver {
    index: usize,
    config: AxisConfig,
    step_pulse_us: u32,
    position: i32,
    direction: Direction,
    enabled: bool,
    /// Time of the last enable transition [µs].
    power_changed_at_us: u64,
}

impl AxisDriver {
    pub fn new(index: usize, config: AxisConfig, step_pulse_us: u32) -> Self {
        Self {
            index,
            config,
            step_pulse_us,
            position: 0,
            direction: Direction::Positive,
            enabled: false,
            power_changed_at_us: 0,
        }
    }

    /// Configure the axis pins and drive every output to its idle level
    /// (enable deasserted).
    pub fn init<P: PinIo>(&mut self, pins: &mut P, now_us: u64) {
        let c = &self.config;
        pins.configure(c.step_pin, PinMode::Output);
        pins.configure(c.dir_pin, PinMode::Output);
        pins.configure(c.enable_pin, PinMode::Output);
        pins.configure(c.endstop_pin, endstop_mode(c.endstop_polarity));
        pins.write(c.step_pin, Level::Low);
        pins.write(c.dir_pin, c.dir_level(true));
        pins.write(c.enable_pin, c.enable_level(false));
        self.direction = Direction::Positive;
        self.enabled = false;
        self.power_changed_at_us = now_us;
    }

    #[inline]
    pub const fn index(&self) -> usize {
        self.index
    }

    #[inline]
    pub fn config(&self) -> &AxisConfig {
        &self.config
    }

    #[inline]
    pub const fn position(&self) -> i32 {
        self.position
    }

    /// Overwrite the step counter (homing zero).
    #[inline]
    pub fn reset_position(&mut self, value: i32) {
        self.position = value;
    }

    #[inline]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[inline]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Position in user units.
    #[inline]
    pub fn position_units(&self) -> f32 {
        self.config.steps_to_units(self.position)
    }

    /// Assert or deassert the enable line, honouring the power policy.
    pub fn set_enabled<P: PinIo>(&mut self, pins: &mut P, on: bool, now_us: u64) -> EnableOutcome {
        if !on && self.config.is_always_on() {
            warn!(
                axis = self.index,
                "Ignoring disable request for always-on axis {}", self.config.name
            );
            return EnableOutcome::Refused;
        }
        self.write_enable(pins, on, now_us)
    }

    /// Deassert the enable line regardless of policy (emergency shutdown).
    pub fn force_disable<P: PinIo>(&mut self, pins: &mut P, now_us: u64) -> EnableOutcome {
        self.write_enable(pins, false, now_us)
    }

    fn write_enable<P: PinIo>(&mut self, pins: &mut P, on: bool, now_us: u64) -> EnableOutcome {
        if self.enabled == on {
            return EnableOutcome::Unchanged;
        }
        pins.write(self.config.enable_pin, self.config.enable_level(on));
        self.enabled = on;
        self.power_changed_at_us = now_us;
        trace!(axis = self.index, on, "enable line");
        EnableOutcome::Changed
    }

    /// Set the direction line. The caller keeps the next pulse at least the
    /// driver setup time away.
    pub fn set_direction<P: PinIo>(&mut self, pins: &mut P, direction: Direction) {
        pins.write(
            self.config.dir_pin,
            self.config.dir_level(direction == Direction::Positive),
        );
        self.direction = direction;
    }

    /// One step pulse; the counter follows the latched direction.
    #[inline]
    pub fn emit_step<P: PinIo>(&mut self, pins: &mut P) {
        pins.pulse(self.config.step_pin, self.step_pulse_us);
        self.position = self.position.wrapping_add(self.direction.sign());
    }

    /// Earliest time endstop readings are valid, if powered.
    #[inline]
    pub fn settled_at_us(&self, settle_us: u32) -> Option<u64> {
        self.enabled
            .then(|| self.power_changed_at_us + u64::from(settle_us))
    }

    /// Logical endstop state, regardless of power.
    #[inline]
    pub fn endstop_triggered<P: PinIo>(&self, pins: &mut P) -> bool {
        read_endstop(pins, &self.config)
    }

    /// Endstop state, `None` while unpowered or settling.
    pub fn endstop_reading<P: PinIo>(
        &self,
        pins: &mut P,
        now_us: u64,
        settle_us: u32,
    ) -> Option<bool> {
        match self.settled_at_us(settle_us) {
            Some(t) if now_us >= t => Some(self.endstop_triggered(pins)),
            _ => None,
        }
    }
}
