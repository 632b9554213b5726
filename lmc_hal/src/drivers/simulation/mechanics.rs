//! Mechanical model behind the simulated pins.
//!
//! Each stepper driver turns rising edges on its step pin into one
//! mechanical step in the direction given by its direction line, but only
//! while its enable line is asserted. Endstops compare mechanical
//! positions against a trigger point; a load cell shifts a fixed sample
//! out on its clock line.

use lmc_common::hal::{Level, PinId};

// ─── Stepper ────────────────────────────────────────────────────────

/// One simulated stepper driver and its carriage.
#[derive(Debug, Clone)]
pub struct SimAxis {
    pub step_pin: PinId,
    pub dir_pin: PinId,
    pub enable_pin: PinId,
    /// Direction level meaning "positive".
    pub positive_level: Level,
    /// Enable level meaning "energized".
    pub enabled_level: Level,
    /// Mechanical position [steps].
    pub position: i64,
    /// Signed pulse count since construction.
    pub net_pulses: i64,
    /// Pulses received while the driver was not energized.
    pub pulses_while_disabled: u64,
    /// Timestamps of every pulse [µs].
    pub pulse_times: Vec<u64>,
}

impl SimAxis {
    pub(super) fn step(&mut self, dir: Level, enabled: bool, now_us: u64) {
        let delta = if dir == self.positive_level { 1 } else { -1 };
        self.net_pulses += delta;
        self.pulse_times.push(now_us);
        if enabled {
            self.position += delta;
        } else {
            self.pulses_while_disabled += 1;
        }
    }

    /// Shortest interval between two consecutive pulses [µs].
    pub fn min_pulse_interval_us(&self) -> Option<u64> {
        self.pulse_times.windows(2).map(|w| w[1] - w[0]).min()
    }
}

// ─── Endstop ────────────────────────────────────────────────────────

/// A switch closed while any attached carriage is at or below `trigger_at`.
#[derive(Debug, Clone)]
pub struct SimEndstop {
    pub pin: PinId,
    /// Indices into the board's axis table.
    pub axes: Vec<usize>,
    pub trigger_at: i64,
    /// Raw level when closed.
    pub closed_level: Level,
    /// Forced state overriding the mechanics (sensor fault injection).
    pub stuck: Option<bool>,
}

impl SimEndstop {
    pub(super) fn level(&self, axes: &[SimAxis]) -> Level {
        let closed = self.stuck.unwrap_or_else(|| {
            self.axes
                .iter()
                .any(|&i| axes.get(i).is_some_and(|a| a.position <= self.trigger_at))
        });
        if closed {
            self.closed_level
        } else {
            self.closed_level.inverted()
        }
    }
}

// ─── Load Cell ──────────────────────────────────────────────────────

/// Two-wire 24-bit ADC shifting out a fixed sample MSB first.
#[derive(Debug, Clone)]
pub struct SimLoadCell {
    pub sck_pin: PinId,
    pub dout_pin: PinId,
    pub sample: i32,
    pub ready: bool,
    clocked: u32,
}

impl SimLoadCell {
    pub fn new(sck_pin: PinId, dout_pin: PinId, sample: i32) -> Self {
        Self {
            sck_pin,
            dout_pin,
            sample,
            ready: true,
            clocked: 0,
        }
    }

    pub(super) fn clock(&mut self) {
        self.clocked += 1;
        // 24 data bits + 1 gain pulse starts the next conversion.
        if self.clocked >= 25 {
            self.clocked = 0;
        }
    }

    pub(super) fn dout(&self) -> Level {
        match self.clocked {
            0 => Level::from_bool(!self.ready),
            n @ 1..=24 => {
                let raw = (self.sample as u32) & 0x00FF_FFFF;
                Level::from_bool((raw >> (24 - n)) & 1 == 1)
            }
            _ => Level::High,
        }
    }
}
