//! Simulated controller board.
//!
//! `SimBoard` implements [`PinIo`] over a pin map and the mechanical model
//! in [`super::mechanics`]. It also keeps a write history so tests can
//! check invariants on enable lines after the fact.

use super::clock::SimClock;
use super::mechanics::{SimAxis, SimEndstop, SimLoadCell};
use lmc_common::hal::{Clock, Level, PinId, PinIo, PinMode};
use lmc_common::machine::MachineConfig;
use std::collections::HashMap;
use tracing::trace;

/// One recorded output write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinWrite {
    pub t_us: u64,
    pub pin: PinId,
    pub level: Level,
}

/// Software board.
#[derive(Debug)]
pub struct SimBoard {
    clock: SimClock,
    levels: HashMap<PinId, Level>,
    modes: HashMap<PinId, PinMode>,
    axes: Vec<SimAxis>,
    endstops: Vec<SimEndstop>,
    load_cell: Option<SimLoadCell>,
    writes: Vec<PinWrite>,
}

impl SimBoard {
    /// Empty board.
    pub fn new(clock: SimClock) -> Self {
        Self {
            clock,
            levels: HashMap::new(),
            modes: HashMap::new(),
            axes: Vec::new(),
            endstops: Vec::new(),
            load_cell: None,
            writes: Vec::new(),
        }
    }

    /// Board wired like `config`, every carriage `start_offset` steps above
    /// its endstop trigger point (position 0).
    pub fn from_config(config: &MachineConfig, clock: SimClock, start_offset: i64) -> Self {
        let mut board = Self::new(clock);
        for axis in &config.axes {
            board.add_axis(SimAxis {
                step_pin: axis.step_pin,
                dir_pin: axis.dir_pin,
                enable_pin: axis.enable_pin,
                positive_level: axis.dir_level(true),
                enabled_level: axis.enable_level(true),
                position: start_offset,
                net_pulses: 0,
                pulses_while_disabled: 0,
                pulse_times: Vec::new(),
            });
        }
        for (i, axis) in config.axes.iter().enumerate() {
            if let Some(es) = board.endstop_mut(axis.endstop_pin) {
                es.axes.push(i);
                continue;
            }
            let closed = Level::from_bool(!axis.endstop_polarity.is_triggered(Level::Low));
            board.add_endstop(SimEndstop {
                pin: axis.endstop_pin,
                axes: vec![i],
                trigger_at: 0,
                closed_level: closed,
                stuck: None,
            });
        }
        let lc = &config.aux.load_cell;
        board.set_load_cell(SimLoadCell::new(lc.sck_pin, lc.dout_pin, 0));
        board
    }

    // ─── Wiring ─────────────────────────────────────────────────────

    pub fn add_axis(&mut self, axis: SimAxis) -> usize {
        self.axes.push(axis);
        self.axes.len() - 1
    }

    pub fn add_endstop(&mut self, endstop: SimEndstop) {
        self.endstops.push(endstop);
    }

    pub fn set_load_cell(&mut self, load_cell: SimLoadCell) {
        self.load_cell = Some(load_cell);
    }

    // ─── Inspection ─────────────────────────────────────────────────

    pub fn axis(&self, index: usize) -> &SimAxis {
        &self.axes[index]
    }

    pub fn axis_mut(&mut self, index: usize) -> &mut SimAxis {
        &mut self.axes[index]
    }

    pub fn endstop_mut(&mut self, pin: PinId) -> Option<&mut SimEndstop> {
        self.endstops.iter_mut().find(|e| e.pin == pin)
    }

    pub fn load_cell_mut(&mut self) -> Option<&mut SimLoadCell> {
        self.load_cell.as_mut()
    }

    /// Force the level seen on a plain input.
    pub fn set_input(&mut self, pin: PinId, level: Level) {
        self.levels.insert(pin, level);
    }

    /// Last level written to (or forced on) `pin`.
    pub fn level(&self, pin: PinId) -> Option<Level> {
        self.levels.get(&pin).copied()
    }

    pub fn mode(&self, pin: PinId) -> Option<PinMode> {
        self.modes.get(&pin).copied()
    }

    /// All writes to `pin`, oldest first.
    pub fn writes_to(&self, pin: PinId) -> impl Iterator<Item = &PinWrite> {
        self.writes.iter().filter(move |w| w.pin == pin)
    }

    pub fn clear_history(&mut self) {
        self.writes.clear();
        for axis in &mut self.axes {
            axis.pulse_times.clear();
        }
    }

    /// Whether the driver on `index` is energized.
    pub fn is_energized(&self, index: usize) -> bool {
        let axis = &self.axes[index];
        self.levels.get(&axis.enable_pin) == Some(&axis.enabled_level)
    }
}

impl PinIo for SimBoard {
    fn configure(&mut self, pin: PinId, mode: PinMode) {
        self.modes.insert(pin, mode);
        if mode == PinMode::InputPullup {
            self.levels.entry(pin).or_insert(Level::High);
        }
    }

    fn write(&mut self, pin: PinId, level: Level) {
        trace!(pin, ?level, "sim write");
        self.levels.insert(pin, level);
        self.writes.push(PinWrite {
            t_us: self.clock.now_us(),
            pin,
            level,
        });
    }

    fn read(&mut self, pin: PinId) -> Level {
        if let Some(es) = self.endstops.iter().find(|e| e.pin == pin) {
            return es.level(&self.axes);
        }
        if let Some(lc) = self.load_cell.as_ref().filter(|lc| lc.dout_pin == pin) {
            return lc.dout();
        }
        match self.levels.get(&pin) {
            Some(level) => *level,
            None if self.modes.get(&pin) == Some(&PinMode::InputPullup) => Level::High,
            None => Level::Low,
        }
    }

    fn pulse(&mut self, pin: PinId, _high_us: u32) {
        let now = self.clock.now_us();
        if let Some(axis) = self.axes.iter_mut().find(|a| a.step_pin == pin) {
            let dir = self.levels.get(&axis.dir_pin).copied().unwrap_or(Level::Low);
            let enabled = self.levels.get(&axis.enable_pin) == Some(&axis.enabled_level);
            axis.step(dir, enabled, now);
            return;
        }
        if let Some(lc) = self.load_cell.as_mut().filter(|lc| lc.sck_pin == pin) {
            lc.clock();
            return;
        }
        self.writes.push(PinWrite {
            t_us: now,
            pin,
            level: Level::High,
        });
        self.writes.push(PinWrite {
            t_us: now,
            pin,
            level: Level::Low,
        });
    }
}
