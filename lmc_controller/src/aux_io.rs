//! Auxiliary I/O: control outputs, waste and rotor inputs, load cell.
//!
//! Plain level writes and on-demand reads; nothing here keeps state
//! beyond the pin table.

use heapless::{String, Vec};
use lmc_common::consts::{LOAD_CELL_BITS, LOAD_CELL_GAIN_PULSES, MAX_CONTROL_PINS, MAX_ROTOR_INPUTS};
use lmc_common::error::ErrorKind;
use lmc_common::hal::{Level, PinId, PinIo, PinMode};
use lmc_common::machine::{AuxConfig, ControlPinConfig, LoadCellConfig};
use tracing::debug;

/// Clock high time while shifting the load cell [µs].
const LOAD_CELL_CLOCK_US: u32 = 1;

/// Rotor inputs as a bit string, first input first.
pub type RotorBits = String<MAX_ROTOR_INPUTS>;

#[derive(Debug, Clone)]
pub struct AuxIo {
    controls: Vec<ControlPinConfig, MAX_CONTROL_PINS>,
    waste_pin: PinId,
    rotor_pins: Vec<PinId, MAX_ROTOR_INPUTS>,
    load_cell: LoadCellConfig,
}

impl AuxIo {
    pub fn new(config: &AuxConfig) -> Self {
        Self {
            controls: config.control_pins.clone(),
            waste_pin: config.waste_pin,
            rotor_pins: config.rotor_pins.clone(),
            load_cell: config.load_cell.clone(),
        }
    }

    /// Set pin modes; every control output starts LOW.
    pub fn configure<P: PinIo>(&self, pins: &mut P) {
        for c in &self.controls {
            pins.configure(c.pin, PinMode::Output);
            pins.write(c.pin, Level::Low);
        }
        pins.configure(self.waste_pin, PinMode::InputPullup);
        for &pin in &self.rotor_pins {
            pins.configure(pin, PinMode::InputPullup);
        }
        pins.configure(self.load_cell.sck_pin, PinMode::Output);
        pins.write(self.load_cell.sck_pin, Level::Low);
        pins.configure(self.load_cell.dout_pin, PinMode::Input);
    }

    #[inline]
    pub fn controls(&self) -> &[ControlPinConfig] {
        &self.controls
    }

    /// Drive control output `index`.
    pub fn set_control<P: PinIo>(
        &self,
        pins: &mut P,
        index: usize,
        level: Level,
    ) -> Result<&ControlPinConfig, ErrorKind> {
        let control = self.controls.get(index).ok_or(ErrorKind::InvalidPin)?;
        pins.write(control.pin, level);
        debug!(index, name = %control.name, ?level, "control pin");
        Ok(control)
    }

    pub fn read_waste<P: PinIo>(&self, pins: &mut P) -> Level {
        pins.read(self.waste_pin)
    }

    /// `1` for a HIGH input, `0` for LOW.
    pub fn read_rotor<P: PinIo>(&self, pins: &mut P) -> RotorBits {
        let mut bits = RotorBits::new();
        for &pin in &self.rotor_pins {
            let c = if pins.read(pin).is_high() { '1' } else { '0' };
            // One char per input, sized by the same bound.
            let _ = bits.push(c);
        }
        bits
    }

    /// One raw signed 24-bit load-cell sample. DOUT must already be LOW
    /// (conversion ready); otherwise `Timeout`.
    pub fn read_load_cell_raw<P: PinIo>(&self, pins: &mut P) -> Result<i32, ErrorKind> {
        let LoadCellConfig { sck_pin, dout_pin } = self.load_cell;
        if pins.read(dout_pin).is_high() {
            return Err(ErrorKind::Timeout);
        }
        let mut raw: u32 = 0;
        for _ in 0..LOAD_CELL_BITS {
            pins.pulse(sck_pin, LOAD_CELL_CLOCK_US);
            raw = (raw << 1) | u32::from(pins.read(dout_pin).is_high());
        }
        for _ in 0..LOAD_CELL_GAIN_PULSES {
            pins.pulse(sck_pin, LOAD_CELL_CLOCK_US);
        }
        Ok(sign_extend_24(raw))
    }
}

/// Two's-complement 24-bit value to `i32`.
#[inline]
const fn sign_extend_24(raw: u32) -> i32 {
    ((raw << 8) as i32) >> 8
}
