//! Machine configuration.
//!
//! ```toml
//! [supervisor]
//! move_timeout_ms = 60000
//!
//! [driver]
//! settle_delay_us = 2000
//!
//! [[axes]]
//! name = "Multi(X)"
//! step_pin = 54
//! dir_pin = 55
//! enable_pin = 38
//! endstop_pin = 14
//! max_speed = 6000
//! acceleration = 5000
//! homing_speed = 6000
//! # ... exactly NUM_MOTORS entries
//!
//! [clamp]
//! axes = [3, 4]
//!
//! [aux]
//! waste_pin = 19
//! control_pins = [{ name = "pump", pin = 18 }]
//! ```
//!
//! Every section is optional; omitted sections fall back to the values of
//! the production machine ([`MachineConfig::default`]).

use crate::axis::{AxisConfig, EndstopPolarity, Name, PowerPolicy};
use crate::config::ConfigError;
use crate::consts::*;
use crate::hal::PinId;
use serde::{Deserialize, Serialize};

// ─── Supervisor ─────────────────────────────────────────────────────

/// Timeouts and lifecycle timing of the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupervisorConfig {
    #[serde(default = "default_move_timeout_ms")]
    pub move_timeout_ms: u64,
    #[serde(default = "default_homing_timeout_ms")]
    pub homing_timeout_ms: u64,
    #[serde(default = "default_watchdog_timeout_ms")]
    pub watchdog_timeout_ms: u64,
    #[serde(default = "default_safety_check_interval_ms")]
    pub safety_check_interval_ms: u64,
    #[serde(default = "default_idle_disable_delay_ms")]
    pub idle_disable_delay_ms: u64,
}

fn default_move_timeout_ms() -> u64 {
    DEFAULT_MOVE_TIMEOUT_MS
}
fn default_homing_timeout_ms() -> u64 {
    DEFAULT_HOMING_TIMEOUT_MS
}
fn default_watchdog_timeout_ms() -> u64 {
    DEFAULT_WATCHDOG_TIMEOUT_MS
}
fn default_safety_check_interval_ms() -> u64 {
    DEFAULT_SAFETY_CHECK_INTERVAL_MS
}
fn default_idle_disable_delay_ms() -> u64 {
    DEFAULT_IDLE_DISABLE_DELAY_MS
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            move_timeout_ms: DEFAULT_MOVE_TIMEOUT_MS,
            homing_timeout_ms: DEFAULT_HOMING_TIMEOUT_MS,
            watchdog_timeout_ms: DEFAULT_WATCHDOG_TIMEOUT_MS,
            safety_check_interval_ms: DEFAULT_SAFETY_CHECK_INTERVAL_MS,
            idle_disable_delay_ms: DEFAULT_IDLE_DISABLE_DELAY_MS,
        }
    }
}

// ─── Driver Timing ──────────────────────────────────────────────────

/// Electrical timing of the stepper drivers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverTiming {
    #[serde(default = "default_step_pulse_us")]
    pub step_pulse_us: u32,
    #[serde(default = "default_dir_setup_us")]
    pub dir_setup_us: u32,
    #[serde(default = "default_settle_delay_us")]
    pub settle_delay_us: u32,
}

fn default_step_pulse_us() -> u32 {
    DEFAULT_STEP_PULSE_US
}
fn default_dir_setup_us() -> u32 {
    DEFAULT_DIR_SETUP_US
}
fn default_settle_delay_us() -> u32 {
    DEFAULT_SETTLE_DELAY_US
}

impl Default for DriverTiming {
    fn default() -> Self {
        Self {
            step_pulse_us: DEFAULT_STEP_PULSE_US,
            dir_setup_us: DEFAULT_DIR_SETUP_US,
            settle_delay_us: DEFAULT_SETTLE_DELAY_US,
        }
    }
}

// ─── Homing ─────────────────────────────────────────────────────────

/// Homing constants shared by all axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HomingConfig {
    /// Escape distance when an endstop reads triggered before seek [steps].
    #[serde(default = "default_escape_steps")]
    pub escape_steps: u32,
    /// Multiplier on the nominal phase duration.
    #[serde(default = "default_phase_safety_factor")]
    pub phase_safety_factor: u32,
}

fn default_escape_steps() -> u32 {
    DEFAULT_ESCAPE_STEPS
}
fn default_phase_safety_factor() -> u32 {
    DEFAULT_HOMING_PHASE_SAFETY_FACTOR
}

impl Default for HomingConfig {
    fn default() -> Self {
        Self {
            escape_steps: DEFAULT_ESCAPE_STEPS,
            phase_safety_factor: DEFAULT_HOMING_PHASE_SAFETY_FACTOR,
        }
    }
}

// ─── Clamp ──────────────────────────────────────────────────────────

/// The axis pair sharing one endstop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClampConfig {
    #[serde(default = "default_clamp_axes")]
    pub axes: [usize; 2],
}

fn default_clamp_axes() -> [usize; 2] {
    [3, 4]
}

impl Default for ClampConfig {
    fn default() -> Self {
        Self {
            axes: default_clamp_axes(),
        }
    }
}

// ─── Auxiliary I/O ──────────────────────────────────────────────────

/// A named level-driven output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ControlPinConfig {
    pub name: Name,
    pub pin: PinId,
}

/// Load-cell ADC wiring (two-wire DOUT/SCK).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoadCellConfig {
    #[serde(default = "default_sck_pin")]
    pub sck_pin: PinId,
    #[serde(default = "default_dout_pin")]
    pub dout_pin: PinId,
}

fn default_sck_pin() -> PinId {
    42
}
fn default_dout_pin() -> PinId {
    40
}

impl Default for LoadCellConfig {
    fn default() -> Self {
        Self {
            sck_pin: default_sck_pin(),
            dout_pin: default_dout_pin(),
        }
    }
}

/// Non-motion pins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuxConfig {
    /// Outputs addressed by index in `pon` / `poff`.
    #[serde(default = "default_control_pins")]
    pub control_pins: heapless::Vec<ControlPinConfig, MAX_CONTROL_PINS>,
    #[serde(default = "default_waste_pin")]
    pub waste_pin: PinId,
    #[serde(default = "default_rotor_pins")]
    pub rotor_pins: heapless::Vec<PinId, MAX_ROTOR_INPUTS>,
    #[serde(default)]
    pub load_cell: LoadCellConfig,
}

fn control_pin(name: &str, pin: PinId) -> ControlPinConfig {
    let mut n = Name::new();
    for c in name.chars() {
        if n.push(c).is_err() {
            break;
        }
    }
    ControlPinConfig { name: n, pin }
}

fn default_control_pins() -> heapless::Vec<ControlPinConfig, MAX_CONTROL_PINS> {
    let mut pins = heapless::Vec::new();
    for (name, pin) in [
        ("pump", 18),
        ("kl1", 8),
        ("kl2", 10),
        ("kl3", 9),
        ("rotor_fwd", 27),
        ("rotor_rev", 29),
    ] {
        if pins.push(control_pin(name, pin)).is_err() {
            break;
        }
    }
    pins
}

fn default_waste_pin() -> PinId {
    19
}

fn default_rotor_pins() -> heapless::Vec<PinId, MAX_ROTOR_INPUTS> {
    let mut pins = heapless::Vec::new();
    for pin in [23, 25, 31, 33] {
        if pins.push(pin).is_err() {
            break;
        }
    }
    pins
}

impl Default for AuxConfig {
    fn default() -> Self {
        Self {
            control_pins: default_control_pins(),
            waste_pin: default_waste_pin(),
            rotor_pins: default_rotor_pins(),
            load_cell: LoadCellConfig::default(),
        }
    }
}

// ─── Machine ────────────────────────────────────────────────────────

/// Complete configuration of the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MachineConfig {
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub driver: DriverTiming,
    #[serde(default)]
    pub homing: HomingConfig,
    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,
    #[serde(default)]
    pub clamp: ClampConfig,
    #[serde(default)]
    pub aux: AuxConfig,
}

/// Axis table of the production machine.
fn default_axes() -> Vec<AxisConfig> {
    // name, [step, dir, enable, endstop], max_speed, accel, homing, steps/unit, polarity, power
    let table: [(&str, [PinId; 4], u32, u32, u32, f32, EndstopPolarity, PowerPolicy); NUM_MOTORS] = [
        ("Multi(X)", [54, 55, 38, 14], 6000, 5000, 6000, 80.0, EndstopPolarity::ActiveHigh, PowerPolicy::AlwaysOn),
        ("Multizone(Y)", [60, 61, 56, 2], 600, 800, 400, 80.0, EndstopPolarity::ActiveLow, PowerPolicy::AlwaysOn),
        ("RRight(Z)", [46, 48, 62, 3], 30000, 2000, 2000, 80.0, EndstopPolarity::ActiveLow, PowerPolicy::AlwaysOn),
        ("E0", [26, 28, 24, 15], 30000, 3000, 1000, 200.0, EndstopPolarity::ActiveLow, PowerPolicy::Temporary),
        ("E1", [36, 34, 30, 15], 30000, 2000, 1000, 200.0, EndstopPolarity::ActiveLow, PowerPolicy::Temporary),
    ];
    table
        .into_iter()
        .map(|(name, pins, max_speed, accel, homing, spu, polarity, power)| {
            let mut axis = AxisConfig::new(name, pins, max_speed, accel, homing);
            axis.steps_per_unit = spu;
            axis.endstop_polarity = polarity;
            axis.power = power;
            axis
        })
        .collect()
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            supervisor: SupervisorConfig::default(),
            driver: DriverTiming::default(),
            homing: HomingConfig::default(),
            axes: default_axes(),
            clamp: ClampConfig::default(),
            aux: AuxConfig::default(),
        }
    }
}

impl MachineConfig {
    /// Axis table as a fixed array.
    ///
    /// Only valid after [`validate`](Self::validate) succeeded.
    pub fn axis_array(&self) -> Result<[AxisConfig; NUM_MOTORS], ConfigError> {
        self.axes.clone().try_into().map_err(|v: Vec<AxisConfig>| {
            ConfigError::ValidationError(format!(
                "expected {NUM_MOTORS} axes, found {}",
                v.len()
            ))
        })
    }

    /// Semantic validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fail = |msg: String| Err(ConfigError::ValidationError(msg));

        if self.axes.len() != NUM_MOTORS {
            return fail(format!(
                "expected {NUM_MOTORS} axes, found {}",
                self.axes.len()
            ));
        }
        for (i, axis) in self.axes.iter().enumerate() {
            axis.validate(i).map_err(ConfigError::ValidationError)?;
        }
        for (i, a) in self.axes.iter().enumerate() {
            for (j, b) in self.axes.iter().enumerate().skip(i + 1) {
                if a.step_pin == b.step_pin {
                    return fail(format!("axes {i} and {j} share step pin {}", a.step_pin));
                }
            }
        }

        let s = &self.supervisor;
        if s.move_timeout_ms == 0 || s.homing_timeout_ms == 0 || s.watchdog_timeout_ms == 0 {
            return fail("supervisor timeouts must be > 0".to_string());
        }
        if s.safety_check_interval_ms == 0 {
            return fail("safety_check_interval_ms must be > 0".to_string());
        }
        if self.driver.step_pulse_us == 0 || self.driver.dir_setup_us == 0 {
            return fail("step_pulse_us and dir_setup_us must be >= 1".to_string());
        }
        if self.homing.phase_safety_factor == 0 {
            return fail("homing.phase_safety_factor must be > 0".to_string());
        }

        let [c0, c1] = self.clamp.axes;
        if c0 >= NUM_MOTORS || c1 >= NUM_MOTORS || c0 == c1 {
            return fail(format!("clamp axes {c0}, {c1} are not a valid pair"));
        }
        let (a, b) = (&self.axes[c0], &self.axes[c1]);
        if a.endstop_pin != b.endstop_pin || a.endstop_polarity != b.endstop_polarity {
            return fail(format!(
                "clamp axes {c0} and {c1} must share one endstop pin and polarity"
            ));
        }

        let lc = &self.aux.load_cell;
        if lc.sck_pin == lc.dout_pin {
            return fail("load cell sck_pin and dout_pin must differ".to_string());
        }
        Ok(())
    }
}
