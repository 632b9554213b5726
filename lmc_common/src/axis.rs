//! Per-axis configuration record.
//!
//! One immutable [`AxisConfig`] per axis, keyed by its index in
//! `MachineConfig::axes`. Kinematic values are in steps; the safety
//! envelope is in user units (`steps_per_unit` converts).

use crate::consts::NAME_CAPACITY;
use crate::hal::{Level, PinId};
use serde::{Deserialize, Serialize};

/// Axis / control-pin display name.
pub type Name = heapless::String<NAME_CAPACITY>;

/// Electrical sense of an endstop input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndstopPolarity {
    /// NPN sensor, pulled up: LOW = triggered.
    #[default]
    ActiveLow,
    /// PNP sensor: HIGH = triggered.
    ActiveHigh,
}

impl EndstopPolarity {
    /// Logical triggered state for a raw pin level.
    #[inline]
    pub const fn is_triggered(self, level: Level) -> bool {
        match self {
            Self::ActiveLow => !level.is_high(),
            Self::ActiveHigh => level.is_high(),
        }
    }

    /// Sensor family label.
    pub const fn label(self) -> &'static str {
        match self {
            Self::ActiveLow => "NPN",
            Self::ActiveHigh => "PNP",
        }
    }
}

/// Motor power policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPolicy {
    /// Enable line held asserted from boot to shutdown.
    AlwaysOn,
    /// Asserted for operations, deasserted on idle.
    #[default]
    Temporary,
}

/// Immutable configuration of one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AxisConfig {
    pub name: Name,

    // ── Hardware ──
    pub step_pin: PinId,
    pub dir_pin: PinId,
    pub enable_pin: PinId,
    pub endstop_pin: PinId,
    /// Enable input of the driver is active low (A4988/DRV8825 style).
    #[serde(default = "default_true")]
    pub enable_active_low: bool,
    /// Swap the direction line sense.
    #[serde(default)]
    pub invert_direction: bool,

    // ── Kinematics ──
    #[serde(default = "default_steps_per_unit")]
    pub steps_per_unit: f32,
    /// Maximum step rate [steps/s].
    pub max_speed: u32,
    /// Acceleration [steps/s²].
    pub acceleration: u32,
    /// Step rate used by every homing phase [steps/s].
    pub homing_speed: u32,

    #[serde(default)]
    pub endstop_polarity: EndstopPolarity,
    #[serde(default)]
    pub power: PowerPolicy,

    // ── Homing ──
    #[serde(default = "default_max_seek_steps")]
    pub max_seek_steps: u32,
    #[serde(default = "default_home_backoff")]
    pub home_backoff: u32,
    #[serde(default)]
    pub pre_home_backoff: u32,

    // ── Safety envelope [units] ──
    #[serde(default = "default_min_position")]
    pub min_position: f32,
    #[serde(default = "default_max_position")]
    pub max_position: f32,
}

fn default_true() -> bool {
    true
}
fn default_steps_per_unit() -> f32 {
    80.0
}
fn default_max_seek_steps() -> u32 {
    16_000
}
fn default_home_backoff() -> u32 {
    200
}
fn default_min_position() -> f32 {
    -200.0
}
fn default_max_position() -> f32 {
    200.0
}

impl AxisConfig {
    /// Axis with the given pins and speeds, all other fields at defaults.
    pub fn new(
        name: &str,
        pins: [PinId; 4],
        max_speed: u32,
        acceleration: u32,
        homing_speed: u32,
    ) -> Self {
        let mut n = Name::new();
        // Names longer than the capacity are truncated.
        for c in name.chars() {
            if n.push(c).is_err() {
                break;
            }
        }
        Self {
            name: n,
            step_pin: pins[0],
            dir_pin: pins[1],
            enable_pin: pins[2],
            endstop_pin: pins[3],
            enable_active_low: true,
            invert_direction: false,
            steps_per_unit: default_steps_per_unit(),
            max_speed,
            acceleration,
            homing_speed,
            endstop_polarity: EndstopPolarity::default(),
            power: PowerPolicy::default(),
            max_seek_steps: default_max_seek_steps(),
            home_backoff: default_home_backoff(),
            pre_home_backoff: 0,
            min_position: default_min_position(),
            max_position: default_max_position(),
        }
    }

    #[inline]
    pub const fn is_always_on(&self) -> bool {
        matches!(self.power, PowerPolicy::AlwaysOn)
    }

    /// Step rate for homing moves.
    #[inline]
    pub fn homing_rate(&self) -> u32 {
        self.homing_speed.min(self.max_speed)
    }

    /// Target in steps for a position in user units (rounded to nearest).
    #[inline]
    pub fn units_to_steps(&self, units: f32) -> i32 {
        (units * self.steps_per_unit).round() as i32
    }

    #[inline]
    pub fn steps_to_units(&self, steps: i32) -> f32 {
        steps as f32 / self.steps_per_unit
    }

    /// Whether `units` is a finite value inside `[min_position, max_position]`.
    #[inline]
    pub fn accepts_target(&self, units: f32) -> bool {
        units.is_finite() && units >= self.min_position && units <= self.max_position
    }

    /// Level that asserts the enable line.
    #[inline]
    pub const fn enable_level(&self, on: bool) -> Level {
        Level::from_bool(on != self.enable_active_low)
    }

    /// Level of the direction line for travel in the positive direction when
    /// `positive` is true.
    #[inline]
    pub const fn dir_level(&self, positive: bool) -> Level {
        Level::from_bool(positive != self.invert_direction)
    }

    pub(crate) fn validate(&self, index: usize) -> Result<(), String> {
        if self.name.is_empty() {
            return Err(format!("axis {index}: name cannot be empty"));
        }
        if !(self.steps_per_unit.is_finite() && self.steps_per_unit > 0.0) {
            return Err(format!("axis {index}: steps_per_unit must be > 0"));
        }
        if self.max_speed == 0 || self.acceleration == 0 || self.homing_speed == 0 {
            return Err(format!(
                "axis {index}: max_speed, acceleration and homing_speed must be > 0"
            ));
        }
        if self.homing_speed > self.max_speed {
            return Err(format!(
                "axis {index}: homing_speed ({}) exceeds max_speed ({})",
                self.homing_speed, self.max_speed
            ));
        }
        if !(self.min_position.is_finite()
            && self.max_position.is_finite()
            && self.min_position < self.max_position)
        {
            return Err(format!(
                "axis {index}: envelope [{}, {}] is empty",
                self.min_position, self.max_position
            ));
        }
        if self.max_seek_steps == 0 {
            return Err(format!("axis {index}: max_seek_steps must be > 0"));
        }
        let pins = [self.step_pin, self.dir_pin, self.enable_pin];
        if pins[0] == pins[1] || pins[0] == pins[2] || pins[1] == pins[2] {
            return Err(format!("axis {index}: step/dir/enable pins must differ"));
        }
        Ok(())
    }
}
