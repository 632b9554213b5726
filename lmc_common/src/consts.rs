//! System-wide constants for the lab motion controller.
//!
//! Single source of truth for array sizes and timing defaults.
//! Every fixed-size buffer in the workspace is dimensioned from here.

use static_assertions::const_assert;

/// Number of stepper axes (X, Y, Z, E0, E1).
pub const NUM_MOTORS: usize = 5;

/// Command buffer size in bytes, including the terminator slot.
pub const MAX_COMMAND_LENGTH: usize = 64;

/// Serial receive ring capacity in bytes.
pub const RX_RING_CAPACITY: usize = 256;

/// Complete lines that may wait while an operation runs.
pub const PENDING_LINES: usize = 4;

/// Maximum tokens in one command line (name + one per axis + slack).
pub const MAX_TOKENS: usize = NUM_MOTORS + 2;

/// Capacity of a single formatted response line.
pub const RESPONSE_LINE_CAPACITY: usize = 160;

/// Capacity of an axis or control-pin name.
pub const NAME_CAPACITY: usize = 24;

/// Maximum number of auxiliary control outputs.
pub const MAX_CONTROL_PINS: usize = 16;

/// Maximum number of rotor-position inputs.
pub const MAX_ROTOR_INPUTS: usize = 8;

// ─── Supervisor Timing ──────────────────────────────────────────────

/// Default move timeout [ms].
pub const DEFAULT_MOVE_TIMEOUT_MS: u64 = 60_000;

/// Default overall homing timeout [ms].
pub const DEFAULT_HOMING_TIMEOUT_MS: u64 = 30_000;

/// Default host-activity watchdog [ms] (10 min).
pub const DEFAULT_WATCHDOG_TIMEOUT_MS: u64 = 600_000;

/// Interval of the periodic safety pass [ms].
pub const DEFAULT_SAFETY_CHECK_INTERVAL_MS: u64 = 100;

/// Delay before temporary axes are powered down after an operation [ms].
pub const DEFAULT_IDLE_DISABLE_DELAY_MS: u64 = 250;

// ─── Driver Timing ──────────────────────────────────────────────────

/// Driver settle time after an enable transition [µs].
pub const DEFAULT_SETTLE_DELAY_US: u32 = 2_000;

/// Step pulse high time [µs].
pub const DEFAULT_STEP_PULSE_US: u32 = 2;

/// Direction setup time before the next step [µs].
pub const DEFAULT_DIR_SETUP_US: u32 = 1;

// ─── Homing ─────────────────────────────────────────────────────────

/// Escape distance when an endstop is already triggered [steps].
pub const DEFAULT_ESCAPE_STEPS: u32 = 500;

/// Multiplier applied to the nominal duration of a homing phase.
pub const DEFAULT_HOMING_PHASE_SAFETY_FACTOR: u32 = 4;

/// Fixed margin added to every homing phase bound [ms].
pub const HOMING_PHASE_MARGIN_MS: u64 = 1_000;

// ─── Load Cell ──────────────────────────────────────────────────────

/// Data bits in one load-cell ADC sample.
pub const LOAD_CELL_BITS: u32 = 24;

/// Extra clock pulses after the sample selecting channel A, gain 128.
pub const LOAD_CELL_GAIN_PULSES: u32 = 1;

/// Program name reported by `version`.
pub const FIRMWARE_NAME: &str = "lmc_controller";

// Axis masks are packed into a u8.
const_assert!(NUM_MOTORS <= 8);
const_assert!(NUM_MOTORS >= 2);
const_assert!(MAX_COMMAND_LENGTH < RX_RING_CAPACITY);
const_assert!(MAX_TOKENS > NUM_MOTORS);
