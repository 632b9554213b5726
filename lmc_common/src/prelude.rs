//! Prelude module for common re-exports.
//!
//! ```rust
//! use lmc_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::axis::{AxisConfig, EndstopPolarity, PowerPolicy};
pub use crate::config::{ConfigError, ConfigLoader, load_config, load_config_from_str};
pub use crate::machine::MachineConfig;

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_COMMAND_LENGTH, NUM_MOTORS};

// ─── Hardware Seam ──────────────────────────────────────────────────
pub use crate::hal::{Clock, Level, PinId, PinIo, PinMode, SerialLink};

// ─── Errors ─────────────────────────────────────────────────────────
pub use crate::error::{ErrorCategory, ErrorKind};
pub use crate::mask::AxisMask;
