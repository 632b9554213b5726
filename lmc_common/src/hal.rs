//! Hardware seam.
//!
//! The controller core never touches hardware directly. It is generic over
//! three small traits implemented by a backend (`lmc_hal` provides a
//! simulated board and host adapters):
//!
//! - [`PinIo`]: digital lines
//! - [`Clock`]: monotonic time
//! - [`SerialLink`]: the host byte stream
//!
//! All methods are non-blocking except [`PinIo::pulse`], which holds the
//! line high for a few microseconds.

use serde::{Deserialize, Serialize};

/// Board pin number.
pub type PinId = u8;

/// Logic level of a digital line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[inline]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    #[inline]
    pub const fn from_bool(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }

    #[inline]
    pub const fn inverted(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }

    /// Upper-case label used in protocol output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        Self::from_bool(high)
    }
}

/// Electrical mode of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinMode {
    Output,
    Input,
    InputPullup,
}

/// Digital line access.
pub trait PinIo {
    /// Set the electrical mode of `pin`.
    fn configure(&mut self, pin: PinId, mode: PinMode);

    /// Drive an output.
    fn write(&mut self, pin: PinId, level: Level);

    /// Sample an input.
    fn read(&mut self, pin: PinId) -> Level;

    /// Rising edge, hold for `high_us`, falling edge.
    fn pulse(&mut self, pin: PinId, high_us: u32);
}

/// Monotonic time source.
pub trait Clock {
    /// Microseconds since an arbitrary epoch.
    fn now_us(&self) -> u64;

    /// Milliseconds since the same epoch.
    #[inline]
    fn now_ms(&self) -> u64 {
        self.now_us() / 1_000
    }
}

/// Host byte stream.
pub trait SerialLink {
    /// Next received byte, if any.
    fn read_byte(&mut self) -> Option<u8>;

    /// Queue bytes for transmission.
    fn write_bytes(&mut self, bytes: &[u8]);
}
