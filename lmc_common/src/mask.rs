//! Axis selection mask.

use crate::consts::NUM_MOTORS;
use bitflags::bitflags;

bitflags! {
    /// Set of axes, bit `i` = axis `i`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AxisMask: u8 {
        const X  = 1 << 0;
        const Y  = 1 << 1;
        const Z  = 1 << 2;
        const E0 = 1 << 3;
        const E1 = 1 << 4;

        /// Axes with a private endstop (per-axis homing allowed).
        const PER_AXIS_HOMING = Self::X.bits() | Self::Y.bits() | Self::Z.bits() | Self::E0.bits();
    }
}

impl AxisMask {
    /// Mask containing only `axis`; empty if out of range.
    #[inline]
    pub const fn single(axis: usize) -> Self {
        if axis < NUM_MOTORS {
            Self::from_bits_truncate(1 << axis)
        } else {
            Self::empty()
        }
    }

    /// Whether `axis` is selected.
    #[inline]
    pub const fn has(self, axis: usize) -> bool {
        axis < NUM_MOTORS && self.bits() & (1 << axis) != 0
    }

    /// Build from a per-axis boolean vector.
    pub fn from_flags(flags: &[bool; NUM_MOTORS]) -> Self {
        flags
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .fold(Self::empty(), |acc, (i, _)| acc | Self::single(i))
    }

    /// Indices of the selected axes, ascending.
    pub fn indices(self) -> impl Iterator<Item = usize> {
        (0..NUM_MOTORS).filter(move |&i| self.has(i))
    }

    /// Number of selected axes.
    #[inline]
    pub const fn count(self) -> u32 {
        self.bits().count_ones()
    }
}
