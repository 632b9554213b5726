//! Trapezoid planning for a coordinated move.
//!
//! The lead axis (largest delta, lowest index on ties) runs a single
//! trapezoid; every other axis follows it through a Bresenham accumulator.
//! The cruise rate is the largest lead rate at which no follower steps
//! faster than its own `max_speed`, including the uneven spacing of
//! Bresenham steps (`floor(lead / delta)` lead ticks at minimum).

use lmc_common::axis::AxisConfig;
use lmc_common::consts::NUM_MOTORS;

/// Speed and acceleration ceiling of one axis for one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLimits {
    /// [steps/s]
    pub max_speed: u32,
    /// [steps/s²]
    pub acceleration: u32,
}

impl AxisLimits {
    /// Limits for an ordinary move.
    pub fn travel(config: &AxisConfig) -> Self {
        Self {
            max_speed: config.max_speed,
            acceleration: config.acceleration,
        }
    }

    /// Limits for homing moves.
    pub fn homing(config: &AxisConfig) -> Self {
        Self {
            max_speed: config.homing_rate(),
            acceleration: config.acceleration,
        }
    }
}

/// Shared velocity profile of one move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrapezoidPlan {
    pub lead: usize,
    pub lead_steps: u32,
    /// `v_eff` [steps/s].
    pub cruise_rate: u32,
    /// `a_eff` [steps/s²].
    pub acceleration: u32,
    pub accel_steps: u32,
    pub cruise_steps: u32,
    pub decel_steps: u32,
}

/// Steps needed to reach `rate` from standstill: `v² / (2a)`.
#[inline]
pub fn ramp_steps(rate: u32, acceleration: u32) -> u64 {
    let v = u64::from(rate);
    (v * v) / (2 * u64::from(acceleration.max(1)))
}

impl TrapezoidPlan {
    /// Plan a move from absolute deltas; `None` when nothing moves.
    pub fn new(deltas: &[u32; NUM_MOTORS], limits: &[AxisLimits; NUM_MOTORS]) -> Option<Self> {
        let (lead, lead_steps) = deltas
            .iter()
            .copied()
            .enumerate()
            .fold((0, 0), |best, (i, d)| if d > best.1 { (i, d) } else { best });
        if lead_steps == 0 {
            return None;
        }

        let mut cruise_rate = u64::MAX;
        let mut acceleration = u32::MAX;
        for (delta, limit) in deltas.iter().zip(limits) {
            if *delta == 0 {
                continue;
            }
            let spacing = u64::from(lead_steps / delta);
            cruise_rate = cruise_rate.min(u64::from(limit.max_speed) * spacing);
            acceleration = acceleration.min(limit.acceleration);
        }
        let cruise_rate = cruise_rate.clamp(1, u64::from(u32::MAX)) as u32;
        let acceleration = acceleration.max(1);

        let ramp = ramp_steps(cruise_rate, acceleration);
        let (accel_steps, cruise_steps, decel_steps) = if ramp * 2 >= u64::from(lead_steps) {
            let up = lead_steps / 2;
            (up, 0, lead_steps - up)
        } else {
            let ramp = ramp as u32;
            (ramp, lead_steps - 2 * ramp, ramp)
        };

        Some(Self {
            lead,
            lead_steps,
            cruise_rate,
            acceleration,
            accel_steps,
            cruise_steps,
            decel_steps,
        })
    }

    /// Too short to reach the cruise rate.
    #[inline]
    pub const fn is_triangle(&self) -> bool {
        self.cruise_steps == 0
    }
}
