//! Trapezoidal step generator.
//!
//! ## State machine
//!
//! ```text
//! Idle ──start──▶ Accelerating ──▶ Cruising ──▶ Decelerating ──▶ Idle
//!                      │               │              │
//!                      └──────── stop(Brake) ─────────┴──▶ Idle
//! ```
//!
//! ## Timing
//!
//! Inter-step intervals are kept in fixed point (8 fractional bits of a
//! microsecond). The first interval `c0 = 0.676·√(2/a)` is the only square
//! root, taken once per move; after that the ramp uses the incremental
//! form
//!
//! - accelerate: `c_n = c_{n-1} − 2·c_{n-1} / (4n + 1)`
//! - decelerate: `c_{n-1} = c_n + 2·c_n / (4n − 1)`
//!
//! which tracks `v² = v0² + 2·a·s` without per-step roots. Intervals never
//! drop below `1 / v_eff`, rounded up to whole microseconds. Deceleration
//! begins when the remaining lead steps equal the ramp index, so the ramp
//! reaches zero on the final step.
//!
//! Each call to [`Profiler::tick`] emits at most one lead tick; late calls
//! reschedule from the actual emission time, so a slow main loop lowers
//! the step rate but never raises it.

use super::plan::{AxisLimits, TrapezoidPlan};
use crate::axis::{AxisDriver, Direction};
use lmc_common::consts::NUM_MOTORS;
use lmc_common::hal::PinIo;
use lmc_common::mask::AxisMask;
use tracing::{debug, trace};

const FRAC_BITS: u32 = 8;
const ONE_SECOND_Q8: u64 = 1_000_000 << FRAC_BITS;

// ─── Types ──────────────────────────────────────────────────────────

/// Phase of the shared velocity profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfilePhase {
    Idle,
    Accelerating,
    Cruising,
    Decelerating,
}

/// How to abort a running move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopMode {
    /// Ramp down over the current stopping distance.
    Decelerate,
    /// No further pulses.
    Brake,
}

/// Result of [`Profiler::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// Every participating delta is zero. Nothing was touched.
    NoMovement,
    Started(TrapezoidPlan),
}

/// Result of one [`Profiler::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTick {
    /// No move loaded.
    Idle,
    /// Next step not due yet.
    Waiting,
    /// One lead tick emitted, more to come.
    Stepped,
    /// Last lead tick emitted (or move stopped); now idle.
    Finished,
}

// ─── Profiler ───────────────────────────────────────────────────────

/// Coordinated multi-axis step generator.
#[derive(Debug, Clone)]
pub struct Profiler {
    phase: ProfilePhase,
    plan: Option<TrapezoidPlan>,
    deltas: [u32; NUM_MOTORS],
    accum: [u64; NUM_MOTORS],
    emitted: [u32; NUM_MOTORS],
    halted: AxisMask,
    lead_done: u32,
    /// Lead tick count at which the move ends.
    stop_at: u32,
    ramp_n: u32,
    interval_q8: u64,
    min_interval_q8: u64,
    next_due_us: u64,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    pub const fn new() -> Self {
        Self {
            phase: ProfilePhase::Idle,
            plan: None,
            deltas: [0; NUM_MOTORS],
            accum: [0; NUM_MOTORS],
            emitted: [0; NUM_MOTORS],
            halted: AxisMask::empty(),
            lead_done: 0,
            stop_at: 0,
            ramp_n: 0,
            interval_q8: 0,
            min_interval_q8: 0,
            next_due_us: 0,
        }
    }

    #[inline]
    pub const fn phase(&self) -> ProfilePhase {
        self.phase
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.phase != ProfilePhase::Idle
    }

    /// Plan of the current (or last) move.
    #[inline]
    pub fn plan(&self) -> Option<&TrapezoidPlan> {
        self.plan.as_ref()
    }

    /// Time the next lead tick is due, while running.
    #[inline]
    pub fn next_due_us(&self) -> Option<u64> {
        self.is_running().then_some(self.next_due_us)
    }

    /// Pulses emitted on `axis` during the current (or last) move.
    #[inline]
    pub fn emitted(&self, axis: usize) -> u32 {
        self.emitted[axis]
    }

    /// Step delta of `axis` in the current (or last) move.
    #[inline]
    pub fn delta(&self, axis: usize) -> u32 {
        self.deltas[axis]
    }

    #[inline]
    pub fn halted(&self) -> AxisMask {
        self.halted
    }

    /// Load a move and latch directions. The first step is due at
    /// `start_at_us`, which the caller keeps past the driver setup time.
    ///
    /// `targets[i] == None` means axis `i` does not participate.
    pub fn start<P: PinIo>(
        &mut self,
        axes: &mut [AxisDriver; NUM_MOTORS],
        pins: &mut P,
        targets: &[Option<i32>; NUM_MOTORS],
        limits: &[AxisLimits; NUM_MOTORS],
        start_at_us: u64,
    ) -> StartOutcome {
        let mut deltas = [0u32; NUM_MOTORS];
        let mut directions = [Direction::Positive; NUM_MOTORS];
        for (i, target) in targets.iter().enumerate() {
            if let Some(t) = *target {
                let d = i64::from(t) - i64::from(axes[i].position());
                deltas[i] = u32::try_from(d.unsigned_abs()).unwrap_or(u32::MAX);
                directions[i] = Direction::from_delta(d);
            }
        }

        let Some(plan) = TrapezoidPlan::new(&deltas, limits) else {
            return StartOutcome::NoMovement;
        };

        for (i, axis) in axes.iter_mut().enumerate() {
            if deltas[i] > 0 {
                axis.set_direction(pins, directions[i]);
            }
        }

        let c0_q8 = (0.676 * (2.0 / f64::from(plan.acceleration)).sqrt() * ONE_SECOND_Q8 as f64)
            as u64;
        self.min_interval_q8 = ONE_SECOND_Q8.div_ceil(u64::from(plan.cruise_rate));
        if c0_q8 <= self.min_interval_q8 {
            self.interval_q8 = self.min_interval_q8;
            self.phase = ProfilePhase::Cruising;
        } else {
            self.interval_q8 = c0_q8;
            self.phase = ProfilePhase::Accelerating;
        }

        self.deltas = deltas;
        self.accum = [u64::from(plan.lead_steps / 2); NUM_MOTORS];
        self.emitted = [0; NUM_MOTORS];
        self.halted = AxisMask::empty();
        self.lead_done = 0;
        self.stop_at = plan.lead_steps;
        self.ramp_n = 0;
        self.next_due_us = start_at_us;
        self.plan = Some(plan);

        debug!(
            lead = plan.lead,
            steps = plan.lead_steps,
            rate = plan.cruise_rate,
            accel = plan.acceleration,
            triangle = plan.is_triangle(),
            "move planned"
        );
        StartOutcome::Started(plan)
    }

    /// Emit the next lead tick if it is due.
    pub fn tick<P: PinIo>(
        &mut self,
        axes: &mut [AxisDriver; NUM_MOTORS],
        pins: &mut P,
        now_us: u64,
    ) -> ProfileTick {
        if self.phase == ProfilePhase::Idle {
            return ProfileTick::Idle;
        }
        if now_us < self.next_due_us {
            return ProfileTick::Waiting;
        }

        let lead_steps = u64::from(self.plan.map_or(0, |p| p.lead_steps));
        for (i, axis) in axes.iter_mut().enumerate() {
            if self.deltas[i] == 0 || self.halted.has(i) {
                continue;
            }
            self.accum[i] += u64::from(self.deltas[i]);
            if self.accum[i] >= lead_steps {
                self.accum[i] -= lead_steps;
                axis.emit_step(pins);
                self.emitted[i] += 1;
            }
        }
        self.lead_done += 1;

        if self.advance_ramp() {
            trace!(ticks = self.lead_done, "move finished");
            return ProfileTick::Finished;
        }
        self.next_due_us = now_us + self.interval_q8.div_ceil(1 << FRAC_BITS);
        ProfileTick::Stepped
    }

    /// Update the interval for the next tick. Returns true when done.
    fn advance_ramp(&mut self) -> bool {
        if self.lead_done >= self.stop_at {
            self.phase = ProfilePhase::Idle;
            return true;
        }
        let remaining = self.stop_at - self.lead_done;

        if remaining <= self.ramp_n {
            self.phase = ProfilePhase::Decelerating;
            let n = u64::from(self.ramp_n);
            self.interval_q8 += (2 * self.interval_q8) / (4 * n - 1);
            self.ramp_n -= 1;
        } else if self.phase == ProfilePhase::Accelerating {
            if self.ramp_n > 0 {
                let n = u64::from(self.ramp_n);
                self.interval_q8 -= (2 * self.interval_q8) / (4 * n + 1);
            }
            self.ramp_n += 1;
            if self.interval_q8 <= self.min_interval_q8 {
                self.interval_q8 = self.min_interval_q8;
                self.phase = ProfilePhase::Cruising;
            }
        }
        false
    }

    /// Stop emitting pulses on `axis`; the shared timeline continues.
    pub fn halt_axis(&mut self, axis: usize) {
        self.halted |= AxisMask::single(axis);
        self.accum[axis] = 0;
    }

    /// Abort the running move.
    pub fn stop(&mut self, mode: StopMode) {
        if self.phase == ProfilePhase::Idle {
            return;
        }
        match mode {
            StopMode::Brake => {
                self.phase = ProfilePhase::Idle;
            }
            StopMode::Decelerate => {
                let stop_at = self.lead_done + self.ramp_n;
                if stop_at <= self.lead_done {
                    self.phase = ProfilePhase::Idle;
                } else {
                    self.stop_at = self.stop_at.min(stop_at);
                    self.phase = ProfilePhase::Decelerating;
                }
            }
        }
        debug!(?mode, ticks = self.lead_done, "move stopped");
    }
}
