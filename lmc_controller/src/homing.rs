//! Homing sequencer.
//!
//! Drives the selected axes into their endstops and writes the zero
//! reference. Every phase is an ordinary coordinated move executed by the
//! [`Profiler`] at homing speed; the sequencer only decides targets and
//! watches endstops.
//!
//! ## Phases
//!
//! | Phase        | Participants                       | Target                     |
//! |--------------|------------------------------------|----------------------------|
//! | PreBackoff   | selected, `pre_home_backoff > 0`   | `pos + pre_home_backoff`   |
//! | Escape       | selected, endstop triggered        | `pos + escape_steps`       |
//! | Seek         | selected                           | `pos − max_seek_steps`     |
//! | FinalBackoff | homed, `home_backoff > 0`          | `pos + home_backoff`       |
//!
//! During Seek each axis is halted on its first triggered reading while
//! the others continue. Clamp mode treats the pair as one: the shared
//! endstop homes both, and both use the larger of their backoff / seek
//! values so they stay in lockstep.
//!
//! ## Lifecycle
//!
//! 1. Caller powers the participants and calls `start()`
//! 2. `tick()` every main-loop pass: waits for settle, plans, steps, checks
//! 3. `Finished` zeroes every homed axis; `Failed` leaves counters as they are

use crate::axis::AxisDriver;
use crate::motion::{AxisLimits, ProfileTick, Profiler, StartOutcome, StopMode, TrapezoidPlan};
use lmc_common::axis::AxisConfig;
use lmc_common::consts::{HOMING_PHASE_MARGIN_MS, NUM_MOTORS};
use lmc_common::hal::PinIo;
use lmc_common::machine::HomingConfig;
use lmc_common::mask::AxisMask;
use tracing::{debug, info, warn};

// ─── Types ──────────────────────────────────────────────────────────

/// Phase of the homing procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingPhase {
    Idle,
    PreBackoff,
    Escape,
    Seek,
    FinalBackoff,
}

/// Which homing variant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingMode {
    /// Each selected axis has a private endstop.
    PerAxis,
    /// Two axes share one endstop and home together.
    Clamp { pair: [usize; 2] },
}

/// Outcome of a completed homing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HomingReport {
    /// Axes zeroed.
    pub homed: AxisMask,
    /// Axes whose endstop never triggered during seek.
    pub missing: AxisMask,
    /// Axes still triggered after the escape move.
    pub sensor_faults: AxisMask,
    /// Step counter at the moment each endstop triggered.
    pub trigger_positions: [Option<i32>; NUM_MOTORS],
}

/// Reason for homing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingFailReason {
    /// A phase exceeded its time bound.
    PhaseTimeout(HomingPhase),
}

/// Result of a single homing tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingTickResult {
    InProgress,
    Finished(HomingReport),
    Failed { reason: HomingFailReason },
}

// ─── Sequencer ──────────────────────────────────────────────────────

/// Homing state machine.
#[derive(Debug, Clone)]
pub struct HomingSequencer {
    escape_steps: u32,
    safety_factor: u32,
    settle_us: u32,
    dir_setup_us: u32,
    overall_timeout_us: u64,

    phase: HomingPhase,
    mode: HomingMode,
    selected: AxisMask,
    escaped: AxisMask,
    seeking: AxisMask,
    homed: AxisMask,
    sensor_faults: AxisMask,
    unreported_faults: AxisMask,
    trigger_positions: [Option<i32>; NUM_MOTORS],
    move_active: bool,
    phase_deadline_us: u64,
}

impl HomingSequencer {
    pub fn new(
        config: &HomingConfig,
        settle_us: u32,
        dir_setup_us: u32,
        overall_timeout_ms: u64,
    ) -> Self {
        Self {
            escape_steps: config.escape_steps,
            safety_factor: config.phase_safety_factor.max(1),
            settle_us,
            dir_setup_us,
            overall_timeout_us: overall_timeout_ms.saturating_mul(1_000),
            phase: HomingPhase::Idle,
            mode: HomingMode::PerAxis,
            selected: AxisMask::empty(),
            escaped: AxisMask::empty(),
            seeking: AxisMask::empty(),
            homed: AxisMask::empty(),
            sensor_faults: AxisMask::empty(),
            unreported_faults: AxisMask::empty(),
            trigger_positions: [None; NUM_MOTORS],
            move_active: false,
            phase_deadline_us: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> HomingPhase {
        self.phase
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.phase != HomingPhase::Idle
    }

    /// Axes taking part in the current run.
    #[inline]
    pub fn selected(&self) -> AxisMask {
        self.selected
    }

    /// Sensor faults found since the last call.
    pub fn take_new_faults(&mut self) -> AxisMask {
        core::mem::replace(&mut self.unreported_faults, AxisMask::empty())
    }

    /// Begin homing `selected` (ignored in clamp mode, which uses the pair).
    pub fn start(&mut self, mode: HomingMode, selected: AxisMask) {
        self.mode = mode;
        self.selected = match mode {
            HomingMode::PerAxis => selected,
            HomingMode::Clamp { pair } => AxisMask::single(pair[0]) | AxisMask::single(pair[1]),
        };
        self.escaped = AxisMask::empty();
        self.seeking = AxisMask::empty();
        self.homed = AxisMask::empty();
        self.sensor_faults = AxisMask::empty();
        self.unreported_faults = AxisMask::empty();
        self.trigger_positions = [None; NUM_MOTORS];
        self.move_active = false;
        self.phase = HomingPhase::PreBackoff;
        info!(?mode, axes = ?self.selected, "homing started");
    }

    /// Abort to idle without touching position counters.
    pub fn reset(&mut self) {
        self.phase = HomingPhase::Idle;
        self.move_active = false;
    }

    /// Advance the procedure.
    pub fn tick<P: PinIo>(
        &mut self,
        axes: &mut [AxisDriver; NUM_MOTORS],
        profiler: &mut Profiler,
        pins: &mut P,
        now_us: u64,
    ) -> HomingTickResult {
        loop {
            if self.phase == HomingPhase::Idle {
                return HomingTickResult::InProgress;
            }

            if !self.move_active {
                if !self.all_settled(axes, now_us) {
                    return HomingTickResult::InProgress;
                }
                let targets = self.phase_targets(axes, pins, now_us);
                let limits: [AxisLimits; NUM_MOTORS] =
                    core::array::from_fn(|i| AxisLimits::homing(axes[i].config()));
                let start_at = now_us + u64::from(self.dir_setup_us);
                match profiler.start(axes, pins, &targets, &limits, start_at) {
                    StartOutcome::Started(plan) => {
                        self.move_active = true;
                        self.phase_deadline_us = now_us + self.phase_bound_us(&plan);
                        debug!(phase = ?self.phase, steps = plan.lead_steps, "homing move");
                        return HomingTickResult::InProgress;
                    }
                    StartOutcome::NoMovement => {
                        if let Some(result) = self.finish_phase(axes, pins, now_us) {
                            return result;
                        }
                        continue;
                    }
                }
            }

            if now_us >= self.phase_deadline_us {
                profiler.stop(StopMode::Brake);
                let phase = self.phase;
                self.reset();
                warn!(?phase, "homing phase timed out");
                return HomingTickResult::Failed {
                    reason: HomingFailReason::PhaseTimeout(phase),
                };
            }

            if self.phase == HomingPhase::Seek {
                self.check_endstops(axes, profiler, pins, now_us);
            }
            if profiler.tick(axes, pins, now_us) == ProfileTick::Stepped
                && self.phase == HomingPhase::Seek
            {
                self.check_endstops(axes, profiler, pins, now_us);
            }
            if profiler.is_running() {
                return HomingTickResult::InProgress;
            }

            self.move_active = false;
            if let Some(result) = self.finish_phase(axes, pins, now_us) {
                return result;
            }
        }
    }

    // ─── Phase Logic ────────────────────────────────────────────────

    fn all_settled(&self, axes: &[AxisDriver; NUM_MOTORS], now_us: u64) -> bool {
        self.selected.indices().all(|i| {
            axes[i]
                .settled_at_us(self.settle_us)
                .is_some_and(|t| now_us >= t)
        })
    }

    /// Per-axis amount, or the larger of the pair in clamp mode.
    fn amount(&self, axes: &[AxisDriver; NUM_MOTORS], axis: usize, f: fn(&AxisConfig) -> u32) -> u32 {
        match self.mode {
            HomingMode::PerAxis => f(axes[axis].config()),
            HomingMode::Clamp { pair } => f(axes[pair[0]].config()).max(f(axes[pair[1]].config())),
        }
    }

    fn triggered<P: PinIo>(
        &self,
        axes: &[AxisDriver; NUM_MOTORS],
        pins: &mut P,
        axis: usize,
        now_us: u64,
    ) -> bool {
        let sensor = match self.mode {
            HomingMode::PerAxis => axis,
            HomingMode::Clamp { pair } => pair[0],
        };
        axes[sensor].endstop_reading(pins, now_us, self.settle_us) == Some(true)
    }

    fn phase_targets<P: PinIo>(
        &mut self,
        axes: &[AxisDriver; NUM_MOTORS],
        pins: &mut P,
        now_us: u64,
    ) -> [Option<i32>; NUM_MOTORS] {
        let mut targets = [None; NUM_MOTORS];
        for i in self.selected.indices() {
            let pos = axes[i].position();
            targets[i] = match self.phase {
                HomingPhase::PreBackoff => {
                    let n = self.amount(axes, i, |c| c.pre_home_backoff);
                    (n > 0).then(|| offset(pos, i64::from(n)))
                }
                HomingPhase::Escape => {
                    if self.triggered(axes, pins, i, now_us) {
                        self.escaped |= AxisMask::single(i);
                        Some(offset(pos, i64::from(self.escape_steps)))
                    } else {
                        None
                    }
                }
                HomingPhase::Seek => {
                    self.seeking |= AxisMask::single(i);
                    let n = self.amount(axes, i, |c| c.max_seek_steps);
                    Some(offset(pos, -i64::from(n)))
                }
                HomingPhase::FinalBackoff => {
                    let n = self.amount(axes, i, |c| c.home_backoff);
                    (self.homed.has(i) && n > 0).then(|| offset(pos, i64::from(n)))
                }
                HomingPhase::Idle => None,
            };
        }
        targets
    }

    fn check_endstops<P: PinIo>(
        &mut self,
        axes: &[AxisDriver; NUM_MOTORS],
        profiler: &mut Profiler,
        pins: &mut P,
        now_us: u64,
    ) {
        let pending = self.seeking & !self.homed;
        match self.mode {
            HomingMode::PerAxis => {
                for i in pending.indices() {
                    if self.triggered(axes, pins, i, now_us) {
                        self.mark_homed(axes, profiler, i);
                    }
                }
            }
            HomingMode::Clamp { pair } => {
                if !pending.is_empty() && self.triggered(axes, pins, pair[0], now_us) {
                    for i in pair {
                        self.mark_homed(axes, profiler, i);
                    }
                }
            }
        }
        if !self.seeking.is_empty() && self.homed.contains(self.seeking) {
            profiler.stop(StopMode::Brake);
        }
    }

    fn mark_homed(&mut self, axes: &[AxisDriver; NUM_MOTORS], profiler: &mut Profiler, axis: usize) {
        self.homed |= AxisMask::single(axis);
        self.trigger_positions[axis] = Some(axes[axis].position());
        profiler.halt_axis(axis);
        debug!(axis, position = axes[axis].position(), "endstop reached");
    }

    /// Move to the next phase; `Some` when the procedure ended.
    fn finish_phase<P: PinIo>(
        &mut self,
        axes: &mut [AxisDriver; NUM_MOTORS],
        pins: &mut P,
        now_us: u64,
    ) -> Option<HomingTickResult> {
        self.phase = match self.phase {
            HomingPhase::PreBackoff => HomingPhase::Escape,
            HomingPhase::Escape => {
                for i in self.escaped.indices() {
                    if self.triggered(axes, pins, i, now_us) {
                        warn!(axis = i, "endstop still triggered after escape");
                        self.sensor_faults |= AxisMask::single(i);
                        self.unreported_faults |= AxisMask::single(i);
                    }
                }
                HomingPhase::Seek
            }
            HomingPhase::Seek => HomingPhase::FinalBackoff,
            HomingPhase::FinalBackoff | HomingPhase::Idle => {
                for i in self.homed.indices() {
                    axes[i].reset_position(0);
                }
                self.phase = HomingPhase::Idle;
                let report = HomingReport {
                    homed: self.homed,
                    missing: self.seeking & !self.homed,
                    sensor_faults: self.sensor_faults,
                    trigger_positions: self.trigger_positions,
                };
                info!(homed = ?report.homed, missing = ?report.missing, "homing finished");
                return Some(HomingTickResult::Finished(report));
            }
        };
        debug!(phase = ?self.phase, "homing phase");
        None
    }

    /// Time bound of one phase move.
    fn phase_bound_us(&self, plan: &TrapezoidPlan) -> u64 {
        let rate = u64::from(plan.cruise_rate.max(1));
        let travel_us = u64::from(plan.lead_steps) * 1_000_000 / rate;
        let ramp_us = rate * 1_000_000 / u64::from(plan.acceleration.max(1));
        let bound = (travel_us + ramp_us) * u64::from(self.safety_factor)
            + HOMING_PHASE_MARGIN_MS * 1_000;
        bound.min(self.overall_timeout_us)
    }
}

/// `pos + delta`, saturated to the counter range.
fn offset(pos: i32, delta: i64) -> i32 {
    (i64::from(pos) + delta).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}
