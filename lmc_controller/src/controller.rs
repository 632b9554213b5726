//! The controller: one owned value holding every component, driven by
//! [`Controller::poll`] from the main loop.
//!
//! ## Poll order
//!
//! | Step | Work                                                          |
//! |------|---------------------------------------------------------------|
//! | 1    | Drain serial bytes into the receive ring                      |
//! | 2    | Tick the active operation (at most one lead step)             |
//! | 3    | Dispatch lines, or queue them while an operation runs         |
//! | 4    | Safety pass (timeout + watchdog) every check interval         |
//! | 5    | Deferred power-down of temporary axes                         |
//!
//! While a move or homing run is active, complete lines are queued and
//! answered in order once it ends; past the queue depth they are refused
//! with `Busy`. An `emergency` line is the exception: it ends the running
//! operation at once.

use crate::aux_io::AuxIo;
use crate::axis::AxisDriver;
use crate::homing::{HomingMode, HomingReport, HomingSequencer, HomingTickResult};
use crate::motion::{AxisLimits, ProfileTick, Profiler, StartOutcome, StopMode};
use crate::power;
use crate::protocol::{Command, CommandName, LineAssembler, Responder, RxLine};
use crate::supervisor::{
    EmergencyCause, SafetyVerdict, Supervisor, SupervisorEvent, SupervisorTransition,
};
use heapless::Deque;
use lmc_common::config::ConfigError;
use lmc_common::consts::{FIRMWARE_NAME, NUM_MOTORS, PENDING_LINES, RESPONSE_LINE_CAPACITY};
use lmc_common::error::{ErrorCategory, ErrorKind};
use lmc_common::hal::{Clock, Level, PinIo, SerialLink};
use lmc_common::machine::MachineConfig;
use lmc_common::mask::AxisMask;
use static_assertions::const_assert;
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};

const HELP_LINES: &[&str] = &[
    "move <x> <y> <z> <e0> <e1>  absolute move in units, * keeps an axis (alias: sm)",
    "home <x> <y> <z> <e0> <e1>  home axes flagged 1 (alias: sh)",
    "clamph                      home the clamp pair on its shared endstop",
    "pon <i> / poff <i>          set control pin i HIGH / LOW (alias: pin)",
    "status                      positions, power, endstops, latch",
    "endstops                    endstop readings",
    "waste                       waste sensor level",
    "rotor                       rotor position inputs",
    "loadcell                    one raw load-cell sample",
    "enable / disable            motor power (always-on axes stay on)",
    "emergency                   latch emergency stop",
    "reset                       clear emergency stop",
    "help / version / test",
];

const fn longest_line(lines: &[&str]) -> usize {
    let mut i = 0;
    let mut max = 0;
    while i < lines.len() {
        if lines[i].len() > max {
            max = lines[i].len();
        }
        i += 1;
    }
    max
}

const_assert!(longest_line(HELP_LINES) < RESPONSE_LINE_CAPACITY);

/// Error constructing a controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Operation owned by the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveOp {
    Move { targets: [Option<i32>; NUM_MOTORS] },
    Homing,
    /// Latched while decelerating; drivers shut down once stopped.
    Stopping,
}

/// Result of executing one command.
enum Reply {
    Complete,
    /// Terminal line follows when the operation ends.
    Deferred,
}

pub struct Controller<P: PinIo, C: Clock, S: SerialLink> {
    pins: P,
    clock: C,
    link: S,
    axes: [AxisDriver; NUM_MOTORS],
    profiler: Profiler,
    homing: HomingSequencer,
    supervisor: Supervisor,
    aux: AuxIo,
    rx: LineAssembler,
    pending: Deque<RxLine, PENDING_LINES>,
    active: Option<ActiveOp>,
    clamp_pair: [usize; 2],
    settle_us: u32,
    dir_setup_us: u32,
}

impl<P: PinIo, C: Clock, S: SerialLink> Controller<P, C, S> {
    /// Validate `config`, configure every pin and power the `always_on`
    /// axes.
    pub fn new(config: MachineConfig, mut pins: P, clock: C, link: S) -> Result<Self, ControllerError> {
        config.validate()?;
        let step_pulse_us = config.driver.step_pulse_us;
        let mut index = 0;
        let mut axes = config.axis_array()?.map(|cfg| {
            let driver = AxisDriver::new(index, cfg, step_pulse_us);
            index += 1;
            driver
        });

        let now_us = clock.now_us();
        power::boot(&mut axes, &mut pins, now_us);
        let aux = AuxIo::new(&config.aux);
        aux.configure(&mut pins);

        info!(
            axes = NUM_MOTORS,
            controls = aux.controls().len(),
            "controller ready"
        );
        Ok(Self {
            pins,
            clock,
            link,
            axes,
            profiler: Profiler::new(),
            homing: HomingSequencer::new(
                &config.homing,
                config.driver.settle_delay_us,
                config.driver.dir_setup_us,
                config.supervisor.homing_timeout_ms,
            ),
            supervisor: Supervisor::new(config.supervisor.clone(), now_us / 1_000),
            aux,
            rx: LineAssembler::new(),
            pending: Deque::new(),
            active: None,
            clamp_pair: config.clamp.axes,
            settle_us: config.driver.settle_delay_us,
            dir_setup_us: config.driver.dir_setup_us,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn pins(&self) -> &P {
        &self.pins
    }

    #[inline]
    pub fn pins_mut(&mut self) -> &mut P {
        &mut self.pins
    }

    #[inline]
    pub fn clock(&self) -> &C {
        &self.clock
    }

    #[inline]
    pub fn link_mut(&mut self) -> &mut S {
        &mut self.link
    }

    #[inline]
    pub fn axis(&self, index: usize) -> &AxisDriver {
        &self.axes[index]
    }

    #[inline]
    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    #[inline]
    pub fn profiler(&self) -> &Profiler {
        &self.profiler
    }

    // ─── Main Loop ──────────────────────────────────────────────────

    /// One main-loop iteration.
    pub fn poll(&mut self) {
        let now_us = self.clock.now_us();
        let now_ms = now_us / 1_000;

        self.drain_serial(now_ms);
        self.tick_operation(now_us);
        self.service_lines(now_us);

        if self.supervisor.safety_due(now_ms) {
            self.safety_pass(now_us);
        }
        if self.supervisor.take_power_down(now_ms) {
            power::power_down_idle(&mut self.axes, &mut self.pins, now_us);
        }
    }

    /// Earliest time anything is due [µs].
    pub fn next_wakeup_us(&self) -> u64 {
        let mut t = self.supervisor.next_safety_check_ms() * 1_000;
        if let Some(at) = self.supervisor.power_down_at_ms() {
            t = t.min(at * 1_000);
        }
        if let Some(due) = self.profiler.next_due_us() {
            t = t.min(due);
        } else if self.homing.is_active() {
            if let Some(ready) = self.homing_ready_at() {
                t = t.min(ready);
            }
        }
        t
    }

    fn homing_ready_at(&self) -> Option<u64> {
        self.homing
            .selected()
            .indices()
            .map(|i| self.axes[i].settled_at_us(self.settle_us))
            .try_fold(0, |acc, t| t.map(|t| acc.max(t)))
    }

    fn drain_serial(&mut self, now_ms: u64) {
        while let Some(byte) = self.link.read_byte() {
            self.supervisor.note_activity(now_ms);
            if !self.rx.push_byte(byte) {
                trace!(dropped = self.rx.dropped(), "receive ring full");
            }
        }
    }

    /// Dispatch received lines, or queue them while an operation runs.
    ///
    /// Intake never stalls on a busy controller: an `emergency` line
    /// pre-empts the operation as soon as it is read, and a line that
    /// finds the queue full is answered `ERROR: Busy`. Lines queued ahead
    /// of an `emergency` are answered after its `COMPLETE`, and are then
    /// rejected by the latch like any other request.
    fn service_lines(&mut self, now_us: u64) {
        loop {
            let busy = self.supervisor.is_busy();
            if !busy {
                if let Some(line) = self.pending.pop_front() {
                    self.dispatch(line, now_us);
                    continue;
                }
            }

            let Some(line) = self.rx.next_line() else {
                break;
            };
            if !busy {
                self.dispatch(line, now_us);
            } else if matches!(&line, RxLine::Ready(text) if CommandName::is_emergency_line(text)) {
                self.preempt_emergency(now_us);
            } else if let Err(line) = self.pending.push_back(line) {
                self.refuse_busy(line);
            } else {
                debug!(queued = self.pending.len(), "line queued while busy");
            }
        }
    }

    /// Answer a line that arrived with the queue full.
    fn refuse_busy(&mut self, line: RxLine) {
        match line {
            RxLine::Overflow => self.fail(ErrorKind::BufferOverflow),
            RxLine::Ready(text) => {
                let Some(head) = text.split_ascii_whitespace().next() else {
                    return;
                };
                if CommandName::lookup(head).is_none() {
                    self.fail(ErrorKind::UnknownCommand);
                    return;
                }
                Responder::new(&mut self.link).received();
                self.fail(ErrorKind::Busy);
            }
        }
    }

    fn tick_operation(&mut self, now_us: u64) {
        let Some(op) = self.active else {
            return;
        };
        match op {
            ActiveOp::Move { targets } => {
                let tick = self.profiler.tick(&mut self.axes, &mut self.pins, now_us);
                if matches!(tick, ProfileTick::Finished | ProfileTick::Idle) {
                    self.active = None;
                    self.finish_move(&targets, now_us);
                }
            }
            ActiveOp::Homing => {
                let result =
                    self.homing
                        .tick(&mut self.axes, &mut self.profiler, &mut self.pins, now_us);
                let faults = self.homing.take_new_faults();
                let mut out = Responder::new(&mut self.link);
                for i in faults.indices() {
                    out.fmt(format_args!("WARN: endstop still triggered on axis {i}"));
                }
                match result {
                    HomingTickResult::InProgress => {}
                    HomingTickResult::Finished(report) => {
                        self.active = None;
                        self.finish_homing(&report, now_us);
                    }
                    HomingTickResult::Failed { reason } => {
                        error!(?reason, "homing failed");
                        self.latch_emergency(EmergencyCause::Timeout, now_us);
                    }
                }
            }
            ActiveOp::Stopping => {
                let tick = self.profiler.tick(&mut self.axes, &mut self.pins, now_us);
                if matches!(tick, ProfileTick::Finished | ProfileTick::Idle) {
                    self.active = None;
                    power::shutdown(&mut self.axes, &mut self.pins, now_us);
                }
            }
        }
    }

    fn safety_pass(&mut self, now_us: u64) {
        match self.supervisor.safety_check(now_us / 1_000) {
            SafetyVerdict::Clear => {}
            SafetyVerdict::Timeout(kind) => {
                error!(?kind, "operation timeout");
                self.latch_emergency(EmergencyCause::Timeout, now_us);
            }
            SafetyVerdict::WatchdogExpired => {
                self.latch_emergency(EmergencyCause::Watchdog, now_us);
                Responder::new(&mut self.link).line("AUTO-SHUTDOWN: no host activity");
            }
        }
    }

    // ─── Emergency ──────────────────────────────────────────────────

    /// Latch emergency, end the running operation and cut motor power.
    fn latch_emergency(&mut self, cause: EmergencyCause, now_us: u64) {
        self.supervisor
            .handle_event(SupervisorEvent::Emergency(cause), now_us / 1_000);
        self.homing.reset();

        let interrupted = self.active.take();
        if matches!(interrupted, Some(ActiveOp::Move { .. } | ActiveOp::Homing)) {
            Responder::new(&mut self.link).error(cause.error_kind());
        }
        let mode = match interrupted {
            Some(ActiveOp::Stopping) => StopMode::Brake,
            _ => cause.stop_mode(),
        };
        self.profiler.stop(mode);

        if self.profiler.is_running() {
            self.active = Some(ActiveOp::Stopping);
        } else {
            power::shutdown(&mut self.axes, &mut self.pins, now_us);
        }
        warn!(?cause, position = ?self.positions(), "EMERGENCY STOP");
    }

    /// `emergency` received while an operation runs.
    fn preempt_emergency(&mut self, now_us: u64) {
        self.latch_emergency(EmergencyCause::UserRequest, now_us);
        let mut out = Responder::new(&mut self.link);
        out.received();
        out.line("emergency stop latched");
        self.complete();
    }

    fn positions(&self) -> [i32; NUM_MOTORS] {
        core::array::from_fn(|i| self.axes[i].position())
    }

    // ─── Dispatch ───────────────────────────────────────────────────

    fn dispatch(&mut self, line: RxLine, now_us: u64) {
        let text = match line {
            RxLine::Overflow => {
                warn!("command line overflow");
                self.fail(ErrorKind::BufferOverflow);
                return;
            }
            RxLine::Ready(text) => text,
        };
        debug!(line = %text, "command");

        let mut tokens = text.split_ascii_whitespace();
        let Some(head) = tokens.next() else {
            return;
        };
        let Some(name) = CommandName::lookup(head) else {
            self.fail(ErrorKind::UnknownCommand);
            return;
        };
        Responder::new(&mut self.link).received();

        if self.supervisor.is_emergency() && name != CommandName::Reset {
            self.fail(ErrorKind::EmergencyStop);
            return;
        }
        match Command::parse(name, tokens) {
            Ok(cmd) => self.execute(cmd, now_us),
            Err(kind) => self.fail(kind),
        }
    }

    fn execute(&mut self, cmd: Command, now_us: u64) {
        let result = match cmd {
            Command::Move { targets } => self.start_move(&targets, now_us),
            Command::Home { selected } => self.start_home(&selected, now_us),
            Command::ClampHome => self.start_clamp_home(now_us),
            Command::PinOn(index) => self.set_control(index, Level::High),
            Command::PinOff(index) => self.set_control(index, Level::Low),
            Command::Status => {
                self.report_status(now_us);
                Ok(Reply::Complete)
            }
            Command::Emergency => {
                self.latch_emergency(EmergencyCause::UserRequest, now_us);
                Responder::new(&mut self.link).line("emergency stop latched");
                Ok(Reply::Complete)
            }
            Command::Reset => Ok(self.reset(now_us)),
            Command::Enable => {
                power::set_all(&mut self.axes, &mut self.pins, true, now_us);
                Responder::new(&mut self.link).line("motors enabled");
                Ok(Reply::Complete)
            }
            Command::Disable => {
                let refused = power::set_all(&mut self.axes, &mut self.pins, false, now_us);
                let mut out = Responder::new(&mut self.link);
                for i in refused.indices() {
                    out.fmt(format_args!("axis {i} is always on; left enabled"));
                }
                out.line("motors disabled");
                Ok(Reply::Complete)
            }
            Command::Help => {
                let mut out = Responder::new(&mut self.link);
                for line in HELP_LINES {
                    out.line(line);
                }
                Ok(Reply::Complete)
            }
            Command::Version => {
                Responder::new(&mut self.link)
                    .fmt(format_args!("{FIRMWARE_NAME} {}", env!("CARGO_PKG_VERSION")));
                Ok(Reply::Complete)
            }
            Command::Endstops => {
                self.report_endstops();
                Ok(Reply::Complete)
            }
            Command::Waste => {
                let level = self.aux.read_waste(&mut self.pins);
                Responder::new(&mut self.link).fmt(format_args!("waste: {}", level.label()));
                Ok(Reply::Complete)
            }
            Command::Rotor => {
                let bits = self.aux.read_rotor(&mut self.pins);
                Responder::new(&mut self.link).fmt(format_args!("rotor: {bits}"));
                Ok(Reply::Complete)
            }
            Command::LoadCell => self.aux.read_load_cell_raw(&mut self.pins).map(|raw| {
                Responder::new(&mut self.link).fmt(format_args!("loadcell raw: {raw}"));
                Reply::Complete
            }),
            Command::Test => {
                Responder::new(&mut self.link).line("Test command successful!");
                Ok(Reply::Complete)
            }
        };

        match result {
            Ok(Reply::Complete) => self.complete(),
            Ok(Reply::Deferred) => {}
            Err(kind) => self.fail(kind),
        }
    }

    fn complete(&mut self) {
        Responder::new(&mut self.link).complete();
        self.supervisor.note_activity(self.clock.now_ms());
    }

    fn fail(&mut self, kind: ErrorKind) {
        match kind.category() {
            ErrorCategory::Parse | ErrorCategory::Validation => debug!(%kind, "request rejected"),
            ErrorCategory::Operation | ErrorCategory::Safety => warn!(%kind, "request failed"),
        }
        Responder::new(&mut self.link).error(kind);
        self.supervisor.set_last_error(kind);
        self.supervisor.note_activity(self.clock.now_ms());
    }

    // ─── Motion ─────────────────────────────────────────────────────

    fn start_move(&mut self, targets: &[Option<f32>; NUM_MOTORS], now_us: u64) -> Result<Reply, ErrorKind> {
        let mut steps = [None; NUM_MOTORS];
        for (i, target) in targets.iter().enumerate() {
            if let Some(units) = *target {
                let cfg = self.axes[i].config();
                if !cfg.accepts_target(units) {
                    debug!(axis = i, units, "target outside envelope");
                    return Err(ErrorKind::InvalidPosition);
                }
                steps[i] = Some(cfg.units_to_steps(units));
            }
        }

        let moving = AxisMask::from_flags(&core::array::from_fn(|i| {
            steps[i].is_some_and(|s| s != self.axes[i].position())
        }));
        if moving.is_empty() {
            Responder::new(&mut self.link).line("no movement");
            return Ok(Reply::Complete);
        }
        let participants = AxisMask::from_flags(&steps.map(|s| s.is_some()));

        if let SupervisorTransition::Rejected(kind) = self
            .supervisor
            .handle_event(SupervisorEvent::BeginMove, now_us / 1_000)
        {
            return Err(kind);
        }
        let ready = power::power_up(&mut self.axes, &mut self.pins, participants, self.settle_us, now_us);
        let start_at = ready.max(now_us + u64::from(self.dir_setup_us));
        let limits: [AxisLimits; NUM_MOTORS] =
            core::array::from_fn(|i| AxisLimits::travel(self.axes[i].config()));

        match self
            .profiler
            .start(&mut self.axes, &mut self.pins, &steps, &limits, start_at)
        {
            StartOutcome::Started(plan) => {
                info!(
                    axes = ?moving,
                    lead = plan.lead,
                    steps = plan.lead_steps,
                    rate = plan.cruise_rate,
                    "move started"
                );
                self.active = Some(ActiveOp::Move { targets: steps });
                Ok(Reply::Deferred)
            }
            StartOutcome::NoMovement => {
                self.supervisor
                    .handle_event(SupervisorEvent::OperationDone, now_us / 1_000);
                Ok(Reply::Complete)
            }
        }
    }

    fn finish_move(&mut self, targets: &[Option<i32>; NUM_MOTORS], now_us: u64) {
        self.supervisor
            .handle_event(SupervisorEvent::OperationDone, now_us / 1_000);

        let missed = (0..NUM_MOTORS)
            .find(|&i| targets[i].is_some_and(|t| t != self.axes[i].position()));
        if let Some(axis) = missed {
            error!(axis, target = ?targets[axis], position = self.axes[axis].position(), "move ended off target");
            self.latch_emergency(EmergencyCause::ProfilerFault, now_us);
            self.fail(ErrorKind::EmergencyStop);
            return;
        }

        let mut out = Responder::new(&mut self.link);
        for (i, axis) in self.axes.iter().enumerate() {
            if targets[i].is_some() {
                out.fmt(format_args!("position {i}: {:.2}", axis.position_units()));
            }
        }
        info!(position = ?self.positions(), "move complete");
        self.complete();
    }

    // ─── Homing ─────────────────────────────────────────────────────

    fn start_home(&mut self, selected: &[bool; NUM_MOTORS], now_us: u64) -> Result<Reply, ErrorKind> {
        let requested = AxisMask::from_flags(selected);
        let mask = requested & AxisMask::PER_AXIS_HOMING;
        let ignored = requested & !AxisMask::PER_AXIS_HOMING;
        {
            let mut out = Responder::new(&mut self.link);
            for i in ignored.indices() {
                out.fmt(format_args!("axis {i} ignored; use clamph"));
            }
        }
        if mask.is_empty() {
            Responder::new(&mut self.link).line("no axes selected");
            return Ok(Reply::Complete);
        }
        self.begin_homing(HomingMode::PerAxis, mask, now_us)
    }

    fn start_clamp_home(&mut self, now_us: u64) -> Result<Reply, ErrorKind> {
        let pair = self.clamp_pair;
        let mask = AxisMask::single(pair[0]) | AxisMask::single(pair[1]);
        self.begin_homing(HomingMode::Clamp { pair }, mask, now_us)
    }

    fn begin_homing(&mut self, mode: HomingMode, mask: AxisMask, now_us: u64) -> Result<Reply, ErrorKind> {
        if let SupervisorTransition::Rejected(kind) = self
            .supervisor
            .handle_event(SupervisorEvent::BeginHoming, now_us / 1_000)
        {
            return Err(kind);
        }
        power::power_up(&mut self.axes, &mut self.pins, mask, self.settle_us, now_us);
        self.homing.start(mode, mask);
        self.active = Some(ActiveOp::Homing);
        Ok(Reply::Deferred)
    }

    fn finish_homing(&mut self, report: &HomingReport, now_us: u64) {
        self.supervisor
            .handle_event(SupervisorEvent::OperationDone, now_us / 1_000);

        let mut out = Responder::new(&mut self.link);
        for i in report.homed.indices() {
            match report.trigger_positions[i] {
                Some(at) => out.fmt(format_args!("axis {i} homed (endstop at {at} steps)")),
                None => out.fmt(format_args!("axis {i} homed")),
            }
        }
        for i in report.missing.indices() {
            out.fmt(format_args!("axis {i}: endstop not found"));
        }

        if report.missing.is_empty() {
            self.complete();
        } else {
            self.fail(ErrorKind::EndstopNotFound);
        }
    }

    // ─── Other Commands ─────────────────────────────────────────────

    fn reset(&mut self, now_us: u64) -> Reply {
        if !self.supervisor.is_emergency() {
            Responder::new(&mut self.link).line("no emergency latched");
            return Reply::Complete;
        }
        if self.active == Some(ActiveOp::Stopping) {
            self.profiler.stop(StopMode::Brake);
            self.active = None;
            power::shutdown(&mut self.axes, &mut self.pins, now_us);
        }
        self.supervisor
            .handle_event(SupervisorEvent::Reset, now_us / 1_000);
        power::restore(&mut self.axes, &mut self.pins, now_us);
        Responder::new(&mut self.link).line("emergency cleared");
        Reply::Complete
    }

    fn set_control(&mut self, index: usize, level: Level) -> Result<Reply, ErrorKind> {
        let control = self.aux.set_control(&mut self.pins, index, level)?;
        Responder::new(&mut self.link).fmt(format_args!(
            "pin {index} ({}) {}",
            control.name,
            level.label()
        ));
        Ok(Reply::Complete)
    }

    fn report_status(&mut self, now_us: u64) {
        let mut out = Responder::new(&mut self.link);
        for axis in &self.axes {
            let endstop = match axis.endstop_reading(&mut self.pins, now_us, self.settle_us) {
                Some(true) => "TRIGGERED",
                Some(false) => "OPEN",
                None => "UNSETTLED",
            };
            out.fmt(format_args!(
                "axis {}: {:.2} units ({} steps) {} enabled={} endstop={}",
                axis.index(),
                axis.position_units(),
                axis.position(),
                axis.config().name,
                axis.is_enabled(),
                endstop
            ));
        }
        out.fmt(format_args!("state={}", self.supervisor.phase()));
        out.fmt(format_args!("emergency={}", self.supervisor.is_emergency()));
        match self.supervisor.last_error() {
            Some(kind) => out.fmt(format_args!("last_error={kind}")),
            None => out.line("last_error=none"),
        }
    }

    fn report_endstops(&mut self) {
        let mut out = Responder::new(&mut self.link);
        for axis in &self.axes {
            let state = if axis.endstop_triggered(&mut self.pins) {
                "TRIGGERED"
            } else {
                "OPEN"
            };
            out.fmt(format_args!(
                "endstop {} ({}): {} [{}]",
                axis.index(),
                axis.config().name,
                state,
                axis.config().endstop_polarity.label()
            ));
        }
    }
}
