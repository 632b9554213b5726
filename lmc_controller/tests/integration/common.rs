//! Test rig: a controller on the simulated board, stepped in simulated
//! time.

use lmc_common::hal::Clock;
use lmc_common::machine::MachineConfig;
use lmc_controller::Controller;
use lmc_hal::{SimBoard, SimClock, SimLink};

/// Initial distance of every carriage above its endstop [steps].
pub const START_OFFSET: i64 = 800;

/// Upper bound on main-loop passes per request.
const MAX_POLLS: usize = 1_000_000;

pub struct Rig {
    pub ctrl: Controller<SimBoard, SimClock, SimLink>,
    pub clock: SimClock,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(MachineConfig::default())
    }

    pub fn with_config(config: MachineConfig) -> Self {
        Self::with_offset(config, START_OFFSET)
    }

    pub fn with_offset(config: MachineConfig, offset: i64) -> Self {
        let clock = SimClock::new();
        let board = SimBoard::from_config(&config, clock.clone(), offset);
        let ctrl = Controller::new(config, board, clock.clone(), SimLink::new())
            .expect("valid configuration");
        Self { ctrl, clock }
    }

    pub fn board(&self) -> &SimBoard {
        self.ctrl.pins()
    }

    pub fn board_mut(&mut self) -> &mut SimBoard {
        self.ctrl.pins_mut()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Queue host bytes without polling.
    pub fn feed(&mut self, text: &str) {
        self.ctrl.link_mut().feed(text);
    }

    /// One main-loop pass, then jump to the next due time.
    pub fn step(&mut self) -> Vec<String> {
        self.ctrl.poll();
        let now = self.clock.now_us();
        self.clock.advance_to(self.ctrl.next_wakeup_us().max(now + 1));
        self.ctrl.link_mut().take_lines()
    }

    /// Send one line and run until its terminal line arrives.
    pub fn send(&mut self, line: &str) -> Vec<String> {
        self.feed(line);
        self.feed("\n");
        self.collect_terminals(1)
    }

    /// Run until `n` terminal lines have been written.
    pub fn collect_terminals(&mut self, n: usize) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..MAX_POLLS {
            out.extend(self.step());
            if out.iter().filter(|l| is_terminal(l)).count() >= n {
                return out;
            }
        }
        panic!("no terminal line after {MAX_POLLS} polls; output so far: {out:?}");
    }

    /// Step until `done` holds.
    pub fn run_until(&mut self, mut done: impl FnMut(&Self) -> bool) -> Vec<String> {
        let mut out = Vec::new();
        for _ in 0..MAX_POLLS {
            if done(self) {
                return out;
            }
            out.extend(self.step());
        }
        panic!("condition not reached after {MAX_POLLS} polls; output so far: {out:?}");
    }

    /// Step until simulated time has advanced by `ms`.
    pub fn run_for_ms(&mut self, ms: u64) -> Vec<String> {
        let until = self.clock.now_us() + ms * 1_000;
        self.run_until(|rig| rig.clock.now_us() >= until)
    }
}

pub fn is_terminal(line: &str) -> bool {
    line == "COMPLETE" || line.starts_with("ERROR: ")
}

/// Default machine with axis 0 at 40 steps per unit.
pub fn scenario_config() -> MachineConfig {
    let mut config = MachineConfig::default();
    config.axes[0].steps_per_unit = 40.0;
    config
}

/// The status line of `axis`, from a `status` reply.
pub fn status_line(lines: &[String], axis: usize) -> &str {
    let prefix = format!("axis {axis}: ");
    lines
        .iter()
        .find(|l| l.starts_with(&prefix))
        .map(String::as_str)
        .unwrap_or_else(|| panic!("no status line for axis {axis} in {lines:?}"))
}
