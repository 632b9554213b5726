//! Integration test: homing procedure edge cases.
//!
//! Covers the escape phase, sensor faults, unreachable endstops, the
//! pre-home backoff, phase timeouts and axis selection rules.

use lmc_common::error::ErrorKind;
use lmc_common::hal::PinId;
use lmc_common::machine::MachineConfig;
use lmc_controller::supervisor::SupervisorPhase;

use super::common::{Rig, START_OFFSET, status_line};

// ── Helpers ─────────────────────────────────────────────────────────

const X_ENDSTOP_PIN: PinId = 14;

fn x_backoff(rig: &Rig) -> i64 {
    i64::from(rig.ctrl.axis(0).config().home_backoff)
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn triggered_endstop_escapes_before_seek() {
    let mut rig = Rig::with_offset(MachineConfig::default(), 0);
    let lines = rig.send("home 1 0 0 0 0");

    // Escape +500, then seek back down to the trigger point.
    assert_eq!(
        lines,
        ["RECEIVED", "axis 0 homed (endstop at 0 steps)", "COMPLETE"]
    );
    assert_eq!(rig.ctrl.axis(0).position(), 0);
    assert_eq!(rig.board().axis(0).position, x_backoff(&rig));
}

#[test]
fn homing_twice_lands_on_the_same_origin() {
    let mut rig = Rig::new();
    let first = format!("axis 0 homed (endstop at {} steps)", -START_OFFSET);
    assert_eq!(
        rig.send("home 1 0 0 0 0"),
        ["RECEIVED", first.as_str(), "COMPLETE"]
    );
    assert_eq!(rig.ctrl.axis(0).position(), 0);
    let origin = rig.board().axis(0).position;

    // Second run starts from the backoff point.
    let second = format!("axis 0 homed (endstop at {} steps)", -x_backoff(&rig));
    assert_eq!(
        rig.send("home 1 0 0 0 0"),
        ["RECEIVED", second.as_str(), "COMPLETE"]
    );
    assert_eq!(rig.ctrl.axis(0).position(), 0);
    assert_eq!(rig.board().axis(0).position, origin);
}

#[test]
fn stuck_endstop_is_reported() {
    let mut rig = Rig::new();
    rig.board_mut()
        .endstop_mut(X_ENDSTOP_PIN)
        .expect("X endstop")
        .stuck = Some(true);

    let lines = rig.send("home 1 0 0 0 0");
    assert_eq!(
        lines,
        [
            "RECEIVED",
            "WARN: endstop still triggered on axis 0",
            "axis 0 homed (endstop at 500 steps)",
            "COMPLETE"
        ]
    );
}

#[test]
fn unreachable_endstop_reports_missing_axis() {
    let mut config = MachineConfig::default();
    config.axes[0].max_seek_steps = 300;
    let mut rig = Rig::with_config(config);

    let lines = rig.send("home 1 0 0 0 0");
    assert_eq!(
        lines,
        ["RECEIVED", "axis 0: endstop not found", "ERROR: EndstopNotFound"]
    );
    // Not zeroed, no backoff.
    assert_eq!(rig.ctrl.axis(0).position(), -300);
    assert_eq!(rig.board().axis(0).position, START_OFFSET - 300);
    assert!(!rig.ctrl.supervisor().is_emergency());

    let status = rig.send("status");
    assert!(status.iter().any(|l| l == "last_error=EndstopNotFound"));
    assert!(status.iter().any(|l| l == "state=Idle"));
}

#[test]
fn pre_home_backoff_runs_first() {
    let mut config = MachineConfig::default();
    config.axes[0].pre_home_backoff = 100;
    let mut rig = Rig::with_config(config);

    let lines = rig.send("home 1 0 0 0 0");
    let trigger = format!("axis 0 homed (endstop at {} steps)", -START_OFFSET);
    assert_eq!(lines, ["RECEIVED", trigger.as_str(), "COMPLETE"]);

    // 100 up, 900 down to the trigger, 200 back off.
    assert_eq!(rig.board().axis(0).pulse_times.len(), 1_200);
    assert_eq!(rig.board().axis(0).position, x_backoff(&rig));
    assert_eq!(rig.ctrl.axis(0).position(), 0);
}

#[test]
fn homing_timeout_latches_emergency() {
    let mut config = MachineConfig::default();
    config.supervisor.homing_timeout_ms = 200;
    let mut rig = Rig::with_config(config);

    // Y homes at 400 steps/s; 800 steps cannot finish in 200 ms.
    let lines = rig.send("home 0 1 0 0 0");
    assert_eq!(lines, ["RECEIVED", "ERROR: Timeout"]);
    assert!(rig.ctrl.supervisor().is_emergency());
    assert!(!rig.ctrl.profiler().is_running());
    assert!(!rig.board().is_energized(1));

    assert_eq!(rig.ctrl.supervisor().phase(), SupervisorPhase::EmergencyLatched);
    assert_eq!(rig.ctrl.supervisor().last_error(), Some(ErrorKind::Timeout));

    // Only reset is served while latched.
    assert_eq!(rig.send("status"), ["RECEIVED", "ERROR: EmergencyStop"]);
    rig.send("reset");
    let status = rig.send("status");
    assert!(status_line(&status, 1).contains("enabled=true"));
    assert!(status.iter().any(|l| l == "last_error=EmergencyStop"));
}

#[test]
fn shared_endstop_axis_needs_clamp_home() {
    let mut rig = Rig::new();
    let lines = rig.send("home 0 0 0 0 1");

    assert_eq!(
        lines,
        [
            "RECEIVED",
            "axis 4 ignored; use clamph",
            "no axes selected",
            "COMPLETE"
        ]
    );
    assert_eq!(rig.board().axis(4).net_pulses, 0);
}

#[test]
fn move_queued_during_homing_runs_after() {
    let mut rig = Rig::new();
    rig.feed("home 1 0 0 0 0\nmove 1 * * * *\n");
    let lines = rig.collect_terminals(2);

    let trigger = format!("axis 0 homed (endstop at {} steps)", -START_OFFSET);
    assert_eq!(
        lines,
        [
            "RECEIVED",
            trigger.as_str(),
            "COMPLETE",
            "RECEIVED",
            "position 0: 1.00",
            "COMPLETE"
        ]
    );
    // 80 steps/unit on the default X axis.
    assert_eq!(rig.ctrl.axis(0).position(), 80);
    assert_eq!(rig.board().axis(0).position, x_backoff(&rig) + 80);
}
