//! Integration test: end-to-end host sessions.
//!
//! Each test is one short conversation with the controller on the
//! simulated machine (axis 0 at 40 steps/unit, envelopes ±200 units):
//! 1. Power-up status
//! 2. Simple move
//! 3. Out-of-envelope target
//! 4. Homing a single axis
//! 5. Clamp-home on the shared endstop
//! 6. Emergency during a move, then reset

use super::common::{Rig, START_OFFSET, scenario_config, status_line};

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn power_up_status() {
    let mut rig = Rig::with_config(scenario_config());
    let lines = rig.send("status");

    assert_eq!(lines.first().map(String::as_str), Some("RECEIVED"));
    for axis in 0..5 {
        let line = status_line(&lines, axis);
        assert!(
            line.starts_with(&format!("axis {axis}: 0.00 units (0 steps)")),
            "{line}"
        );
        let always_on = axis < 3;
        assert!(line.contains(&format!("enabled={always_on}")), "{line}");
    }
    assert!(lines.iter().any(|l| l == "state=Idle"));
    assert!(lines.iter().any(|l| l == "emergency=false"));
    assert!(lines.iter().any(|l| l == "last_error=none"));
    assert_eq!(lines.last().map(String::as_str), Some("COMPLETE"));
}

#[test]
fn simple_move() {
    let mut rig = Rig::with_config(scenario_config());
    let lines = rig.send("move 10 * * * *");

    assert_eq!(lines, ["RECEIVED", "position 0: 10.00", "COMPLETE"]);
    assert_eq!(rig.board().axis(0).net_pulses, 400);
    assert_eq!(rig.board().axis(0).position, START_OFFSET + 400);
    assert_eq!(rig.board().axis(0).pulses_while_disabled, 0);
    for axis in 1..5 {
        assert_eq!(rig.board().axis(axis).net_pulses, 0, "axis {axis}");
    }

    let status = rig.send("status");
    assert!(status_line(&status, 0).starts_with("axis 0: 10.00 units (400 steps)"));
}

#[test]
fn out_of_envelope_target_rejected() {
    let mut rig = Rig::with_config(scenario_config());
    let lines = rig.send("move 250 * * * *");

    assert_eq!(lines, ["RECEIVED", "ERROR: InvalidPosition"]);
    assert_eq!(rig.ctrl.axis(0).position(), 0);
    assert_eq!(rig.board().axis(0).net_pulses, 0);
    assert!(!rig.ctrl.supervisor().is_busy());
}

#[test]
fn homing_single_axis() {
    let mut rig = Rig::with_config(scenario_config());
    let lines = rig.send("home 1 0 0 0 0");

    let trigger = format!("axis 0 homed (endstop at {} steps)", -START_OFFSET);
    assert_eq!(lines, ["RECEIVED", trigger.as_str(), "COMPLETE"]);

    // Seek stopped on the trigger point, then backed off.
    let backoff = i64::from(rig.ctrl.axis(0).config().home_backoff);
    assert_eq!(rig.ctrl.axis(0).position(), 0);
    assert_eq!(rig.board().axis(0).position, backoff);
    assert_eq!(rig.board().axis(0).net_pulses, backoff - START_OFFSET);

    for axis in 1..5 {
        assert_eq!(rig.ctrl.axis(axis).position(), 0, "axis {axis}");
        assert_eq!(rig.board().axis(axis).net_pulses, 0, "axis {axis}");
    }
}

#[test]
fn clamp_home_shared_endstop() {
    let mut rig = Rig::with_config(scenario_config());
    let lines = rig.send("clamph");

    let e0 = format!("axis 3 homed (endstop at {} steps)", -START_OFFSET);
    let e1 = format!("axis 4 homed (endstop at {} steps)", -START_OFFSET);
    assert_eq!(lines, ["RECEIVED", e0.as_str(), e1.as_str(), "COMPLETE"]);

    // Lockstep: identical pulse trains, identical backoff.
    let (a, b) = (rig.board().axis(3), rig.board().axis(4));
    assert_eq!(a.net_pulses, b.net_pulses);
    assert_eq!(a.position, b.position);
    assert_eq!(a.pulse_times, b.pulse_times);
    assert_eq!(a.position, i64::from(rig.ctrl.axis(3).config().home_backoff));

    assert_eq!(rig.ctrl.axis(3).position(), 0);
    assert_eq!(rig.ctrl.axis(4).position(), 0);
    for axis in 0..3 {
        assert_eq!(rig.board().axis(axis).net_pulses, 0, "axis {axis}");
    }
}

#[test]
fn emergency_during_move() {
    let mut rig = Rig::with_config(scenario_config());
    rig.feed("move 100 100 0 0 0\n");
    let started = rig.run_until(|rig| rig.board().axis(0).net_pulses >= 50);
    assert_eq!(started, ["RECEIVED"]);

    let lines = rig.send("emergency");
    assert_eq!(
        lines,
        [
            "ERROR: EmergencyStop",
            "RECEIVED",
            "emergency stop latched",
            "COMPLETE"
        ]
    );

    // Braked: nothing more is emitted, counters match emitted pulses.
    let emitted: Vec<i64> = (0..5).map(|i| rig.board().axis(i).net_pulses).collect();
    rig.run_for_ms(50);
    for axis in 0..5 {
        assert_eq!(rig.board().axis(axis).net_pulses, emitted[axis], "axis {axis}");
        assert_eq!(
            i64::from(rig.ctrl.axis(axis).position()),
            emitted[axis],
            "axis {axis}"
        );
        assert!(!rig.board().is_energized(axis), "axis {axis}");
    }
    assert!(emitted[0] < 4_000);

    let rejected = rig.send("move 0 0 0 0 0");
    assert_eq!(rejected, ["RECEIVED", "ERROR: EmergencyStop"]);

    let reset = rig.send("reset");
    assert_eq!(reset, ["RECEIVED", "emergency cleared", "COMPLETE"]);
    assert!(rig.board().is_energized(0));

    let lines = rig.send("move 100 100 0 0 0");
    assert_eq!(lines.first().map(String::as_str), Some("RECEIVED"));
    assert!(lines.iter().any(|l| l == "position 0: 100.00"));
    assert!(lines.iter().any(|l| l == "position 1: 100.00"));
    assert_eq!(lines.last().map(String::as_str), Some("COMPLETE"));
    assert_eq!(rig.ctrl.axis(0).position(), 4_000);
    assert_eq!(rig.ctrl.axis(1).position(), 8_000);
}
