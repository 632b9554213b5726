//! Integration test: line protocol.
//!
//! Framing, parsing and the reply of every non-motion command, plus the
//! envelope edges of `move`.

use lmc_common::hal::{Level, PinId};
use lmc_common::machine::MachineConfig;
use lmc_controller::protocol::line::MAX_LINE_BYTES;

use super::common::Rig;

// ── Helpers ─────────────────────────────────────────────────────────

const WASTE_PIN: PinId = 19;
const ROTOR_PIN_0: PinId = 23;
const PUMP_PIN: PinId = 18;

fn padded(command: &str, len: usize) -> String {
    format!("{command:<len$}")
}

// ── Framing ─────────────────────────────────────────────────────────

#[test]
fn unknown_command_has_no_received() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("frobnicate 1 2"), ["ERROR: UnknownCommand"]);
}

#[test]
fn longest_line_accepted() {
    let mut rig = Rig::new();
    let line = padded("test", MAX_LINE_BYTES);
    assert_eq!(line.len(), 63);
    assert_eq!(
        rig.send(&line),
        ["RECEIVED", "Test command successful!", "COMPLETE"]
    );
}

#[test]
fn overlong_line_reports_overflow_once() {
    let mut rig = Rig::new();
    let line = padded("test", MAX_LINE_BYTES + 1);
    assert_eq!(rig.send(&line), ["ERROR: BufferOverflow"]);

    // The next line is unaffected.
    assert_eq!(
        rig.send("test"),
        ["RECEIVED", "Test command successful!", "COMPLETE"]
    );
    let status = rig.send("status");
    assert!(status.iter().any(|l| l == "last_error=BufferOverflow"));
}

#[test]
fn empty_lines_are_ignored() {
    let mut rig = Rig::new();
    rig.feed("\r\n\n  \n");
    assert!(rig.run_for_ms(10).is_empty());
}

#[test]
fn tabs_crlf_and_case() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("SM\t1\t*\t*\t*\t*\r"),
        ["RECEIVED", "position 0: 1.00", "COMPLETE"]
    );
    assert_eq!(rig.ctrl.axis(0).position(), 80);
}

#[test]
fn lines_in_one_chunk_answered_in_order() {
    let mut rig = Rig::new();
    rig.feed("test\nversion\n");
    let lines = rig.collect_terminals(2);
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[1], "Test command successful!");
    assert!(lines[4].starts_with("lmc_controller "));
}

// ── Parameters ──────────────────────────────────────────────────────

#[test]
fn move_arity_and_values() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("move 1 2"), ["RECEIVED", "ERROR: MissingParameter"]);
    assert_eq!(
        rig.send("move 1 2 3 4 5 6"),
        ["RECEIVED", "ERROR: InvalidParameter"]
    );
    assert_eq!(
        rig.send("move x * * * *"),
        ["RECEIVED", "ERROR: InvalidParameter"]
    );
    assert_eq!(rig.send("home 1 0 2 0 0"), ["RECEIVED", "ERROR: InvalidParameter"]);
    assert_eq!(rig.board().axis(0).net_pulses, 0);
}

#[test]
fn envelope_edges() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("move 200.01 * * * *"),
        ["RECEIVED", "ERROR: InvalidPosition"]
    );
    assert_eq!(
        rig.send("move * * -200.5 * *"),
        ["RECEIVED", "ERROR: InvalidPosition"]
    );
    assert_eq!(
        rig.send("move 200 * * * *"),
        ["RECEIVED", "position 0: 200.00", "COMPLETE"]
    );
    assert_eq!(rig.ctrl.axis(0).position(), 16_000);
    assert_eq!(rig.board().axis(0).net_pulses, 16_000);
}

#[test]
fn lower_envelope_edge_accepted() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("move -200 * * * *"),
        ["RECEIVED", "position 0: -200.00", "COMPLETE"]
    );
    assert_eq!(rig.ctrl.axis(0).position(), -16_000);
    assert_eq!(rig.board().axis(0).net_pulses, -16_000);
}

#[test]
fn non_finite_targets_rejected() {
    let mut rig = Rig::new();
    for cmd in ["move nan * * * *", "move * inf * * *", "move * * * -inf *"] {
        assert_eq!(
            rig.send(cmd),
            ["RECEIVED", "ERROR: InvalidPosition"],
            "{cmd}"
        );
    }
    for axis in 0..5 {
        assert_eq!(rig.board().axis(axis).net_pulses, 0, "axis {axis}");
    }
}

#[test]
fn all_skipped_move_touches_nothing() {
    let mut rig = Rig::new();
    rig.board_mut().clear_history();
    assert_eq!(
        rig.send("move * * * * *"),
        ["RECEIVED", "no movement", "COMPLETE"]
    );

    let config = MachineConfig::default();
    for (i, axis) in config.axes.iter().enumerate() {
        assert_eq!(rig.board().axis(i).net_pulses, 0, "axis {i}");
        assert_eq!(rig.board().writes_to(axis.enable_pin).count(), 0, "axis {i}");
    }
    assert_eq!(rig.ctrl.supervisor().power_down_at_ms(), None);
}

#[test]
fn zero_is_a_valid_target() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("move 0 * * * *"),
        ["RECEIVED", "no movement", "COMPLETE"]
    );
    assert!(!rig.ctrl.supervisor().is_busy());
}

// ── Auxiliary I/O ───────────────────────────────────────────────────

#[test]
fn control_pins() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("pon 0"),
        ["RECEIVED", "pin 0 (pump) HIGH", "COMPLETE"]
    );
    assert_eq!(rig.board().level(PUMP_PIN), Some(Level::High));

    assert_eq!(
        rig.send("poff 0"),
        ["RECEIVED", "pin 0 (pump) LOW", "COMPLETE"]
    );
    assert_eq!(rig.board().level(PUMP_PIN), Some(Level::Low));

    assert_eq!(rig.send("pin 1"), ["RECEIVED", "pin 1 (kl1) HIGH", "COMPLETE"]);
    assert_eq!(rig.send("pon 6"), ["RECEIVED", "ERROR: InvalidPin"]);
    assert_eq!(rig.send("pon -1"), ["RECEIVED", "ERROR: InvalidPin"]);
    assert_eq!(rig.send("pon"), ["RECEIVED", "ERROR: MissingParameter"]);
}

#[test]
fn input_reads() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("waste"), ["RECEIVED", "waste: HIGH", "COMPLETE"]);
    assert_eq!(rig.send("rotor"), ["RECEIVED", "rotor: 1111", "COMPLETE"]);

    rig.board_mut().set_input(WASTE_PIN, Level::Low);
    rig.board_mut().set_input(ROTOR_PIN_0, Level::Low);
    assert_eq!(rig.send("waste"), ["RECEIVED", "waste: LOW", "COMPLETE"]);
    assert_eq!(rig.send("rotor"), ["RECEIVED", "rotor: 0111", "COMPLETE"]);
}

#[test]
fn endstop_report() {
    let mut rig = Rig::new();
    let lines = rig.send("endstops");
    assert_eq!(lines.len(), 7);
    assert_eq!(lines[1], "endstop 0 (Multi(X)): OPEN [PNP]");
    assert_eq!(lines[2], "endstop 1 (Multizone(Y)): OPEN [NPN]");

    rig.board_mut().axis_mut(1).position = 0;
    let lines = rig.send("endstops");
    assert_eq!(lines[2], "endstop 1 (Multizone(Y)): TRIGGERED [NPN]");
}

#[test]
fn load_cell_sample() {
    let mut rig = Rig::new();
    rig.board_mut().load_cell_mut().expect("load cell").sample = -1234;
    assert_eq!(
        rig.send("loadcell"),
        ["RECEIVED", "loadcell raw: -1234", "COMPLETE"]
    );

    rig.board_mut().load_cell_mut().expect("load cell").ready = false;
    assert_eq!(rig.send("loadcell"), ["RECEIVED", "ERROR: Timeout"]);
    assert!(!rig.ctrl.supervisor().is_emergency());
}

// ── Informational ───────────────────────────────────────────────────

#[test]
fn help_and_version() {
    let mut rig = Rig::new();
    let help = rig.send("help");
    assert_eq!(help.first().map(String::as_str), Some("RECEIVED"));
    assert!(help.iter().any(|l| l.starts_with("move ")));
    assert!(help.iter().any(|l| l.starts_with("clamph")));
    assert_eq!(help.last().map(String::as_str), Some("COMPLETE"));

    let version = rig.send("version");
    assert_eq!(version.len(), 3);
    assert_eq!(
        version[1],
        format!("lmc_controller {}", env!("CARGO_PKG_VERSION"))
    );
}

#[test]
fn reset_without_latch() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("reset"),
        ["RECEIVED", "no emergency latched", "COMPLETE"]
    );
}

#[test]
fn status_waits_for_running_move() {
    let mut rig = Rig::new();
    rig.feed("move 10 * * * *\nstatus\n");
    let lines = rig.collect_terminals(2);

    let position = lines.iter().position(|l| l == "position 0: 10.00");
    let status = lines.iter().position(|l| l.starts_with("axis 0: "));
    assert!(position.is_some() && status > position, "{lines:?}");
    assert!(lines.iter().any(|l| l == "state=Idle"));
}

// ── Intake While Busy ───────────────────────────────────────────────

#[test]
fn full_queue_answers_busy() {
    let mut rig = Rig::new();
    rig.feed("move 100 * * * *\n");
    rig.run_until(|rig| rig.board().axis(0).net_pulses >= 50);

    rig.feed(&"status\n".repeat(4));
    rig.feed("test\n");
    assert_eq!(rig.step(), ["RECEIVED", "ERROR: Busy"]);

    // The move and the four queued requests still complete in order.
    let lines = rig.collect_terminals(5);
    assert_eq!(lines[0], "position 0: 100.00");
    assert_eq!(lines[1], "COMPLETE");
    assert_eq!(lines.iter().filter(|l| *l == "state=Idle").count(), 4);
    assert!(lines.iter().any(|l| l == "last_error=Busy"));
    assert_eq!(rig.board().axis(0).net_pulses, 8_000);
}
