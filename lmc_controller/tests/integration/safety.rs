//! Integration test: supervisor safety and motor power.
//!
//! Validates:
//! 1. Move timeout and host watchdog latch the emergency state, and an
//!    `emergency` line pre-empts a move even behind a full queue
//! 2. Watchdog expiry mid-move decelerates before power is cut
//! 3. `always_on` axes are never released outside an emergency
//! 4. Temporary axes are released after the idle delay
//! 5. Step counters equal emitted pulses; rates stay under `max_speed`

use lmc_common::error::ErrorKind;
use lmc_common::hal::Level;
use lmc_common::machine::MachineConfig;
use lmc_controller::supervisor::SupervisorPhase;

use super::common::Rig;

// ── Helpers ─────────────────────────────────────────────────────────

fn with_supervisor(f: impl FnOnce(&mut MachineConfig)) -> Rig {
    let mut config = MachineConfig::default();
    f(&mut config);
    Rig::with_config(config)
}

fn assert_counters_match_pulses(rig: &Rig) {
    for axis in 0..5 {
        let sim = rig.board().axis(axis);
        assert_eq!(
            i64::from(rig.ctrl.axis(axis).position()),
            sim.net_pulses,
            "axis {axis}"
        );
        assert_eq!(sim.pulses_while_disabled, 0, "axis {axis}");
    }
}

// ── Timeouts ────────────────────────────────────────────────────────

#[test]
fn move_timeout_latches_emergency() {
    let mut rig = with_supervisor(|c| c.supervisor.move_timeout_ms = 300);

    // 800 steps at 600 steps/s.
    let lines = rig.send("move * 10 * * *");
    assert_eq!(lines, ["RECEIVED", "ERROR: Timeout"]);

    let sup = rig.ctrl.supervisor();
    assert_eq!(sup.phase(), SupervisorPhase::EmergencyLatched);
    assert_eq!(sup.last_error(), Some(ErrorKind::Timeout));
    assert!(!rig.ctrl.profiler().is_running());
    assert!(rig.board().axis(1).net_pulses < 800);
    for axis in 0..5 {
        assert!(!rig.board().is_energized(axis), "axis {axis}");
    }
    assert_counters_match_pulses(&rig);
}

#[test]
fn watchdog_shuts_down_idle_controller() {
    let mut rig = with_supervisor(|c| c.supervisor.watchdog_timeout_ms = 1_000);

    let lines = rig.run_for_ms(1_200);
    assert_eq!(lines, ["AUTO-SHUTDOWN: no host activity"]);
    assert!(rig.ctrl.supervisor().is_emergency());
    for axis in 0..5 {
        assert!(!rig.board().is_energized(axis), "axis {axis}");
    }

    assert_eq!(
        rig.send("move 1 * * * *"),
        ["RECEIVED", "ERROR: EmergencyStop"]
    );
    assert_eq!(
        rig.send("reset"),
        ["RECEIVED", "emergency cleared", "COMPLETE"]
    );
    assert!(rig.board().is_energized(0));
    assert!(!rig.board().is_energized(3));
}

#[test]
fn host_traffic_keeps_watchdog_quiet() {
    let mut rig = with_supervisor(|c| c.supervisor.watchdog_timeout_ms = 1_000);

    for _ in 0..5 {
        assert!(rig.run_for_ms(500).is_empty());
        assert_eq!(
            rig.send("test"),
            ["RECEIVED", "Test command successful!", "COMPLETE"]
        );
    }
    assert!(!rig.ctrl.supervisor().is_emergency());
}

#[test]
fn watchdog_during_move_decelerates() {
    let mut rig = with_supervisor(|c| c.supervisor.watchdog_timeout_ms = 500);

    rig.feed("move * 100 * * *\n");
    let lines = rig.run_until(|rig| rig.ctrl.supervisor().is_emergency());
    assert_eq!(
        lines,
        [
            "RECEIVED",
            "ERROR: EmergencyStop",
            "AUTO-SHUTDOWN: no host activity"
        ]
    );

    // Still ramping down with power on.
    let at_latch = rig.board().axis(1).net_pulses;
    assert!(rig.ctrl.profiler().is_running());
    assert!(rig.board().is_energized(1));

    rig.run_until(|rig| !rig.ctrl.profiler().is_running());
    rig.step();
    assert!(rig.board().axis(1).net_pulses > at_latch);
    assert!(!rig.board().is_energized(1));
    assert!(!rig.board().is_energized(0));
    assert_counters_match_pulses(&rig);
}

#[test]
fn emergency_behind_full_queue_preempts_move() {
    let mut rig = Rig::new();
    rig.feed("move 100 * * * *\n");
    rig.run_until(|rig| rig.board().axis(0).net_pulses >= 50);

    rig.feed(&"status\n".repeat(4));
    rig.feed("emergency\n");
    let lines = rig.collect_terminals(6);
    let mut expected = vec![
        "ERROR: EmergencyStop",
        "RECEIVED",
        "emergency stop latched",
        "COMPLETE",
    ];
    // Queued requests are answered afterwards, under the latch.
    for _ in 0..4 {
        expected.extend(["RECEIVED", "ERROR: EmergencyStop"]);
    }
    assert_eq!(lines, expected);

    let stopped_at = rig.board().axis(0).net_pulses;
    rig.run_for_ms(50);
    assert_eq!(rig.board().axis(0).net_pulses, stopped_at);
    assert!(stopped_at < 8_000);
    assert!(!rig.board().is_energized(0));
    assert_counters_match_pulses(&rig);
}

#[test]
fn emergency_when_idle() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("emergency"),
        ["RECEIVED", "emergency stop latched", "COMPLETE"]
    );
    assert_eq!(rig.send("status"), ["RECEIVED", "ERROR: EmergencyStop"]);
    assert_eq!(rig.send("clamph"), ["RECEIVED", "ERROR: EmergencyStop"]);
    for axis in 0..5 {
        assert!(!rig.board().is_energized(axis), "axis {axis}");
    }
}

// ── Motor Power ─────────────────────────────────────────────────────

#[test]
fn always_on_axes_never_released() {
    let mut rig = Rig::new();
    rig.board_mut().clear_history();

    rig.send("move 10 5 3 1 1");
    let lines = rig.send("disable");
    assert_eq!(
        lines,
        [
            "RECEIVED",
            "axis 0 is always on; left enabled",
            "axis 1 is always on; left enabled",
            "axis 2 is always on; left enabled",
            "motors disabled",
            "COMPLETE"
        ]
    );
    rig.run_for_ms(500);

    let config = MachineConfig::default();
    for axis in &config.axes[..3] {
        let released = axis.enable_level(false);
        assert!(
            rig.board()
                .writes_to(axis.enable_pin)
                .all(|w| w.level != released),
            "{} released",
            axis.name
        );
    }
    for axis in 0..3 {
        assert!(rig.board().is_energized(axis));
    }
    assert!(!rig.board().is_energized(3));
    assert!(!rig.board().is_energized(4));
}

#[test]
fn temporary_axes_released_after_idle_delay() {
    let mut rig = Rig::new();
    assert_eq!(
        rig.send("move * * * 1 *"),
        ["RECEIVED", "position 3: 1.00", "COMPLETE"]
    );
    assert!(rig.board().is_energized(3));

    let release_at = rig
        .ctrl
        .supervisor()
        .power_down_at_ms()
        .expect("power-down scheduled");
    let last_pulse_ms = rig.board().axis(3).pulse_times.last().copied().unwrap_or(0) / 1_000;
    assert!(release_at >= last_pulse_ms + 250);

    while rig.now_ms() < release_at {
        assert!(rig.board().is_energized(3));
        rig.step();
    }
    rig.step();
    assert!(!rig.board().is_energized(3));
    assert!(rig.board().is_energized(0));
}

#[test]
fn enable_powers_every_axis() {
    let mut rig = Rig::new();
    assert_eq!(rig.send("enable"), ["RECEIVED", "motors enabled", "COMPLETE"]);
    for axis in 0..5 {
        assert!(rig.board().is_energized(axis), "axis {axis}");
    }
    let e0 = &MachineConfig::default().axes[3];
    assert_eq!(rig.board().level(e0.enable_pin), Some(Level::Low));
}

// ── Step Generation ─────────────────────────────────────────────────

#[test]
fn counters_track_pulses_across_moves() {
    let mut rig = Rig::new();
    for cmd in ["move 10 -5 3 1 -1", "move -10 5 0 0 1", "move 2.5 * -1 * 0"] {
        let lines = rig.send(cmd);
        assert_eq!(lines.last().map(String::as_str), Some("COMPLETE"), "{cmd}");
        assert_counters_match_pulses(&rig);
    }
    assert_eq!(rig.ctrl.axis(0).position(), 200);
    assert_eq!(rig.ctrl.axis(2).position(), -80);
}

#[test]
fn step_rate_bounded_by_max_speed() {
    let mut rig = Rig::new();
    rig.send("move 100 10 * * *");

    let config = MachineConfig::default();
    for axis in [0, 1] {
        let floor_us = 1_000_000 / u64::from(config.axes[axis].max_speed);
        let min = rig
            .board()
            .axis(axis)
            .min_pulse_interval_us()
            .expect("pulses emitted");
        assert!(min >= floor_us, "axis {axis}: {min} µs < {floor_us} µs");
    }
}

#[test]
fn coordinated_axes_finish_together() {
    let mut rig = Rig::new();
    rig.send("move 20 2 * * *");

    let x = rig.board().axis(0).pulse_times.clone();
    let y = rig.board().axis(1).pulse_times.clone();
    assert_eq!(x.len(), 1_600);
    assert_eq!(y.len(), 160);
    // Both start and end within one lead interval of each other.
    let lead_gap = x.windows(2).map(|w| w[1] - w[0]).max().unwrap_or(0);
    assert!(y[0] - x[0] <= lead_gap * 10);
    assert!(x[x.len() - 1] - y[y.len() - 1] <= lead_gap * 10);
}
