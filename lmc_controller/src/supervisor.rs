//! Supervisor: operation exclusion, emergency latch, timeouts and watchdog.
//!
//! ```text
//!            BeginMove               OperationDone
//!   Idle ─────────────▶ MoveRunning ───────────────▶ Idle
//!    │  BeginHoming                  OperationDone
//!    └────────────────▶ HomingRunning ─────────────▶ Idle
//!
//!   any ──Emergency──▶ EmergencyLatched ──Reset──▶ Idle
//! ```
//!
//! The supervisor only keeps state and answers questions; the controller
//! carries out the effects (braking, powering down, reporting).

use crate::motion::StopMode;
use lmc_common::error::ErrorKind;
use lmc_common::machine::SupervisorConfig;
use std::fmt;
use tracing::{debug, info, warn};

// ─── Types ──────────────────────────────────────────────────────────

/// Exactly one of these holds at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorPhase {
    Idle,
    MoveRunning,
    HomingRunning,
    EmergencyLatched,
}

impl fmt::Display for SupervisorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "Idle",
            Self::MoveRunning => "MoveRunning",
            Self::HomingRunning => "HomingRunning",
            Self::EmergencyLatched => "EmergencyLatched",
        })
    }
}

/// What latched the emergency state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyCause {
    /// Host sent `emergency`.
    UserRequest,
    /// Operation exceeded its time bound.
    Timeout,
    /// No host activity within the watchdog period.
    Watchdog,
    /// A finished move did not land on its targets.
    ProfilerFault,
}

impl EmergencyCause {
    /// Error code recorded and reported for this cause.
    #[inline]
    pub const fn error_kind(self) -> ErrorKind {
        match self {
            Self::Timeout => ErrorKind::Timeout,
            Self::UserRequest | Self::Watchdog | Self::ProfilerFault => ErrorKind::EmergencyStop,
        }
    }

    /// How a running move is stopped.
    #[inline]
    pub const fn stop_mode(self) -> StopMode {
        match self {
            Self::Watchdog => StopMode::Decelerate,
            Self::UserRequest | Self::Timeout | Self::ProfilerFault => StopMode::Brake,
        }
    }
}

/// Events that drive the supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorEvent {
    BeginMove,
    BeginHoming,
    OperationDone,
    Emergency(EmergencyCause),
    Reset,
}

/// Result of a supervisor transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorTransition {
    Ok(SupervisorPhase),
    Rejected(ErrorKind),
}

/// Operation guarded by the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Move,
    Homing,
}

#[derive(Debug, Clone, Copy)]
struct OperationTimeout {
    kind: OperationKind,
    started_ms: u64,
    limit_ms: u64,
}

/// Outcome of one safety pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyVerdict {
    Clear,
    Timeout(OperationKind),
    WatchdogExpired,
}

// ─── Supervisor ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Supervisor {
    config: SupervisorConfig,
    phase: SupervisorPhase,
    timeout: Option<OperationTimeout>,
    cause: Option<EmergencyCause>,
    last_error: Option<ErrorKind>,
    last_activity_ms: u64,
    last_safety_check_ms: u64,
    power_down_at_ms: Option<u64>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, now_ms: u64) -> Self {
        Self {
            config,
            phase: SupervisorPhase::Idle,
            timeout: None,
            cause: None,
            last_error: None,
            last_activity_ms: now_ms,
            last_safety_check_ms: now_ms,
            power_down_at_ms: None,
        }
    }

    #[inline]
    pub const fn phase(&self) -> SupervisorPhase {
        self.phase
    }

    /// A move or homing run is in progress.
    #[inline]
    pub const fn is_busy(&self) -> bool {
        matches!(
            self.phase,
            SupervisorPhase::MoveRunning | SupervisorPhase::HomingRunning
        )
    }

    #[inline]
    pub const fn is_emergency(&self) -> bool {
        matches!(self.phase, SupervisorPhase::EmergencyLatched)
    }

    #[inline]
    pub const fn emergency_cause(&self) -> Option<EmergencyCause> {
        self.cause
    }

    #[inline]
    pub const fn last_error(&self) -> Option<ErrorKind> {
        self.last_error
    }

    pub fn set_last_error(&mut self, kind: ErrorKind) {
        self.last_error = Some(kind);
    }

    /// Handle a supervisor event.
    pub fn handle_event(&mut self, event: SupervisorEvent, now_ms: u64) -> SupervisorTransition {
        use SupervisorEvent as E;
        use SupervisorPhase as S;

        let next = match (self.phase, event) {
            (S::Idle, E::BeginMove) => {
                self.arm(OperationKind::Move, self.config.move_timeout_ms, now_ms);
                S::MoveRunning
            }
            (S::Idle, E::BeginHoming) => {
                self.arm(OperationKind::Homing, self.config.homing_timeout_ms, now_ms);
                S::HomingRunning
            }
            (S::MoveRunning | S::HomingRunning, E::BeginMove | E::BeginHoming) => {
                return SupervisorTransition::Rejected(ErrorKind::Busy);
            }
            (S::EmergencyLatched, E::BeginMove | E::BeginHoming) => {
                return SupervisorTransition::Rejected(ErrorKind::EmergencyStop);
            }

            (S::MoveRunning | S::HomingRunning, E::OperationDone) => {
                self.timeout = None;
                self.power_down_at_ms = Some(now_ms + self.config.idle_disable_delay_ms);
                self.last_activity_ms = now_ms;
                S::Idle
            }
            // Operation already ended by the latch.
            (S::Idle | S::EmergencyLatched, E::OperationDone) => self.phase,

            (_, E::Emergency(cause)) => {
                if !self.is_emergency() {
                    info!(?cause, "emergency latched");
                    self.cause = Some(cause);
                }
                self.timeout = None;
                self.power_down_at_ms = None;
                self.last_error = Some(cause.error_kind());
                S::EmergencyLatched
            }

            (S::EmergencyLatched, E::Reset) => {
                info!("emergency cleared");
                self.cause = None;
                self.last_activity_ms = now_ms;
                S::Idle
            }
            (S::Idle, E::Reset) => S::Idle,
            (S::MoveRunning | S::HomingRunning, E::Reset) => {
                return SupervisorTransition::Rejected(ErrorKind::Busy);
            }
        };

        if next != self.phase {
            debug!(from = %self.phase, to = %next, "supervisor transition");
        }
        self.phase = next;
        SupervisorTransition::Ok(next)
    }

    fn arm(&mut self, kind: OperationKind, limit_ms: u64, now_ms: u64) {
        self.timeout = Some(OperationTimeout {
            kind,
            started_ms: now_ms,
            limit_ms,
        });
        self.power_down_at_ms = None;
    }

    // ─── Watchdog ───────────────────────────────────────────────────

    /// Record host activity (a received byte or a completed command).
    #[inline]
    pub fn note_activity(&mut self, now_ms: u64) {
        self.last_activity_ms = now_ms;
    }

    #[inline]
    pub const fn last_activity_ms(&self) -> u64 {
        self.last_activity_ms
    }

    /// Next time the safety pass is due [ms].
    #[inline]
    pub fn next_safety_check_ms(&self) -> u64 {
        self.last_safety_check_ms + self.config.safety_check_interval_ms
    }

    #[inline]
    pub fn safety_due(&self, now_ms: u64) -> bool {
        now_ms >= self.next_safety_check_ms()
    }

    /// Evaluate timeout and watchdog together.
    pub fn safety_check(&mut self, now_ms: u64) -> SafetyVerdict {
        self.last_safety_check_ms = now_ms;

        if let Some(t) = self.timeout {
            if now_ms.saturating_sub(t.started_ms) >= t.limit_ms {
                warn!(kind = ?t.kind, limit_ms = t.limit_ms, "operation timed out");
                self.timeout = None;
                return SafetyVerdict::Timeout(t.kind);
            }
        }

        if !self.is_emergency()
            && now_ms.saturating_sub(self.last_activity_ms) >= self.config.watchdog_timeout_ms
        {
            warn!(idle_ms = now_ms - self.last_activity_ms, "watchdog expired");
            return SafetyVerdict::WatchdogExpired;
        }
        SafetyVerdict::Clear
    }

    // ─── Idle Power-Down ────────────────────────────────────────────

    /// Pending power-down time of temporary axes [ms].
    #[inline]
    pub const fn power_down_at_ms(&self) -> Option<u64> {
        self.power_down_at_ms
    }

    /// True once when the idle delay has elapsed with nothing running.
    pub fn take_power_down(&mut self, now_ms: u64) -> bool {
        match self.power_down_at_ms {
            Some(t) if now_ms >= t && self.phase == SupervisorPhase::Idle => {
                self.power_down_at_ms = None;
                true
            }
            _ => false,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
