//! Manually advanced clock.

use lmc_common::hal::Clock;
use std::cell::Cell;
use std::rc::Rc;

/// Simulated monotonic clock.
///
/// Clones share one time base, so a test can keep a handle while the
/// controller and the board own theirs.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_us: Rc<Cell<u64>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move time forward by `us`.
    pub fn advance_us(&self, us: u64) {
        self.now_us.set(self.now_us.get().saturating_add(us));
    }

    /// Move time forward by `ms`.
    pub fn advance_ms(&self, ms: u64) {
        self.advance_us(ms.saturating_mul(1_000));
    }

    /// Jump to `t_us` if it lies in the future. Time never goes back.
    pub fn advance_to(&self, t_us: u64) {
        if t_us > self.now_us.get() {
            self.now_us.set(t_us);
        }
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        self.now_us.get()
    }
}
