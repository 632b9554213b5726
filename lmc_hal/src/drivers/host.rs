//! Host-process adapters: wall clock and stdin/stdout serial link.

use lmc_common::hal::{Clock, SerialLink};
use std::io::{Read, Write};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::Instant;
use tracing::{debug, warn};

/// Monotonic clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_us(&self) -> u64 {
        self.epoch.elapsed().as_micros() as u64
    }
}

/// Serial link on the process's stdin/stdout.
///
/// A reader thread forwards stdin bytes through a channel so
/// [`read_byte`](SerialLink::read_byte) never blocks.
pub struct StdioLink {
    rx: Receiver<u8>,
    closed: bool,
}

impl StdioLink {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for byte in stdin.lock().bytes() {
                match byte {
                    Ok(b) => {
                        if tx.send(b).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        break;
                    }
                }
            }
            debug!("stdin closed");
        });
        Self { rx, closed: false }
    }

    /// Whether stdin reached end of file.
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl SerialLink for StdioLink {
    fn read_byte(&mut self) -> Option<u8> {
        match self.rx.try_recv() {
            Ok(b) => Some(b),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.closed = true;
                None
            }
        }
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut out = std::io::stdout().lock();
        if let Err(e) = out.write_all(bytes).and_then(|()| out.flush()) {
            warn!("stdout write failed: {e}");
        }
    }
}
