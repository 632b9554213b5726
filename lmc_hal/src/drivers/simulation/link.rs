//! In-memory serial link.

use lmc_common::hal::SerialLink;
use std::collections::VecDeque;

/// Serial link backed by two byte queues.
#[derive(Debug, Default)]
pub struct SimLink {
    rx: VecDeque<u8>,
    tx: Vec<u8>,
}

impl SimLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes as if sent by the host.
    pub fn feed(&mut self, text: &str) {
        self.rx.extend(text.bytes());
    }

    /// Queue raw bytes as if sent by the host.
    pub fn feed_bytes(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes.iter().copied());
    }

    /// Bytes not yet consumed by the controller.
    pub fn pending_rx(&self) -> usize {
        self.rx.len()
    }

    /// Drain everything the controller wrote, split into lines.
    pub fn take_lines(&mut self) -> Vec<String> {
        let text = String::from_utf8_lossy(&self.tx).into_owned();
        self.tx.clear();
        text.lines().map(str::to_owned).collect()
    }

    /// Everything written so far, without draining.
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.tx).into_owned()
    }
}

impl SerialLink for SimLink {
    fn read_byte(&mut self) -> Option<u8> {
        self.rx.pop_front()
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.tx.extend_from_slice(bytes);
    }
}
