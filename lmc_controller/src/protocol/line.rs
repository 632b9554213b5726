//! Receive ring and line assembly.
//!
//! Bytes are pushed into a fixed ring as they arrive and pulled into the
//! command buffer on demand, so a busy controller keeps buffering while it
//! stops consuming lines. A line holds at most `MAX_COMMAND_LENGTH − 1`
//! bytes; anything longer is discarded up to the next terminator and
//! reported once as an overflow.
//!
//! The last ring slot is reserved for a drop marker. When a byte is lost
//! to a full ring the marker is stored behind the bytes already buffered,
//! so only the line that lost the byte is reported as an overflow. Lines
//! completed ahead of it come out intact.

use heapless::{Deque, String, Vec};
use lmc_common::consts::{MAX_COMMAND_LENGTH, RX_RING_CAPACITY};

/// Longest accepted line, terminator excluded.
pub const MAX_LINE_BYTES: usize = MAX_COMMAND_LENGTH - 1;

/// Text of one command line.
pub type LineText = String<MAX_COMMAND_LENGTH>;

/// Stored in the ring in place of lost bytes. Never buffered as input.
const DROP_MARK: u8 = 0x00;

/// Ring bytes available to input; one slot stays free for [`DROP_MARK`].
const RING_DATA_CAPACITY: usize = RX_RING_CAPACITY - 1;

/// A terminated input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RxLine {
    Ready(LineText),
    Overflow,
}

/// Receive ring plus the line being assembled.
#[derive(Debug)]
pub struct LineAssembler {
    ring: Deque<u8, RX_RING_CAPACITY>,
    line: Vec<u8, MAX_COMMAND_LENGTH>,
    overflowed: bool,
    dropped: u32,
}

impl Default for LineAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            ring: Deque::new(),
            line: Vec::new(),
            overflowed: false,
            dropped: 0,
        }
    }

    /// Buffer one received byte. Returns false when the ring is full; the
    /// byte is lost and the line it belonged to is marked overflowed.
    /// Bytes that never reach a line are discarded here.
    pub fn push_byte(&mut self, byte: u8) -> bool {
        if !matches!(byte, b'\t' | b'\r' | b'\n' | b' '..=b'~') {
            return true;
        }
        if self.ring.len() >= RING_DATA_CAPACITY {
            self.dropped = self.dropped.saturating_add(1);
            if self.ring.back() != Some(&DROP_MARK) {
                // Reserved slot.
                let _ = self.ring.push_back(DROP_MARK);
            }
            return false;
        }
        // Below data capacity.
        let _ = self.ring.push_back(byte);
        true
    }

    /// Bytes lost to a full ring since start.
    #[inline]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }

    /// Bytes waiting in the ring.
    #[inline]
    pub fn buffered(&self) -> usize {
        self.ring.len()
    }

    /// Next complete line, if one has arrived. Empty lines are skipped.
    pub fn next_line(&mut self) -> Option<RxLine> {
        while let Some(byte) = self.ring.pop_front() {
            match byte {
                b'\r' | b'\n' => {
                    if self.overflowed {
                        self.overflowed = false;
                        self.line.clear();
                        return Some(RxLine::Overflow);
                    }
                    if self.line.is_empty() {
                        continue;
                    }
                    let text = self.take_line();
                    return Some(RxLine::Ready(text));
                }
                DROP_MARK => {
                    self.overflowed = true;
                    self.line.clear();
                }
                _ if self.overflowed => {}
                b'\t' | b' '..=b'~' => {
                    if self.line.len() >= MAX_LINE_BYTES {
                        self.overflowed = true;
                        self.line.clear();
                    } else {
                        let c = if byte == b'\t' { b' ' } else { byte };
                        // Capacity checked above.
                        let _ = self.line.push(c);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn take_line(&mut self) -> LineText {
        let mut text = LineText::new();
        for &b in &self.line {
            // Only printable ASCII reaches the buffer.
            let _ = text.push(char::from(b));
        }
        self.line.clear();
        text
    }
}
