//! Response writer.
//!
//! Every line is formatted into a fixed buffer and terminated with LF.
//! Lines longer than the buffer are truncated, never split.

use core::fmt::{self, Write};
use heapless::String;
use lmc_common::consts::RESPONSE_LINE_CAPACITY;
use lmc_common::error::ErrorKind;
use lmc_common::hal::SerialLink;

pub const RECEIVED: &str = "RECEIVED";
pub const COMPLETE: &str = "COMPLETE";

/// Formatted response line.
pub type ResponseLine = String<RESPONSE_LINE_CAPACITY>;

/// Line-oriented writer over a serial link.
pub struct Responder<'a, S: SerialLink> {
    link: &'a mut S,
}

impl<'a, S: SerialLink> Responder<'a, S> {
    #[inline]
    pub fn new(link: &'a mut S) -> Self {
        Self { link }
    }

    /// Emit `text` followed by LF.
    pub fn line(&mut self, text: &str) {
        self.link.write_bytes(text.as_bytes());
        self.link.write_bytes(b"\n");
    }

    /// Emit a formatted line.
    pub fn fmt(&mut self, args: fmt::Arguments<'_>) {
        let mut buf = ResponseLine::new();
        // On overflow the buffer keeps what fitted.
        let _ = Truncating(&mut buf).write_fmt(args);
        self.line(&buf);
    }

    #[inline]
    pub fn received(&mut self) {
        self.line(RECEIVED);
    }

    #[inline]
    pub fn complete(&mut self) {
        self.line(COMPLETE);
    }

    pub fn error(&mut self, kind: ErrorKind) {
        self.fmt(format_args!("ERROR: {kind}"));
    }
}

/// Writer that keeps every character that fits.
struct Truncating<'b>(&'b mut ResponseLine);

impl Write for Truncating<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            self.0.push(c).map_err(|_| fmt::Error)?;
        }
        Ok(())
    }
}
