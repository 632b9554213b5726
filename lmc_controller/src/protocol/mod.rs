//! Host line protocol.
//!
//! - [`line`] - receive ring and line assembly
//! - [`command`] - command names and argument parsing
//! - [`response`] - `RECEIVED` / `COMPLETE` / `ERROR: <code>` writer

pub mod command;
pub mod line;
pub mod response;

pub use command::{Command, CommandName};
pub use line::{LineAssembler, LineText, RxLine};
pub use response::Responder;
