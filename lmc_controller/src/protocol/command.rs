//! Command names and argument parsing.
//!
//! Parsing is two-step so the dispatcher can acknowledge a recognised name
//! with `RECEIVED` before the arguments are checked:
//!
//! 1. [`CommandName::lookup`] on the first token (case-insensitive)
//! 2. [`Command::parse`] on the remaining tokens
//!
//! Range checks that need the machine configuration (envelopes, pin table)
//! happen later, at execution.

use heapless::Vec;
use lmc_common::consts::{MAX_TOKENS, NUM_MOTORS};
use lmc_common::error::ErrorKind;

/// Token meaning "leave this axis where it is".
pub const SKIP_TOKEN: &str = "*";

/// Recognised command names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandName {
    Move,
    Home,
    ClampHome,
    PinOn,
    PinOff,
    Status,
    Emergency,
    Reset,
    Enable,
    Disable,
    Help,
    Version,
    Endstops,
    Waste,
    Rotor,
    LoadCell,
    Test,
}

/// Name table: (spelling, command). Aliases share a command.
const NAMES: &[(&str, CommandName)] = &[
    ("move", CommandName::Move),
    ("sm", CommandName::Move),
    ("home", CommandName::Home),
    ("sh", CommandName::Home),
    ("clamph", CommandName::ClampHome),
    ("pon", CommandName::PinOn),
    ("pin", CommandName::PinOn),
    ("pinon", CommandName::PinOn),
    ("poff", CommandName::PinOff),
    ("pinoff", CommandName::PinOff),
    ("status", CommandName::Status),
    ("emergency", CommandName::Emergency),
    ("reset", CommandName::Reset),
    ("enable", CommandName::Enable),
    ("disable", CommandName::Disable),
    ("help", CommandName::Help),
    ("version", CommandName::Version),
    ("endstops", CommandName::Endstops),
    ("waste", CommandName::Waste),
    ("rotor", CommandName::Rotor),
    ("loadcell", CommandName::LoadCell),
    ("test", CommandName::Test),
];

impl CommandName {
    /// Resolve a command token.
    pub fn lookup(token: &str) -> Option<Self> {
        NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(token))
            .map(|&(_, cmd)| cmd)
    }

    /// Exact number of arguments.
    pub const fn arity(self) -> usize {
        match self {
            Self::Move | Self::Home => NUM_MOTORS,
            Self::PinOn | Self::PinOff => 1,
            _ => 0,
        }
    }

    /// Whether `line` names the emergency command.
    pub fn is_emergency_line(line: &str) -> bool {
        line.split_ascii_whitespace()
            .next()
            .and_then(Self::lookup)
            == Some(Self::Emergency)
    }
}

/// A fully parsed request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Absolute targets in user units; `None` does not participate.
    Move { targets: [Option<f32>; NUM_MOTORS] },
    Home { selected: [bool; NUM_MOTORS] },
    ClampHome,
    PinOn(usize),
    PinOff(usize),
    Status,
    Emergency,
    Reset,
    Enable,
    Disable,
    Help,
    Version,
    Endstops,
    Waste,
    Rotor,
    LoadCell,
    Test,
}

impl Command {
    /// Parse the arguments of `name`.
    pub fn parse<'a>(
        name: CommandName,
        args: impl Iterator<Item = &'a str>,
    ) -> Result<Self, ErrorKind> {
        let mut tokens: Vec<&str, MAX_TOKENS> = Vec::new();
        for arg in args {
            tokens.push(arg).map_err(|_| ErrorKind::InvalidParameter)?;
        }
        let arity = name.arity();
        if tokens.len() < arity {
            return Err(ErrorKind::MissingParameter);
        }
        if tokens.len() > arity {
            return Err(ErrorKind::InvalidParameter);
        }

        Ok(match name {
            CommandName::Move => {
                let mut targets = [None; NUM_MOTORS];
                for (slot, tok) in targets.iter_mut().zip(&tokens) {
                    *slot = parse_target(tok)?;
                }
                Self::Move { targets }
            }
            CommandName::Home => {
                let mut selected = [false; NUM_MOTORS];
                for (slot, tok) in selected.iter_mut().zip(&tokens) {
                    *slot = parse_flag(tok)?;
                }
                Self::Home { selected }
            }
            CommandName::PinOn => Self::PinOn(parse_pin_index(tokens[0])?),
            CommandName::PinOff => Self::PinOff(parse_pin_index(tokens[0])?),
            CommandName::ClampHome => Self::ClampHome,
            CommandName::Status => Self::Status,
            CommandName::Emergency => Self::Emergency,
            CommandName::Reset => Self::Reset,
            CommandName::Enable => Self::Enable,
            CommandName::Disable => Self::Disable,
            CommandName::Help => Self::Help,
            CommandName::Version => Self::Version,
            CommandName::Endstops => Self::Endstops,
            CommandName::Waste => Self::Waste,
            CommandName::Rotor => Self::Rotor,
            CommandName::LoadCell => Self::LoadCell,
            CommandName::Test => Self::Test,
        })
    }
}

/// `*` or a float. NaN and infinities parse here and fail envelope checks.
fn parse_target(token: &str) -> Result<Option<f32>, ErrorKind> {
    if token == SKIP_TOKEN {
        return Ok(None);
    }
    token
        .parse::<f32>()
        .map(Some)
        .map_err(|_| ErrorKind::InvalidParameter)
}

fn parse_flag(token: &str) -> Result<bool, ErrorKind> {
    match token {
        "0" => Ok(false),
        "1" => Ok(true),
        _ => Err(ErrorKind::InvalidParameter),
    }
}

fn parse_pin_index(token: &str) -> Result<usize, ErrorKind> {
    let value: i64 = token.parse().map_err(|_| ErrorKind::InvalidParameter)?;
    usize::try_from(value).map_err(|_| ErrorKind::InvalidPin)
}
