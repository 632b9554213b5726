//! Protocol error codes.
//!
//! Every failed request ends with exactly one `ERROR: <code>` line; the
//! code is the `Display` form of [`ErrorKind`].
//!
//! | Category   | Codes                                                        |
//! |------------|--------------------------------------------------------------|
//! | Parse      | BufferOverflow, UnknownCommand, MissingParameter, InvalidParameter |
//! | Validation | InvalidPosition, InvalidPin                                  |
//! | Operation  | Timeout, EndstopNotFound, Busy                               |
//! | Safety     | EmergencyStop                                                |

use thiserror::Error;

/// Wire-visible error code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum ErrorKind {
    #[error("InvalidPosition")]
    InvalidPosition,
    #[error("InvalidPin")]
    InvalidPin,
    #[error("Timeout")]
    Timeout,
    #[error("EmergencyStop")]
    EmergencyStop,
    #[error("BufferOverflow")]
    BufferOverflow,
    #[error("UnknownCommand")]
    UnknownCommand,
    #[error("MissingParameter")]
    MissingParameter,
    #[error("InvalidParameter")]
    InvalidParameter,
    /// Rejected due to another operation in progress.
    #[error("Busy")]
    Busy,
    /// Homing seek finished without the endstop triggering.
    #[error("EndstopNotFound")]
    EndstopNotFound,
}

/// Error taxonomy; sets how loudly a failed request is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Recovered locally, nothing happened.
    Parse,
    /// Request rejected before any side effect.
    Validation,
    /// Fatal to the running operation.
    Operation,
    /// Latches emergency.
    Safety,
}

impl ErrorKind {
    /// Category of this code.
    pub const fn category(self) -> ErrorCategory {
        match self {
            Self::BufferOverflow
            | Self::UnknownCommand
            | Self::MissingParameter
            | Self::InvalidParameter => ErrorCategory::Parse,
            Self::InvalidPosition | Self::InvalidPin => ErrorCategory::Validation,
            Self::Timeout | Self::EndstopNotFound | Self::Busy => ErrorCategory::Operation,
            Self::EmergencyStop => ErrorCategory::Safety,
        }
    }
}
