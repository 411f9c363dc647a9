//! Error type shared by the programmer and ramapp packet engines.
//!
//! Every variant carries a POSIX-equivalent signed error code that is what
//! actually crosses the wire inside a failure frame (§3, §6 of the
//! specification this crate implements) — the `Display` text is for logs
//! only, never for the wire.

use std::io;
use thiserror::Error;

/// Result type for picprog-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unknown/unrecognized programmer command type (the original's catch-all
/// `default: res = -1;` branch, not a named POSIX code).
pub const UNKNOWN_COMMAND_CODE: i32 = -1;

/// Protocol error: malformed handshake response, bad state.
pub const EPROTO: i32 = -71;
/// Operation timed out waiting on a channel, TAP poll, or flash poll.
pub const ETIMEDOUT: i32 = -110;
/// Declared payload length exceeds `MAX_PAYLOAD_SIZE`.
pub const EMSGSIZE: i32 = -90;
/// Invalid argument (fast-write size not a nonzero multiple of 256, etc).
pub const EINVAL: i32 = -22;
/// Command requires a connected session but none exists.
pub const ENOTCONN: i32 = -107;
/// Command requires a disconnected session but one is already open.
pub const EISCONN: i32 = -106;
/// Frame CRC did not match its declared contents.
pub const EBADCRC: i32 = -1007;
/// Ramapp received a command type it does not implement.
pub const ENOCOMMAND: i32 = -1008;
/// Flash write failed verification (read-back mismatch).
pub const EFLASHWRITE: i32 = -1009;
/// Value out of the addressable/representable range.
pub const ERANGE: i32 = -34;
/// Entering EJTAG serial execution mode failed.
pub const EENTERSERIALEXECUTIONMODE: i32 = -10000;
/// Uploading the ramapp instruction stream failed.
pub const ERAMAPPUPLOAD: i32 = -10001;

/// Error type for picprog-core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the underlying channel implementation.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Handshake/state machine protocol violation.
    #[error("protocol error")]
    Protocol,

    /// A blocking operation exceeded its deadline.
    #[error("timed out")]
    Timeout,

    /// Declared frame payload length exceeds 1024 bytes.
    #[error("message too large")]
    MessageSize,

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    Invalid(&'static str),

    /// Command requires `connected == true`.
    #[error("not connected")]
    NotConnected,

    /// Command requires `connected == false`.
    #[error("already connected")]
    AlreadyConnected,

    /// Frame CRC mismatch.
    #[error("bad CRC")]
    BadCrc,

    /// Unrecognized ramapp command type.
    #[error("no such command")]
    NoCommand,

    /// Unrecognized programmer command type (the raw `-1` catch-all).
    #[error("unknown command")]
    UnknownCommand,

    /// Flash write verification failed.
    #[error("flash write verification failed")]
    FlashWrite,

    /// Value out of range.
    #[error("value out of range")]
    Range,

    /// Entering EJTAG serial execution mode failed.
    #[error("failed to enter serial execution mode")]
    EnterSerialExecutionMode,

    /// Uploading the ramapp instruction stream failed.
    #[error("ramapp upload failed")]
    RamappUpload,
}

impl Error {
    /// The signed, negative wire code for this error (§6).
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::Io(_) => ETIMEDOUT,
            Self::Protocol => EPROTO,
            Self::Timeout => ETIMEDOUT,
            Self::MessageSize => EMSGSIZE,
            Self::Invalid(_) => EINVAL,
            Self::NotConnected => ENOTCONN,
            Self::AlreadyConnected => EISCONN,
            Self::BadCrc => EBADCRC,
            Self::NoCommand => ENOCOMMAND,
            Self::UnknownCommand => UNKNOWN_COMMAND_CODE,
            Self::FlashWrite => EFLASHWRITE,
            Self::Range => ERANGE,
            Self::EnterSerialExecutionMode => EENTERSERIALEXECUTIONMODE,
            Self::RamappUpload => ERAMAPPUPLOAD,
        }
    }

    /// Reconstruct an `Error` from a wire code, for tests and for the CLI's
    /// reporting of a received failure frame. Codes with no named variant
    /// in this implementation are folded into `UnknownCommand`.
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            EPROTO => Self::Protocol,
            ETIMEDOUT => Self::Timeout,
            EMSGSIZE => Self::MessageSize,
            EINVAL => Self::Invalid("remote reported EINVAL"),
            ENOTCONN => Self::NotConnected,
            EISCONN => Self::AlreadyConnected,
            EBADCRC => Self::BadCrc,
            ENOCOMMAND => Self::NoCommand,
            EFLASHWRITE => Self::FlashWrite,
            ERANGE => Self::Range,
            EENTERSERIALEXECUTIONMODE => Self::EnterSerialExecutionMode,
            ERAMAPPUPLOAD => Self::RamappUpload,
            _ => Self::UnknownCommand,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_round_trips_through_from_code() {
        for &code in &[
            EPROTO,
            ETIMEDOUT,
            EMSGSIZE,
            ENOTCONN,
            EISCONN,
            EBADCRC,
            ENOCOMMAND,
            EFLASHWRITE,
            ERANGE,
            EENTERSERIALEXECUTIONMODE,
            ERAMAPPUPLOAD,
        ] {
            assert_eq!(Error::from_code(code).code(), code);
        }
    }

    #[test]
    fn scenario_bytes_match_spec_literal_codes() {
        assert_eq!(ENOTCONN, -107);
        assert_eq!(EBADCRC, -1007);
        assert_eq!(UNKNOWN_COMMAND_CODE, -1);
    }
}
