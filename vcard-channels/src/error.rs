//! Error types for the channel layer

use thiserror::Error;

use crate::apdu::{APDUError, SW};

/// Errors raised while handling a command.
///
/// All of them are recoverable: the dispatcher turns every variant into a
/// status word and the card keeps running.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelError {
    #[error("all logical channels are in use")]
    NoChannelAvailable,

    #[error("logical channel {0} is already open or out of range")]
    ChannelUnavailable(u8),

    #[error("logical channel {0} is not open")]
    ChannelNotFound(u8),

    #[error("command not allowed")]
    CommandNotAllowed,

    #[error("function not supported")]
    FuncNotSupported,

    #[error("applet refused selection")]
    AppletSelectFailed,

    #[error("no applet matches the requested AID")]
    RecordNotFound,

    #[error("malformed command: {0}")]
    Malformed(#[from] APDUError),

    #[error("unexpected failure: {0}")]
    Unknown(String),
}

impl ChannelError {
    /// Status word reported to the terminal for this error
    pub fn status_word(&self) -> u16 {
        match self {
            ChannelError::NoChannelAvailable
            | ChannelError::ChannelUnavailable(_)
            | ChannelError::ChannelNotFound(_)
            | ChannelError::FuncNotSupported => SW::FUNC_NOT_SUPPORTED,
            ChannelError::CommandNotAllowed => SW::COMMAND_NOT_ALLOWED,
            ChannelError::AppletSelectFailed => SW::APPLET_SELECT_FAILED,
            ChannelError::RecordNotFound => SW::RECORD_NOT_FOUND,
            ChannelError::Malformed(_) => SW::WRONG_LENGTH,
            ChannelError::Unknown(_) => SW::UNKNOWN,
        }
    }
}

/// Failure reported by an applet while processing a command
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppletError {
    /// ISO exception carrying the status word to return
    #[error("applet raised status {0:04X}")]
    Status(u16),

    #[error("applet failed: {0}")]
    Internal(String),
}

impl AppletError {
    pub fn status_word(&self) -> u16 {
        match self {
            AppletError::Status(sw) => *sw,
            AppletError::Internal(_) => SW::UNKNOWN,
        }
    }
}
