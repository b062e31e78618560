//! Error types for Whisper core.

use thiserror::Error;

/// Core error type for Whisper operations.
#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("Line {line} appears before any port header: {text:?}")]
    OrphanLine { line: usize, text: String },

    #[error("Line {line} is missing a ':' channel separator: {text:?}")]
    MissingChannelSeparator { line: usize, text: String },

    #[error("Line {line} is not a valid port header: {text:?}")]
    MalformedHeader { line: usize, text: String },

    #[error("Line {line} is not a valid connection: {text:?}")]
    MalformedConnection { line: usize, text: String },

    #[error("Invalid volume value: {0} (must be 0.0-1.0)")]
    InvalidVolume(f32),
}

impl Error {
    /// Whether this error was raised while parsing tool output.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, Self::InvalidVolume(_))
    }
}

/// Result type alias for Whisper core operations.
pub type Result<T> = std::result::Result<T, Error>;
