//! PipeWire error types.

use thiserror::Error;

/// PipeWire error type.
#[derive(Debug, Error)]
pub enum PwError {
    #[error("{program} exited with code {exit_code:?}: {stderr}")]
    Execution { program: String, exit_code: Option<i32>, stderr: String },

    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Prerequisite missing: {0}")]
    PrerequisiteMissing(String),

    #[error(transparent)]
    Parse(#[from] whisper_core::Error),

    #[error("Failed to disconnect link {link_id}: {source}")]
    DisconnectFailed {
        link_id: String,
        #[source]
        source: Box<PwError>,
    },

    #[error("Unexpected volume output: {0:?}")]
    VolumeParse(String),
}

impl PwError {
    /// Whether the failure came from malformed tool output.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        match self {
            Self::Parse(e) => e.is_parse_error(),
            Self::VolumeParse(_) => true,
            _ => false,
        }
    }
}

/// Result type for PipeWire operations.
pub type PwResult<T> = Result<T, PwError>;
