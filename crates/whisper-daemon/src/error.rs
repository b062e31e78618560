//! Errors surfaced by daemon operations.

use thiserror::Error;
use whisper_ipc::ErrorInfo;
use whisper_pipewire::PwError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error(transparent)]
    Pw(#[from] PwError),

    #[error("Blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("PipeWire tools are unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Failed to save settings: {0:#}")]
    Settings(anyhow::Error),
}

pub type DaemonResult<T> = Result<T, DaemonError>;

impl From<&DaemonError> for ErrorInfo {
    fn from(error: &DaemonError) -> Self {
        let code = match error {
            DaemonError::Pw(PwError::PrerequisiteMissing(_)) | DaemonError::Unavailable(_) => {
                ErrorInfo::UNAVAILABLE
            }
            DaemonError::Pw(PwError::Parse(whisper_core::Error::InvalidVolume(_)))
            | DaemonError::BadRequest(_) => ErrorInfo::BAD_REQUEST,
            DaemonError::Pw(_) => ErrorInfo::TOOL_FAILED,
            DaemonError::Join(_) | DaemonError::Settings(_) => ErrorInfo::INTERNAL,
        };
        ErrorInfo::new(code, error.to_string())
    }
}

/// Run blocking tool work on the blocking thread pool.
pub async fn run_blocking<T, F>(work: F) -> DaemonResult<T>
where
    F: FnOnce() -> Result<T, PwError> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(work).await??)
}
