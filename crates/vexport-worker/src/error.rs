//! Worker error types.

use std::time::Duration;

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Job timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Processing crashed: {0}")]
    Crashed(String),

    #[error("Media error: {0}")]
    Media(#[from] vexport_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Reason shown to the job's owner in `job_failed`.
    ///
    /// Media errors carry the encoder's last diagnostic line; everything else
    /// uses its display form.
    pub fn reason(&self) -> String {
        match self {
            WorkerError::Media(e) => e.client_message(),
            other => other.to_string(),
        }
    }

    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::ProcessingFailed(_) => "processing_failed",
            WorkerError::InvalidInput(_) => "invalid_input",
            WorkerError::Timeout(_) => "timeout",
            WorkerError::Crashed(_) => "crashed",
            WorkerError::Media(_) => "media",
            WorkerError::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_and_kind() {
        let err = WorkerError::Timeout(Duration::from_secs(3600));
        assert_eq!(err.reason(), "Job timed out after 3600s");
        assert_eq!(err.kind(), "timeout");

        let err = WorkerError::from(vexport_media::MediaError::invalid_input("bad base64"));
        assert_eq!(err.kind(), "media");
        assert!(err.reason().contains("bad base64"));
    }

    #[test]
    fn test_sub_second_timeout_reason() {
        let err = WorkerError::Timeout(Duration::from_millis(200));
        assert_eq!(err.reason(), "Job timed out after 0.2s");
    }
}
