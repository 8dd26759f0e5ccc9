//! Queue error types.

use thiserror::Error;

use vexport_models::{ConnectionId, InvalidTransition, JobId, ServerMessage, Violation};

pub type QueueResult<T> = Result<T, QueueError>;

pub type AdmissionResult<T> = Result<T, AdmissionError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job is not processing: {0}")]
    NotProcessing(String),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

impl QueueError {
    pub fn job_not_found(job_id: &JobId) -> Self {
        Self::JobNotFound(job_id.to_string())
    }

    pub fn not_processing(job_id: &JobId) -> Self {
        Self::NotProcessing(job_id.to_string())
    }
}

/// Why a submission was refused. Nothing is queued or broadcast in any case.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdmissionError {
    #[error("Invalid parameters: {}", join_violations(.0))]
    Validation(Vec<Violation>),

    #[error("A job is already outstanding for this connection ({job_id})")]
    DuplicateSubmission { job_id: JobId },

    #[error("Unknown connection: {0}")]
    UnknownConnection(ConnectionId),
}

impl AdmissionError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AdmissionError::Validation(_) => "validation",
            AdmissionError::DuplicateSubmission { .. } => "duplicate",
            AdmissionError::UnknownConnection(_) => "unknown_connection",
        }
    }

    /// The `job_rejected` message for this error.
    pub fn to_message(&self) -> ServerMessage {
        let violations = match self {
            AdmissionError::Validation(violations) => violations.clone(),
            _ => Vec::new(),
        };
        ServerMessage::JobRejected {
            reason: self.to_string(),
            violations,
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// An owner-scoped event whose recipient is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Connection {0} is not registered")]
pub struct DeliveryMiss(pub ConnectionId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_reason_names_fields() {
        let err = AdmissionError::Validation(vec![
            Violation::new("video_speed", "must be between 0.5 and 2.0"),
            Violation::new("zoom_factor", "must be between 0.5 and 2.0"),
        ]);
        assert_eq!(
            err.to_string(),
            "Invalid parameters: video_speed must be between 0.5 and 2.0, zoom_factor must be between 0.5 and 2.0"
        );

        match err.to_message() {
            ServerMessage::JobRejected { violations, .. } => assert_eq!(violations.len(), 2),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_has_no_violations() {
        let err = AdmissionError::DuplicateSubmission {
            job_id: JobId::from_string("abc"),
        };
        assert_eq!(err.kind(), "duplicate");
        match err.to_message() {
            ServerMessage::JobRejected { reason, violations } => {
                assert!(reason.contains("abc"));
                assert!(violations.is_empty());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
