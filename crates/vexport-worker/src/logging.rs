//! Structured job logging.

use tracing::{error, info, warn, Span};
use vexport_models::{ConnectionId, JobId};

/// Logs job lifecycle events with the job id, owner and operation attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    owner: String,
    operation: &'static str,
}

impl JobLogger {
    pub fn new(job_id: &JobId, owner: &ConnectionId, operation: &'static str) -> Self {
        Self {
            job_id: job_id.to_string(),
            owner: owner.to_string(),
            operation,
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            connection_id = %self.owner,
            operation = self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_progress(&self, percent: u8, message: &str) {
        info!(
            job_id = %self.job_id,
            operation = self.operation,
            percent,
            "Job progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            operation = self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            connection_id = %self.owner,
            operation = self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            connection_id = %self.owner,
            operation = self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    /// Span to instrument the job's work with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            operation = self.operation
        )
    }
}
