//! The unit of work the scheduler drives.

use async_trait::async_trait;

use vexport_models::{Job, JobId, JobInputs, JobResult, ProcessingParams};
use vexport_queue::ProgressReporter;

use crate::error::WorkerResult;

/// Inputs handed to a processor for one job.
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    pub job_id: JobId,
    pub inputs: JobInputs,
    pub params: ProcessingParams,
}

impl From<&Job> for ProcessingRequest {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id.clone(),
            inputs: job.inputs.clone(),
            params: job.params.clone(),
        }
    }
}

/// Turns a job's inputs into a result.
///
/// Implementations report non-decreasing percentages through `progress`. The
/// scheduler runs each call in its own task and may abort it on timeout, so
/// temporary state should be cleaned up on drop.
#[async_trait]
pub trait JobProcessor: Send + Sync + 'static {
    async fn process(
        &self,
        request: ProcessingRequest,
        progress: ProgressReporter,
    ) -> WorkerResult<JobResult>;

    /// Operation name used in logs.
    fn name(&self) -> &'static str {
        "process"
    }
}
