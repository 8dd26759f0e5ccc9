//! Queue scheduler.
//!
//! Runs queued jobs one at a time in admission order. Each job's processor
//! call runs in its own task bounded by the job timeout; failures, panics and
//! timeouts all end in `job_failed` and the loop moves on.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, Instrument};

use vexport_models::{Job, JobId, JobResult};
use vexport_queue::{metrics, JobOutcome, JobQueue, ProgressReporter, ProgressUpdate};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::processor::{JobProcessor, ProcessingRequest};

/// Single consumer of a [`JobQueue`].
pub struct QueueScheduler {
    queue: Arc<JobQueue>,
    processor: Arc<dyn JobProcessor>,
    job_timeout: Duration,
    progress_buffer: usize,
    shutdown: watch::Sender<bool>,
}

impl QueueScheduler {
    /// Create a new scheduler.
    pub fn new(queue: Arc<JobQueue>, processor: Arc<dyn JobProcessor>, config: &WorkerConfig) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            queue,
            processor,
            job_timeout: config.job_timeout,
            progress_buffer: config.progress_buffer,
            shutdown,
        }
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    ///
    /// A job already processing when shutdown is signalled runs to completion.
    pub async fn run(&self) -> WorkerResult<()> {
        info!(
            processor = self.processor.name(),
            job_timeout_secs = self.job_timeout.as_secs(),
            "Starting queue scheduler"
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Shutdown signal received, stopping scheduler");
                        break;
                    }
                }
                job = self.queue.next_job() => {
                    self.execute_job(job).await;
                }
            }
        }

        info!("Queue scheduler stopped");
        Ok(())
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Drive one job to a terminal state.
    async fn execute_job(&self, job: Job) {
        let logger = JobLogger::new(&job.id, &job.owner, self.processor.name());
        logger.log_start(&job.inputs.video.describe());

        let result = self.run_processor(&job, &logger).await;

        let outcome = match result {
            Ok(result) => {
                logger.log_completion(&format!("{:.2} MB", result.size_mb()));
                JobOutcome::Succeeded(result)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                metrics::record_processing_error(e.kind());
                JobOutcome::failed(e.reason())
            }
        };

        if let Err(e) = self.queue.complete(&job.id, outcome).await {
            error!(job_id = %job.id, "Failed to complete job: {}", e);
        }
    }

    /// Spawn the processor and forward its progress until it finishes, fails
    /// or runs out of time.
    async fn run_processor(&self, job: &Job, logger: &JobLogger) -> WorkerResult<JobResult> {
        let (reporter, mut progress_rx) = ProgressReporter::channel(self.progress_buffer);
        let processor = Arc::clone(&self.processor);
        let request = ProcessingRequest::from(job);

        let mut handle = tokio::spawn(
            async move { processor.process(request, reporter).await }.instrument(logger.create_span()),
        );

        let deadline = tokio::time::sleep(self.job_timeout);
        tokio::pin!(deadline);

        let result = loop {
            tokio::select! {
                biased;

                Some(update) = progress_rx.recv() => {
                    self.forward_progress(&job.id, update, logger).await;
                }
                joined = &mut handle => {
                    break match joined {
                        Ok(result) => result,
                        Err(e) if e.is_panic() => {
                            Err(WorkerError::Crashed(panic_message(e.into_panic())))
                        }
                        Err(e) => Err(WorkerError::Crashed(e.to_string())),
                    };
                }
                _ = &mut deadline => {
                    handle.abort();
                    logger.log_warning("Processing exceeded the job timeout, aborted");
                    break Err(WorkerError::Timeout(self.job_timeout));
                }
            }
        };

        // Updates sent before the processor returned precede the terminal event
        while let Ok(update) = progress_rx.try_recv() {
            self.forward_progress(&job.id, update, logger).await;
        }

        result
    }

    async fn forward_progress(&self, job_id: &JobId, update: ProgressUpdate, logger: &JobLogger) {
        if let Some(message) = &update.message {
            logger.log_progress(update.percent, message);
        }
        let percent = update.percent;
        if !self
            .queue
            .report_progress(job_id, percent, update.message)
            .await
        {
            debug!(job_id = %job_id, percent, "Progress update not delivered");
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42u32)), "unknown panic");
    }
}
