//! The queue lock domain.
//!
//! [`JobQueue`] owns the [`JobStore`] and [`ConnectionRegistry`] behind one
//! mutex. Every state change and the events it triggers happen under that
//! lock, so clients never observe a snapshot older than the transition that
//! caused it.

use tokio::sync::{mpsc, Mutex, Notify};
use tracing::{debug, info, warn};

use vexport_models::{
    ConnectionId, Job, JobId, JobInputs, JobResult, ProcessingParams, QueueSnapshot,
    ServerMessage,
};

use crate::broadcast::EventBroadcaster;
use crate::error::{AdmissionResult, QueueResult};
use crate::metrics;
use crate::registry::ConnectionRegistry;
use crate::store::{JobStore, JobView, ProgressStep};

/// How a processed job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Succeeded(JobResult),
    Failed { reason: String },
}

impl JobOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        JobOutcome::Failed {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobOutcome::Succeeded(_) => "succeeded",
            JobOutcome::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Default)]
struct QueueState {
    store: JobStore,
    registry: ConnectionRegistry,
}

impl QueueState {
    fn events(&self) -> EventBroadcaster<'_> {
        EventBroadcaster::new(&self.registry, &self.store)
    }
}

/// In-process job queue shared by connection handlers and the scheduler.
#[derive(Debug, Default)]
pub struct JobQueue {
    state: Mutex<QueueState>,
    work_ready: Notify,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Connection registry
    // ------------------------------------------------------------------

    /// Register a new connection.
    ///
    /// The connection receives `welcome` first, then everyone (including it)
    /// receives a `queue_status`.
    pub async fn register(&self) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = ConnectionId::new();
        let mut state = self.state.lock().await;

        state.store.add_connection(id.clone());
        let rx = state.registry.insert(id.clone());

        let events = state.events();
        events.to_owner(&id, ServerMessage::welcome(id.clone()));
        events.queue_status();

        info!(
            connection_id = %id,
            connected_users = state.registry.len(),
            "Connection registered"
        );
        (id, rx)
    }

    /// Remove a connection.
    ///
    /// Its queued job, if any, is cancelled. A processing job keeps running
    /// and its remaining events are discarded.
    pub async fn unregister(&self, id: &ConnectionId) {
        let mut state = self.state.lock().await;

        if !state.registry.remove(id) {
            return;
        }
        let processing_job = state
            .store
            .active_job_of(id)
            .filter(|job_id| state.store.position_of(job_id) == Some(0))
            .cloned();

        if let Some(job) = state.store.remove_connection(id) {
            metrics::record_job_cancelled();
            info!(
                connection_id = %id,
                job_id = %job.id,
                "Cancelled queued job of disconnected client"
            );
        } else if let Some(job_id) = processing_job {
            info!(
                connection_id = %id,
                job_id = %job_id,
                "Owner disconnected while processing; job continues"
            );
        }

        state.events().queue_status();
        info!(
            connection_id = %id,
            connected_users = state.registry.len(),
            "Connection unregistered"
        );
    }

    /// Deliver an arbitrary message to one connection.
    pub async fn send_to(&self, id: &ConnectionId, message: ServerMessage) -> bool {
        let state = self.state.lock().await;
        state.events().to_owner(id, message)
    }

    // ------------------------------------------------------------------
    // Admission
    // ------------------------------------------------------------------

    /// Admit a job for `owner`.
    ///
    /// On success the owner gets `job_accepted`, everyone gets a
    /// `queue_status`, and the scheduler is woken. On failure the owner gets
    /// `job_rejected` and nothing else changes.
    pub async fn submit(
        &self,
        owner: &ConnectionId,
        inputs: JobInputs,
        params: ProcessingParams,
    ) -> AdmissionResult<JobId> {
        let mut state = self.state.lock().await;

        let job_id = match state.store.admit(owner, inputs, params) {
            Ok(job_id) => job_id,
            Err(e) => {
                metrics::record_job_rejected(e.kind());
                warn!(connection_id = %owner, error = %e, "Job rejected");
                state.events().to_owner(owner, e.to_message());
                return Err(e);
            }
        };

        let position = state.store.position_of(&job_id).unwrap_or_default();
        metrics::record_job_admitted();
        info!(
            connection_id = %owner,
            job_id = %job_id,
            position,
            "Job admitted"
        );

        let events = state.events();
        events.to_owner(
            owner,
            ServerMessage::JobAccepted {
                job_id: job_id.clone(),
                position,
            },
        );
        events.queue_status();
        drop(state);

        self.work_ready.notify_one();
        Ok(job_id)
    }

    // ------------------------------------------------------------------
    // Scheduler side
    // ------------------------------------------------------------------

    /// Wait for the next job and mark it processing.
    ///
    /// Intended for a single consumer. Emits `job_started` to the owner and a
    /// `queue_status` to everyone.
    pub async fn next_job(&self) -> Job {
        loop {
            // Register interest before checking so a submit in between is not lost
            let notified = self.work_ready.notified();
            if let Some(job) = self.try_next_job().await {
                return job;
            }
            notified.await;
        }
    }

    /// Dequeue the next job without waiting.
    pub async fn try_next_job(&self) -> Option<Job> {
        let mut state = self.state.lock().await;
        let job = state.store.dequeue()?;

        info!(job_id = %job.id, connection_id = %job.owner, "Job started");
        let events = state.events();
        events.to_owner(
            &job.owner,
            ServerMessage::JobStarted {
                job_id: job.id.clone(),
            },
        );
        events.queue_status();
        Some(job)
    }

    /// Record progress for the processing job and forward it to the owner.
    ///
    /// Lower values are dropped. A repeated value is forwarded only when it
    /// carries a message. Returns whether anything was sent.
    pub async fn report_progress(
        &self,
        job_id: &JobId,
        percent: u8,
        message: Option<String>,
    ) -> bool {
        let mut state = self.state.lock().await;

        let step = state.store.record_progress(job_id, percent);
        let forward = match step {
            ProgressStep::Advanced => true,
            ProgressStep::Repeated => message.is_some(),
            ProgressStep::Dropped => false,
        };
        if !forward {
            debug!(job_id = %job_id, percent, ?step, "Progress not forwarded");
            return false;
        }

        let Some(job) = state.store.processing() else {
            return false;
        };
        let owner = job.owner.clone();
        let percent = job.progress.unwrap_or(percent);

        state
            .events()
            .to_owner(&owner, ServerMessage::progress(job_id.clone(), percent, message))
    }

    /// Finish the processing job.
    ///
    /// The owner gets exactly one terminal event (discarded if it left), the
    /// job is removed, and everyone gets a `queue_status`.
    pub async fn complete(&self, job_id: &JobId, outcome: JobOutcome) -> QueueResult<()> {
        let mut state = self.state.lock().await;

        let job = state.store.complete(job_id, outcome.is_success())?;
        let duration = job
            .started_at
            .map(|started| (chrono::Utc::now() - started).num_milliseconds() as f64 / 1000.0);
        metrics::record_job_completed(outcome.as_str(), duration);

        let message = match outcome {
            JobOutcome::Succeeded(result) => {
                info!(
                    job_id = %job.id,
                    size_bytes = result.size_bytes,
                    "Job succeeded"
                );
                ServerMessage::succeeded(job.id.clone(), result)
            }
            JobOutcome::Failed { reason } => {
                warn!(job_id = %job.id, reason = %reason, "Job failed");
                ServerMessage::failed(job.id.clone(), reason)
            }
        };

        let events = state.events();
        events.to_owner(&job.owner, message);
        events.queue_status();
        let more_work = state.store.queue_length() > 0;
        drop(state);

        if more_work {
            self.work_ready.notify_one();
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn snapshot(&self) -> QueueSnapshot {
        self.state.lock().await.store.snapshot()
    }

    pub async fn position_of(&self, job_id: &JobId) -> Option<u32> {
        self.state.lock().await.store.position_of(job_id)
    }

    pub async fn job_view(&self, job_id: &JobId) -> Option<JobView> {
        self.state.lock().await.store.view(job_id)
    }

    pub async fn active_job_of(&self, id: &ConnectionId) -> Option<JobId> {
        self.state.lock().await.store.active_job_of(id).cloned()
    }

    pub async fn connected_users(&self) -> usize {
        self.state.lock().await.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio_test::{assert_err, assert_ok};
    use vexport_models::{JobState, MediaSource, ResultRef};

    type Rx = mpsc::UnboundedReceiver<ServerMessage>;

    fn inputs() -> JobInputs {
        JobInputs::video_only(MediaSource::url("https://example.com/v.mp4"))
    }

    fn result() -> JobResult {
        JobResult {
            result_ref: ResultRef::Location {
                url: "https://cdn.example.com/out.mp4".to_string(),
            },
            size_bytes: 2048,
        }
    }

    fn drain(rx: &mut Rx) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    fn last_position(messages: &[ServerMessage]) -> Option<Option<u32>> {
        messages.iter().rev().find_map(|m| match m {
            ServerMessage::QueueStatus { your_position, .. } => Some(*your_position),
            _ => None,
        })
    }

    #[tokio::test]
    async fn test_register_sends_welcome_then_status() {
        let queue = JobQueue::new();
        let (id, mut rx) = queue.register().await;

        let messages = drain(&mut rx);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ServerMessage::welcome(id));
        assert!(matches!(
            messages[1],
            ServerMessage::QueueStatus {
                snapshot: QueueSnapshot {
                    connected_users: 1,
                    ..
                },
                your_position: None,
            }
        ));

        let (_other, _rx) = queue.register().await;
        let messages = drain(&mut rx);
        assert!(matches!(
            messages[..],
            [ServerMessage::QueueStatus {
                snapshot: QueueSnapshot {
                    connected_users: 2,
                    ..
                },
                ..
            }]
        ));
    }

    #[tokio::test]
    async fn test_submit_accepts_and_broadcasts() {
        let queue = JobQueue::new();
        let (a, mut rx_a) = queue.register().await;
        let (_b, mut rx_b) = queue.register().await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        let job_id = assert_ok!(queue.submit(&a, inputs(), ProcessingParams::default()).await);

        let messages = drain(&mut rx_a);
        assert_eq!(
            messages[0],
            ServerMessage::JobAccepted {
                job_id: job_id.clone(),
                position: 1
            }
        );
        assert_eq!(last_position(&messages), Some(Some(1)));
        assert_eq!(last_position(&drain(&mut rx_b)), Some(None));
    }

    #[tokio::test]
    async fn test_rejection_leaves_queue_untouched() {
        let queue = JobQueue::new();
        let (a, mut rx_a) = queue.register().await;
        let (_b, mut rx_b) = queue.register().await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        let params = ProcessingParams {
            video_speed: 3.0,
            ..Default::default()
        };
        assert_err!(queue.submit(&a, inputs(), params).await);

        let messages = drain(&mut rx_a);
        assert_eq!(messages.len(), 1, "no broadcast on rejection");
        match &messages[0] {
            ServerMessage::JobRejected { violations, .. } => {
                assert_eq!(violations[0].field, "video_speed");
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(queue.snapshot().await.queue_length, 0);
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected() {
        let queue = JobQueue::new();
        let (a, mut rx) = queue.register().await;
        queue
            .submit(&a, inputs(), ProcessingParams::default())
            .await
            .unwrap();
        drain(&mut rx);

        let err = queue
            .submit(&a, inputs(), ProcessingParams::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "duplicate");
        assert!(matches!(
            drain(&mut rx)[..],
            [ServerMessage::JobRejected { .. }]
        ));
        assert_eq!(queue.snapshot().await.queue_length, 1);
    }

    #[tokio::test]
    async fn test_positions_across_lifecycle() {
        let queue = JobQueue::new();
        let (a, mut rx_a) = queue.register().await;
        let (b, mut rx_b) = queue.register().await;
        let (c, mut rx_c) = queue.register().await;

        let job_a = queue.submit(&a, inputs(), ProcessingParams::default()).await.unwrap();
        queue.submit(&b, inputs(), ProcessingParams::default()).await.unwrap();
        let job_c = queue.submit(&c, inputs(), ProcessingParams::default()).await.unwrap();
        assert_eq!(queue.position_of(&job_c).await, Some(3));

        let started = queue.next_job().await;
        assert_eq!(started.id, job_a);
        assert_eq!(last_position(&drain(&mut rx_a)), Some(Some(0)));
        assert_eq!(last_position(&drain(&mut rx_b)), Some(Some(1)));
        assert_eq!(last_position(&drain(&mut rx_c)), Some(Some(2)));

        queue.complete(&job_a, JobOutcome::Succeeded(result())).await.unwrap();
        let messages = drain(&mut rx_a);
        assert!(matches!(messages[0], ServerMessage::JobSucceeded { size_bytes: 2048, .. }));
        assert_eq!(last_position(&messages), Some(None));

        queue.next_job().await;
        assert_eq!(last_position(&drain(&mut rx_b)), Some(Some(0)));
        assert_eq!(last_position(&drain(&mut rx_c)), Some(Some(1)));
    }

    #[tokio::test]
    async fn test_progress_forwarding_rules() {
        let queue = JobQueue::new();
        let (a, mut rx) = queue.register().await;
        let job_id = queue.submit(&a, inputs(), ProcessingParams::default()).await.unwrap();

        assert!(!queue.report_progress(&job_id, 10, None).await, "not started yet");
        queue.next_job().await;
        drain(&mut rx);

        assert!(queue.report_progress(&job_id, 10, None).await);
        assert!(!queue.report_progress(&job_id, 10, None).await);
        assert!(queue.report_progress(&job_id, 10, Some("Encoding".into())).await);
        assert!(!queue.report_progress(&job_id, 5, Some("Back".into())).await);
        assert!(queue.report_progress(&job_id, 60, None).await);

        let percents: Vec<u8> = drain(&mut rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::Progress { percent, .. } => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, vec![10, 10, 60]);

        let view = queue.job_view(&job_id).await.unwrap();
        assert_eq!(view.state, JobState::Processing);
        assert_eq!(view.progress, Some(60));
    }

    #[tokio::test]
    async fn test_disconnect_while_queued_cancels() {
        let queue = JobQueue::new();
        let (a, _rx_a) = queue.register().await;
        let (b, _rx_b) = queue.register().await;
        let (_c, mut rx_c) = queue.register().await;

        queue.submit(&a, inputs(), ProcessingParams::default()).await.unwrap();
        let job_b = queue.submit(&b, inputs(), ProcessingParams::default()).await.unwrap();
        drain(&mut rx_c);

        queue.unregister(&b).await;
        assert!(queue.position_of(&job_b).await.is_none());

        let messages = drain(&mut rx_c);
        assert!(matches!(
            messages[..],
            [ServerMessage::QueueStatus {
                snapshot: QueueSnapshot {
                    connected_users: 2,
                    queue_length: 1,
                    processing: false,
                },
                ..
            }]
        ));

        let first = queue.next_job().await;
        assert_eq!(first.owner, a);
        assert!(queue.try_next_job().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_while_processing_discards_events() {
        let queue = JobQueue::new();
        let (a, rx_a) = queue.register().await;
        let (_b, mut rx_b) = queue.register().await;
        let job_id = queue.submit(&a, inputs(), ProcessingParams::default()).await.unwrap();
        queue.next_job().await;

        drop(rx_a);
        queue.unregister(&a).await;
        assert_eq!(queue.position_of(&job_id).await, Some(0));

        assert!(!queue.report_progress(&job_id, 50, None).await);
        assert_ok!(queue.complete(&job_id, JobOutcome::failed("boom")).await);

        let snapshot = queue.snapshot().await;
        assert!(!snapshot.processing);
        assert_eq!(snapshot.connected_users, 1);
        assert!(drain(&mut rx_b)
            .iter()
            .all(|m| matches!(m, ServerMessage::QueueStatus { .. })));
    }

    #[tokio::test]
    async fn test_next_job_wakes_on_submit() {
        let queue = Arc::new(JobQueue::new());
        let (a, _rx) = queue.register().await;

        let waiter = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.next_job().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        let job_id = queue.submit(&a, inputs(), ProcessingParams::default()).await.unwrap();
        let job = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(job.id, job_id);
    }

    #[tokio::test]
    async fn test_complete_unknown_job_errors() {
        let queue = JobQueue::new();
        assert_err!(queue.complete(&JobId::new(), JobOutcome::failed("x")).await);
    }
}
