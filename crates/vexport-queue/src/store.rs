//! Job store: waiting jobs, the active job and per-connection metadata.
//!
//! Pure data structure with no I/O and no locking. [`crate::JobQueue`] owns
//! one behind its mutex.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;

use vexport_models::{
    ConnectionId, Job, JobId, JobInputs, JobState, ProcessingParams, QueueSnapshot,
};

use crate::error::{AdmissionError, AdmissionResult, QueueError, QueueResult};

/// Per-connection bookkeeping.
#[derive(Debug, Clone, Default)]
struct Connection {
    /// At most one outstanding job per connection
    active_job_id: Option<JobId>,
}

/// Result of recording a progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStep {
    /// Progress moved forward
    Advanced,
    /// Same value as before
    Repeated,
    /// Lower than the current value, or the job is not processing
    Dropped,
}

/// Read-only view of a job still in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub job_id: JobId,
    pub state: JobState,
    /// 1-based queue rank, 0 while processing
    pub position: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    pub enqueued_at: DateTime<Utc>,
}

/// Ordered set of pending/active jobs.
#[derive(Debug, Default)]
pub struct JobStore {
    /// Waiting jobs in admission order
    queued: VecDeque<Job>,
    /// The single job being processed
    processing: Option<Job>,
    connections: HashMap<ConnectionId, Connection>,
    next_sequence: u64,
    last_enqueued_at: Option<DateTime<Utc>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Track a new connection. Returns `false` if it already exists.
    pub fn add_connection(&mut self, id: ConnectionId) -> bool {
        if self.connections.contains_key(&id) {
            return false;
        }
        self.connections.insert(id, Connection::default());
        true
    }

    /// Forget a connection.
    ///
    /// A queued job owned by it is removed and returned. A processing job is
    /// left running; only the ownership link is dropped.
    pub fn remove_connection(&mut self, id: &ConnectionId) -> Option<Job> {
        let connection = self.connections.remove(id)?;
        let job_id = connection.active_job_id?;

        let index = self.queued.iter().position(|job| job.id == job_id)?;
        self.queued.remove(index)
    }

    pub fn connected_users(&self) -> usize {
        self.connections.len()
    }

    /// The connection's outstanding job, if any.
    pub fn active_job_of(&self, id: &ConnectionId) -> Option<&JobId> {
        self.connections.get(id)?.active_job_id.as_ref()
    }

    // ------------------------------------------------------------------
    // Jobs
    // ------------------------------------------------------------------

    /// Validate and enqueue a job for `owner`.
    ///
    /// On error the store is left untouched.
    pub fn admit(
        &mut self,
        owner: &ConnectionId,
        inputs: JobInputs,
        params: ProcessingParams,
    ) -> AdmissionResult<JobId> {
        let violations = params.violations();
        if !violations.is_empty() {
            return Err(AdmissionError::Validation(violations));
        }

        let connection = self
            .connections
            .get_mut(owner)
            .ok_or_else(|| AdmissionError::UnknownConnection(owner.clone()))?;

        if let Some(job_id) = &connection.active_job_id {
            return Err(AdmissionError::DuplicateSubmission {
                job_id: job_id.clone(),
            });
        }

        self.next_sequence += 1;
        let mut job = Job::new(owner.clone(), inputs, params, self.next_sequence);

        // Keep enqueued_at in admission order even if the wall clock steps back
        if let Some(last) = self.last_enqueued_at {
            if job.enqueued_at < last {
                job.enqueued_at = last;
            }
        }
        self.last_enqueued_at = Some(job.enqueued_at);

        let job_id = job.id.clone();
        connection.active_job_id = Some(job_id.clone());
        self.queued.push_back(job);

        Ok(job_id)
    }

    /// Move the earliest queued job to processing.
    ///
    /// Returns `None` when nothing is queued or a job is already processing.
    pub fn dequeue(&mut self) -> Option<Job> {
        if self.processing.is_some() {
            return None;
        }

        let mut job = self.queued.pop_front()?;
        if let Err(e) = job.transition(JobState::Processing) {
            // Queued jobs are always in the Queued state
            tracing::error!(job_id = %job.id, error = %e, "Dropping job in unexpected state");
            return None;
        }

        self.processing = Some(job.clone());
        Some(job)
    }

    /// Record progress for the processing job.
    pub fn record_progress(&mut self, job_id: &JobId, percent: u8) -> ProgressStep {
        let Some(job) = self.processing.as_mut().filter(|job| &job.id == job_id) else {
            return ProgressStep::Dropped;
        };

        let before = job.progress;
        if !job.record_progress(percent) {
            return ProgressStep::Dropped;
        }
        if before == job.progress {
            ProgressStep::Repeated
        } else {
            ProgressStep::Advanced
        }
    }

    /// Finish the processing job and remove it from the store.
    ///
    /// The owner's `active_job_id` is cleared if the owner is still connected.
    pub fn complete(&mut self, job_id: &JobId, succeeded: bool) -> QueueResult<Job> {
        let is_current = self
            .processing
            .as_ref()
            .map(|job| &job.id == job_id)
            .unwrap_or(false);

        if !is_current {
            return Err(if self.queued.iter().any(|job| &job.id == job_id) {
                QueueError::not_processing(job_id)
            } else {
                QueueError::job_not_found(job_id)
            });
        }

        let mut job = self
            .processing
            .take()
            .ok_or_else(|| QueueError::job_not_found(job_id))?;

        let next = if succeeded {
            JobState::Succeeded
        } else {
            JobState::Failed
        };
        if let Err(e) = job.transition(next) {
            self.processing = Some(job);
            return Err(e.into());
        }

        if let Some(connection) = self.connections.get_mut(&job.owner) {
            if connection.active_job_id.as_ref() == Some(&job.id) {
                connection.active_job_id = None;
            }
        }

        Ok(job)
    }

    /// 1-based rank among queued jobs, 0 if processing, `None` if unknown.
    pub fn position_of(&self, job_id: &JobId) -> Option<u32> {
        if self.processing.as_ref().map(|job| &job.id) == Some(job_id) {
            return Some(0);
        }
        self.queued
            .iter()
            .position(|job| &job.id == job_id)
            .map(|index| index as u32 + 1)
    }

    pub fn get(&self, job_id: &JobId) -> Option<&Job> {
        self.processing
            .iter()
            .chain(self.queued.iter())
            .find(|job| &job.id == job_id)
    }

    pub fn view(&self, job_id: &JobId) -> Option<JobView> {
        let job = self.get(job_id)?;
        Some(JobView {
            job_id: job.id.clone(),
            state: job.state,
            position: self.position_of(job_id)?,
            progress: job.progress,
            enqueued_at: job.enqueued_at,
        })
    }

    pub fn processing(&self) -> Option<&Job> {
        self.processing.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing.is_some()
    }

    /// Number of jobs waiting (excludes the processing one).
    pub fn queue_length(&self) -> usize {
        self.queued.len()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            connected_users: self.connections.len(),
            queue_length: self.queued.len(),
            processing: self.processing.is_some(),
        }
    }
}
