//! Job and connection definitions for the processing queue.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::media::JobInputs;
use crate::params::ProcessingParams;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a realtime connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl ConnectionId {
    /// Generate a new random connection ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job lifecycle state.
///
/// Transitions only move forward: `Queued -> Processing -> Succeeded | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in the queue
    #[default]
    Queued,
    /// Currently held by the scheduler
    Processing,
    /// Finished with a result
    Succeeded,
    /// Finished with an error
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Whether `next` is a legal forward transition from this state.
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Queued, JobState::Processing)
                | (JobState::Processing, JobState::Succeeded)
                | (JobState::Processing, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rejected state change.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid job transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: JobState,
    pub to: JobState,
}

/// An admitted processing request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Connection that submitted the job
    pub owner: ConnectionId,

    /// Source media references
    pub inputs: JobInputs,

    /// Validated processing parameters
    pub params: ProcessingParams,

    /// Lifecycle state
    #[serde(default)]
    pub state: JobState,

    /// Admission timestamp
    pub enqueued_at: DateTime<Utc>,

    /// Admission sequence number, breaks `enqueued_at` ties
    pub sequence: u64,

    /// Progress (0-100), only set while processing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    /// Started at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a queued job.
    pub fn new(
        owner: ConnectionId,
        inputs: JobInputs,
        params: ProcessingParams,
        sequence: u64,
    ) -> Self {
        Self {
            id: JobId::new(),
            owner,
            inputs,
            params,
            state: JobState::Queued,
            enqueued_at: Utc::now(),
            sequence,
            progress: None,
            started_at: None,
        }
    }

    /// Move the job to `next`, rejecting backwards or skipping transitions.
    pub fn transition(&mut self, next: JobState) -> Result<(), InvalidTransition> {
        if !self.state.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }

        self.state = next;
        match next {
            JobState::Processing => {
                self.started_at = Some(Utc::now());
                self.progress = Some(0);
            }
            JobState::Succeeded | JobState::Failed => self.progress = None,
            JobState::Queued => {}
        }
        Ok(())
    }

    /// Record a progress value.
    ///
    /// Returns `false` when the job is not processing or the value would move
    /// progress backwards.
    pub fn record_progress(&mut self, percent: u8) -> bool {
        if self.state != JobState::Processing {
            return false;
        }
        let percent = percent.min(100);
        match self.progress {
            Some(current) if percent < current => false,
            _ => {
                self.progress = Some(percent);
                true
            }
        }
    }

    /// Ordering key: admission time, then admission sequence.
    pub fn order_key(&self) -> (DateTime<Utc>, u64) {
        (self.enqueued_at, self.sequence)
    }
}
