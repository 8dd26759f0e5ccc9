//! Realtime message types.
//!
//! Every frame is a JSON object tagged by `type`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{ConnectionId, JobId};
use crate::media::{JobInputs, JobResult, ResultRef};
use crate::params::{ProcessingParams, Violation};

/// Messages sent by clients.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Submit a processing job
    SubmitJob {
        inputs: JobInputs,
        #[serde(default)]
        parameters: ProcessingParams,
    },
}

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueueSnapshot {
    pub connected_users: usize,
    /// Jobs waiting, excluding the one processing
    pub queue_length: usize,
    pub processing: bool,
}

/// Server message type labels (for metrics and logs).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServerMessageType {
    Welcome,
    JobAccepted,
    JobRejected,
    JobStarted,
    Progress,
    JobSucceeded,
    JobFailed,
    QueueStatus,
    Error,
}

impl ServerMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerMessageType::Welcome => "welcome",
            ServerMessageType::JobAccepted => "job_accepted",
            ServerMessageType::JobRejected => "job_rejected",
            ServerMessageType::JobStarted => "job_started",
            ServerMessageType::Progress => "progress",
            ServerMessageType::JobSucceeded => "job_succeeded",
            ServerMessageType::JobFailed => "job_failed",
            ServerMessageType::QueueStatus => "queue_status",
            ServerMessageType::Error => "error",
        }
    }
}

/// Messages sent by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once right after connecting
    Welcome {
        connection_id: ConnectionId,
        message: String,
    },

    /// Submission admitted
    JobAccepted { job_id: JobId, position: u32 },

    /// Submission refused; nothing was queued
    JobRejected {
        reason: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        violations: Vec<Violation>,
    },

    /// The scheduler picked the job up
    JobStarted { job_id: JobId },

    /// Progress update (0-100, non-decreasing per job)
    Progress {
        job_id: JobId,
        percent: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Terminal success
    JobSucceeded {
        job_id: JobId,
        result_ref: ResultRef,
        size_bytes: u64,
    },

    /// Terminal failure
    JobFailed { job_id: JobId, reason: String },

    /// Queue state, broadcast to every connection
    QueueStatus {
        #[serde(flatten)]
        snapshot: QueueSnapshot,
        /// Recipient's own job position: 1 = next, 0 = processing
        #[serde(default, skip_serializing_if = "Option::is_none")]
        your_position: Option<u32>,
    },

    /// Protocol-level problem with a client frame
    Error { message: String },
}

impl ServerMessage {
    /// Create a welcome message.
    pub fn welcome(connection_id: ConnectionId) -> Self {
        ServerMessage::Welcome {
            connection_id,
            message: "Connected to video processing server".to_string(),
        }
    }

    /// Create a rejection without field violations.
    pub fn rejected(reason: impl Into<String>) -> Self {
        ServerMessage::JobRejected {
            reason: reason.into(),
            violations: Vec::new(),
        }
    }

    /// Create a progress message.
    pub fn progress(job_id: JobId, percent: u8, message: Option<String>) -> Self {
        ServerMessage::Progress {
            job_id,
            percent: percent.min(100),
            message,
        }
    }

    /// Create a success message.
    pub fn succeeded(job_id: JobId, result: JobResult) -> Self {
        ServerMessage::JobSucceeded {
            job_id,
            result_ref: result.result_ref,
            size_bytes: result.size_bytes,
        }
    }

    /// Create a failure message.
    pub fn failed(job_id: JobId, reason: impl Into<String>) -> Self {
        ServerMessage::JobFailed {
            job_id,
            reason: reason.into(),
        }
    }

    /// Create a queue status message.
    pub fn queue_status(snapshot: QueueSnapshot, your_position: Option<u32>) -> Self {
        ServerMessage::QueueStatus {
            snapshot,
            your_position,
        }
    }

    /// Create a protocol error message.
    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    /// Get the message type.
    pub fn message_type(&self) -> ServerMessageType {
        match self {
            ServerMessage::Welcome { .. } => ServerMessageType::Welcome,
            ServerMessage::JobAccepted { .. } => ServerMessageType::JobAccepted,
            ServerMessage::JobRejected { .. } => ServerMessageType::JobRejected,
            ServerMessage::JobStarted { .. } => ServerMessageType::JobStarted,
            ServerMessage::Progress { .. } => ServerMessageType::Progress,
            ServerMessage::JobSucceeded { .. } => ServerMessageType::JobSucceeded,
            ServerMessage::JobFailed { .. } => ServerMessageType::JobFailed,
            ServerMessage::QueueStatus { .. } => ServerMessageType::QueueStatus,
            ServerMessage::Error { .. } => ServerMessageType::Error,
        }
    }

    /// Whether this ends a job's event stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerMessage::JobSucceeded { .. } | ServerMessage::JobFailed { .. }
        )
    }
}
