//! In-process job queue and realtime event fan-out.
//!
//! This crate provides:
//! - `JobStore`: ordered pending/active jobs and per-connection metadata
//! - `ConnectionRegistry`: live connections and their outbound sinks
//! - `EventBroadcaster`: owner-scoped events and per-recipient queue status
//! - `JobQueue`: the single lock domain tying them together
//! - `ProgressReporter`: bounded progress channel from processor to scheduler

pub mod broadcast;
pub mod error;
pub mod metrics;
pub mod progress;
pub mod queue;
pub mod registry;
pub mod store;

pub use broadcast::EventBroadcaster;
pub use error::{AdmissionError, AdmissionResult, DeliveryMiss, QueueError, QueueResult};
pub use progress::{ProgressReporter, ProgressUpdate};
pub use queue::{JobOutcome, JobQueue};
pub use registry::ConnectionRegistry;
pub use store::{JobStore, JobView, ProgressStep};
