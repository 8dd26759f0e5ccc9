//! Queue metrics.

use metrics::{counter, gauge, histogram};

use vexport_models::QueueSnapshot;

/// Metric names as constants for consistency.
pub mod names {
    pub const QUEUE_LENGTH: &str = "vexport_queue_length";
    pub const QUEUE_PROCESSING: &str = "vexport_queue_processing";
    pub const CONNECTED_USERS: &str = "vexport_connected_users";
    pub const JOBS_ADMITTED_TOTAL: &str = "vexport_jobs_admitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "vexport_jobs_rejected_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "vexport_jobs_cancelled_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vexport_jobs_completed_total";
    pub const JOB_DURATION_SECONDS: &str = "vexport_job_duration_seconds";
    pub const DELIVERY_MISSES_TOTAL: &str = "vexport_delivery_misses_total";
    pub const PROCESSING_ERRORS_TOTAL: &str = "vexport_processing_errors_total";
}

/// Update the queue gauges from a snapshot.
pub fn record_snapshot(snapshot: &QueueSnapshot) {
    gauge!(names::QUEUE_LENGTH).set(snapshot.queue_length as f64);
    gauge!(names::QUEUE_PROCESSING).set(if snapshot.processing { 1.0 } else { 0.0 });
    gauge!(names::CONNECTED_USERS).set(snapshot.connected_users as f64);
}

pub fn record_job_admitted() {
    counter!(names::JOBS_ADMITTED_TOTAL).increment(1);
}

pub fn record_job_rejected(kind: &'static str) {
    counter!(names::JOBS_REJECTED_TOTAL, "reason" => kind).increment(1);
}

pub fn record_job_cancelled() {
    counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
}

/// Record a finished job and how long it was processing.
pub fn record_job_completed(outcome: &'static str, duration_secs: Option<f64>) {
    counter!(names::JOBS_COMPLETED_TOTAL, "outcome" => outcome).increment(1);
    if let Some(secs) = duration_secs {
        histogram!(names::JOB_DURATION_SECONDS, "outcome" => outcome).record(secs);
    }
}

/// Record why a processor failed a job.
pub fn record_processing_error(kind: &'static str) {
    counter!(names::PROCESSING_ERRORS_TOTAL, "kind" => kind).increment(1);
}

/// Record an owner-scoped event dropped because the owner is gone.
pub fn record_delivery_miss(message_type: &'static str) {
    counter!(names::DELIVERY_MISSES_TOTAL, "type" => message_type).increment(1);
}
