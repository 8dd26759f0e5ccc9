//! Application state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use vexport_queue::JobQueue;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ApiConfig>,
    pub queue: Arc<JobQueue>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(config: ApiConfig, queue: Arc<JobQueue>) -> Self {
        Self {
            config: Arc::new(config),
            queue,
            started_at: Utc::now(),
        }
    }
}
