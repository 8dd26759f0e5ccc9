//! Queue inspection handlers.

use axum::extract::{Path, State};
use axum::Json;

use vexport_models::{JobId, QueueSnapshot};
use vexport_queue::JobView;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Current queue snapshot.
pub async fn get_queue_status(State(state): State<AppState>) -> Json<QueueSnapshot> {
    Json(state.queue.snapshot().await)
}

/// A queued or processing job. Finished jobs leave the store and return 404.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let job_id = JobId::from_string(job_id);
    state
        .queue
        .job_view(&job_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Job {} not found", job_id)))
}
