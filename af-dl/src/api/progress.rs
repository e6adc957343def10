//! Progress polling endpoints

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::ProgressRecord;
use crate::AppState;

/// GET /progress/:job_id
///
/// Snapshot of one job's progress record
pub async fn job_progress(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<ProgressRecord>> {
    let store = state
        .registry
        .get(job_id)
        .ok_or_else(|| ApiError::NotFound(format!("Download job not found: {}", job_id)))?;
    Ok(Json(store.get()))
}

/// GET /progress
///
/// Record of the most recently submitted job, or an idle record when
/// nothing has been submitted (or it has been pruned).
pub async fn latest_progress(State(state): State<AppState>) -> Json<ProgressRecord> {
    let record = state
        .registry
        .latest()
        .map(|store| store.get())
        .unwrap_or_else(ProgressRecord::idle);
    Json(record)
}

/// Build progress routes
pub fn progress_routes() -> Router<AppState> {
    Router::new()
        .route("/progress", get(latest_progress))
        .route("/progress/:job_id", get(job_progress))
}
