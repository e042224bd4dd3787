//! Job run lookup endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use store::{InventoryStore, JobRun, JobRunId};

use crate::error::ApiError;
use crate::routes::jobs::AppState;

/// GET /job-runs/{id}: load a job run by ID.
#[tracing::instrument(skip(state))]
pub async fn get<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<JobRun>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid job run ID: {e}")))?;

    let run = state
        .store
        .get_job_run(JobRunId::from_uuid(uuid))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Job run {id} not found")))?;

    Ok(Json(run))
}
