//! Stage trigger endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use pipeline::{
    ForecastSummary, ForecastTrigger, JobOutcome, Pipeline, ReorderSummary, ReorderTrigger,
    UsageSummary, UsageTrigger, VarianceSummary, VarianceTrigger,
};
use serde::Serialize;
use store::{InventoryStore, JobRunId, JobStatus};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub pipeline: Pipeline<S>,
    pub store: S,
}

/// Response for a completed stage run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse<T> {
    pub job_run_id: JobRunId,
    pub status: JobStatus,
    pub summary: T,
}

impl<T> From<JobOutcome<T>> for JobResponse<T> {
    fn from(outcome: JobOutcome<T>) -> Self {
        Self {
            job_run_id: outcome.job_run_id,
            status: JobStatus::Completed,
            summary: outcome.summary,
        }
    }
}

/// POST /jobs/usage: aggregate theoretical usage over `[from, to]`.
#[tracing::instrument(skip(state))]
pub async fn usage<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(trigger): Json<UsageTrigger>,
) -> Result<Json<JobResponse<UsageSummary>>, ApiError> {
    let outcome = state.pipeline.aggregate_usage(trigger).await?;
    Ok(Json(outcome.into()))
}

/// POST /jobs/forecast: rebuild the forecast window from `runDate`.
#[tracing::instrument(skip(state))]
pub async fn forecast<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(trigger): Json<ForecastTrigger>,
) -> Result<Json<JobResponse<ForecastSummary>>, ApiError> {
    let outcome = state.pipeline.forecast_demand(trigger).await?;
    Ok(Json(outcome.into()))
}

/// POST /jobs/variance: flag variance between the two latest counts.
#[tracing::instrument(skip(state))]
pub async fn variance<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(trigger): Json<VarianceTrigger>,
) -> Result<Json<JobResponse<VarianceSummary>>, ApiError> {
    let outcome = state.pipeline.reconcile_variance(trigger).await?;
    Ok(Json(outcome.into()))
}

/// POST /jobs/reorder: replace draft purchase orders as of `runDate`.
#[tracing::instrument(skip(state))]
pub async fn reorder<S: InventoryStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(trigger): Json<ReorderTrigger>,
) -> Result<Json<JobResponse<ReorderSummary>>, ApiError> {
    let outcome = state.pipeline.draft_reorders(trigger).await?;
    Ok(Json(outcome.into()))
}
