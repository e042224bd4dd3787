//! HTTP trigger service for the inventory pipeline.
//!
//! Exposes one endpoint per pipeline stage plus job run lookup, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use pipeline::{Pipeline, PipelineConfig};
use store::InventoryStore;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::jobs::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: InventoryStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/jobs/usage", post(routes::jobs::usage::<S>))
        .route("/jobs/forecast", post(routes::jobs::forecast::<S>))
        .route("/jobs/variance", post(routes::jobs::variance::<S>))
        .route("/jobs/reorder", post(routes::jobs::reorder::<S>))
        .route("/job-runs/{id}", get(routes::job_runs::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state around a store.
pub fn create_state<S: InventoryStore + Clone + 'static>(
    store: S,
    config: PipelineConfig,
) -> Arc<AppState<S>> {
    Arc::new(AppState {
        pipeline: Pipeline::new(store.clone(), config),
        store,
    })
}
