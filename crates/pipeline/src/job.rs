//! Job run bracketing for pipeline stages.

use std::fmt;
use std::future::Future;
use std::time::Instant;

use serde::Serialize;
use store::{InventoryStore, JobRunId, Scope};

use crate::{PipelineError, Result};

/// Names recorded on job runs, one per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    UsageAggregation,
    DemandForecast,
    VarianceReconciliation,
    Reorder,
}

impl JobName {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobName::UsageAggregation => "usage_aggregation",
            JobName::DemandForecast => "demand_forecast",
            JobName::VarianceReconciliation => "variance_reconciliation",
            JobName::Reorder => "reorder",
        }
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finished job run and the stage's summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome<T> {
    pub job_run_id: JobRunId,
    pub summary: T,
}

/// Opens a job run, executes one stage, and closes the run.
///
/// The run ends `completed` when the stage returns `Ok` and the completion is
/// recorded, and `failed` (with the error message) otherwise. The error is
/// always returned to the caller.
#[derive(Clone)]
pub struct JobRunner<S> {
    store: S,
}

impl<S: InventoryStore> JobRunner<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, job, params, work), fields(job = %job))]
    pub async fn run<T, F, Fut>(
        &self,
        job: JobName,
        scope: Scope,
        params: serde_json::Value,
        work: F,
    ) -> Result<JobOutcome<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let job_run_id = self
            .store
            .start_job_run(job.as_str(), scope, params)
            .await?;
        let started = Instant::now();
        tracing::info!(%job_run_id, "job run started");

        let result = work().await;

        metrics::histogram!("pipeline_job_duration_seconds", "job" => job.as_str())
            .record(started.elapsed().as_secs_f64());

        match result {
            Ok(summary) => {
                if let Err(err) = self.store.complete_job_run(job_run_id).await {
                    return Err(self.mark_failed(job, job_run_id, err.into()).await);
                }
                metrics::counter!(
                    "pipeline_job_runs_total",
                    "job" => job.as_str(),
                    "status" => "completed"
                )
                .increment(1);
                tracing::info!(%job_run_id, "job run completed");
                Ok(JobOutcome {
                    job_run_id,
                    summary,
                })
            }
            Err(err) => Err(self.mark_failed(job, job_run_id, err).await),
        }
    }

    /// Records `err` on the run and hands it back for the caller to return.
    async fn mark_failed(
        &self,
        job: JobName,
        job_run_id: JobRunId,
        err: PipelineError,
    ) -> PipelineError {
        let message = err.to_string();
        if let Err(mark_err) = self.store.fail_job_run(job_run_id, &message).await {
            tracing::error!(%job_run_id, error = %mark_err, "could not mark job run failed");
        }
        metrics::counter!(
            "pipeline_job_runs_total",
            "job" => job.as_str(),
            "status" => "failed"
        )
        .increment(1);
        tracing::error!(%job_run_id, error = %message, "job run failed");
        err
    }
}

#[cfg(test)]
mod tests {
    use store::{InMemoryStore, JobStatus, StoreError};

    use super::*;

    #[tokio::test]
    async fn successful_work_completes_run() {
        let store = InMemoryStore::new();
        let runner = JobRunner::new(store.clone());

        let outcome = runner
            .run(
                JobName::UsageAggregation,
                Scope::all(),
                serde_json::json!({"from": "2024-03-01"}),
                || async { Ok(42_u64) },
            )
            .await
            .unwrap();

        assert_eq!(outcome.summary, 42);
        let run = store.get_job_run(outcome.job_run_id).await.unwrap().unwrap();
        assert_eq!(run.job_name, "usage_aggregation");
        assert_eq!(run.status, JobStatus::Completed);
        assert!(run.finished_at.is_some());
        assert_eq!(run.params["from"], "2024-03-01");
        assert!(run.error.is_none());
    }

    #[tokio::test]
    async fn failed_work_marks_run_failed_and_reraises() {
        let store = InMemoryStore::new();
        let runner = JobRunner::new(store.clone());
        let job_run_id = JobRunId::new();

        let result: Result<JobOutcome<()>> = runner
            .run(
                JobName::Reorder,
                Scope::all(),
                serde_json::Value::Null,
                || async move { Err(StoreError::JobRunNotFound(job_run_id).into()) },
            )
            .await;

        assert!(matches!(
            result,
            Err(PipelineError::Store(StoreError::JobRunNotFound(_)))
        ));
        let runs = store.job_runs().await;
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, JobStatus::Failed);
        assert!(runs[0].finished_at.is_some());
        assert!(
            runs[0]
                .error
                .as_deref()
                .is_some_and(|e| e.contains("Job run not found"))
        );
    }
}
