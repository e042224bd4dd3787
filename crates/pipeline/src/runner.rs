//! Entry point that runs each stage inside a job run.

use store::InventoryStore;

use crate::{
    DemandForecaster, ForecastSummary, ForecastTrigger, JobName, JobOutcome, JobRunner,
    PipelineConfig, ReorderEngine, ReorderSummary, ReorderTrigger, Result, UsageAggregator,
    UsageSummary, UsageTrigger, VarianceReconciler, VarianceSummary, VarianceTrigger,
};

/// The four pipeline stages sharing one store and one policy config.
///
/// Every method records a job run carrying the trigger as its params. A
/// trigger that fails validation is rejected before any run is opened.
pub struct Pipeline<S> {
    runner: JobRunner<S>,
    usage: UsageAggregator<S>,
    forecast: DemandForecaster<S>,
    variance: VarianceReconciler<S>,
    reorder: ReorderEngine<S>,
}

impl<S: InventoryStore + Clone> Pipeline<S> {
    pub fn new(store: S, config: PipelineConfig) -> Self {
        Self {
            runner: JobRunner::new(store.clone()),
            usage: UsageAggregator::new(store.clone()),
            forecast: DemandForecaster::new(store.clone(), config),
            variance: VarianceReconciler::new(store.clone(), config),
            reorder: ReorderEngine::new(store),
        }
    }

    pub async fn aggregate_usage(
        &self,
        trigger: UsageTrigger,
    ) -> Result<JobOutcome<UsageSummary>> {
        trigger.validate()?;
        self.runner
            .run(
                JobName::UsageAggregation,
                trigger.scope,
                serde_json::to_value(trigger)?,
                || self.usage.run(trigger),
            )
            .await
    }

    pub async fn forecast_demand(
        &self,
        trigger: ForecastTrigger,
    ) -> Result<JobOutcome<ForecastSummary>> {
        self.runner
            .run(
                JobName::DemandForecast,
                trigger.scope,
                serde_json::to_value(trigger)?,
                || self.forecast.run(trigger),
            )
            .await
    }

    pub async fn reconcile_variance(
        &self,
        trigger: VarianceTrigger,
    ) -> Result<JobOutcome<VarianceSummary>> {
        self.runner
            .run(
                JobName::VarianceReconciliation,
                trigger.scope,
                serde_json::to_value(trigger)?,
                || self.variance.run(trigger),
            )
            .await
    }

    pub async fn draft_reorders(
        &self,
        trigger: ReorderTrigger,
    ) -> Result<JobOutcome<ReorderSummary>> {
        self.runner
            .run(
                JobName::Reorder,
                trigger.scope,
                serde_json::to_value(trigger)?,
                || self.reorder.run(trigger),
            )
            .await
    }
}
