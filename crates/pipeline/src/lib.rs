//! The four-stage inventory pipeline.
//!
//! Each stage reads the previous stage's durable output from an
//! [`InventoryStore`](store::InventoryStore) and writes its own derived table:
//!
//! 1. [`UsageAggregator`]: sold drinks into ingredient ounces per day
//! 2. [`DemandForecaster`]: 14-day day-of-week usage forecast per item
//! 3. [`VarianceReconciler`]: physical counts vs. theoretical depletion
//! 4. [`ReorderEngine`]: draft purchase orders grouped by vendor
//!
//! Stages never call each other. [`Pipeline`] runs each one as an independent
//! unit of work bracketed by a job run.

pub mod config;
pub mod error;
pub mod forecast;
pub mod job;
pub mod reorder;
pub mod runner;
pub mod usage;
pub mod variance;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use forecast::{DemandForecaster, ForecastSummary, ForecastTrigger};
pub use job::{JobName, JobOutcome, JobRunner};
pub use reorder::{ReorderEngine, ReorderSummary, ReorderTrigger};
pub use runner::Pipeline;
pub use usage::{UsageAggregator, UsageSummary, UsageTrigger};
pub use variance::{VarianceReconciler, VarianceSummary, VarianceTrigger};
