use std::collections::HashMap;

use async_trait::async_trait;

use crate::{
    ActiveSpecLine, DateRange, DemandForecastDaily, InventoryItemId, InventorySnapshot, ItemUsage,
    JobRun, JobRunId, LocationId, PurchaseOrder, ReorderInput, Result, Scope, SoldLine, TenantId,
    TheoreticalUsageDaily, VarianceFlag,
};

/// Core trait for inventory store implementations.
///
/// Exposes exactly the reads and writes the pipeline stages perform. Every
/// destructive-then-constructive write (`replace_*`, batch upserts) is
/// atomic: either the whole batch lands or nothing changes.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Opens a job run with status `running` and returns its id.
    async fn start_job_run(
        &self,
        job_name: &str,
        scope: Scope,
        params: serde_json::Value,
    ) -> Result<JobRunId>;

    /// Marks a job run `completed`.
    async fn complete_job_run(&self, id: JobRunId) -> Result<()>;

    /// Marks a job run `failed` with a human-readable error.
    async fn fail_job_run(&self, id: JobRunId, error: &str) -> Result<()>;

    /// Retrieves a job run. Returns None if it doesn't exist.
    async fn get_job_run(&self, id: JobRunId) -> Result<Option<JobRun>>;

    /// Sold lines of every closed order whose close date falls in `range`.
    async fn sold_lines(&self, scope: Scope, range: DateRange) -> Result<Vec<SoldLine>>;

    /// Lines of the active drink spec of every menu item in scope.
    async fn active_spec_lines(&self, scope: Scope) -> Result<Vec<ActiveSpecLine>>;

    /// Upserts usage rows keyed by (tenant, location, date, ingredient).
    ///
    /// Existing values are overwritten, never accumulated.
    async fn upsert_theoretical_usage(&self, rows: Vec<TheoreticalUsageDaily>) -> Result<u64>;

    async fn theoretical_usage(
        &self,
        scope: Scope,
        range: DateRange,
    ) -> Result<Vec<TheoreticalUsageDaily>>;

    /// Theoretical usage in `range` joined to the inventory items stocking
    /// each ingredient at the same tenant and location.
    async fn item_usage(&self, scope: Scope, range: DateRange) -> Result<Vec<ItemUsage>>;

    /// Deletes every forecast row in scope dated within `window`, then inserts
    /// `rows`, as one atomic unit.
    async fn replace_forecasts(
        &self,
        scope: Scope,
        window: DateRange,
        rows: Vec<DemandForecastDaily>,
    ) -> Result<u64>;

    async fn forecasts(&self, scope: Scope, range: DateRange) -> Result<Vec<DemandForecastDaily>>;

    /// Distinct (tenant, location) pairs that have at least one snapshot.
    async fn snapshot_locations(&self, scope: Scope) -> Result<Vec<(TenantId, LocationId)>>;

    /// The `limit` most recent snapshots of a location, newest first.
    async fn recent_snapshots(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        limit: usize,
    ) -> Result<Vec<InventorySnapshot>>;

    /// Inserts variance flags, ignoring any that conflict on
    /// (tenant, location, item, week_start_date). Returns the number inserted.
    async fn insert_variance_flags(&self, flags: Vec<VarianceFlag>) -> Result<u64>;

    async fn variance_flags(&self, scope: Scope) -> Result<Vec<VarianceFlag>>;

    /// Every reorder policy in scope with the vendor items offering its item.
    async fn reorder_inputs(&self, scope: Scope) -> Result<Vec<ReorderInput>>;

    /// Remaining ounces per item on the latest snapshot of each location.
    async fn latest_on_hand(&self, scope: Scope) -> Result<HashMap<InventoryItemId, f64>>;

    /// Deletes every draft purchase order (and its lines) in scope, then
    /// inserts `orders`, as one atomic unit.
    async fn replace_draft_orders(&self, scope: Scope, orders: Vec<PurchaseOrder>) -> Result<u64>;

    /// Purchase orders in scope with their lines.
    async fn purchase_orders(&self, scope: Scope) -> Result<Vec<PurchaseOrder>>;
}
