use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;

use crate::{
    ActiveSpecLine, DateRange, DemandForecastDaily, DrinkSpec, IngredientId, InventoryItem,
    InventoryItemId, InventorySnapshot, ItemUsage, JobRun, JobRunId, JobStatus, LocationId,
    PurchaseOrder, PurchaseOrderStatus, ReorderInput, ReorderPolicy, Result, Scope, SoldLine,
    SoldOrder, StoreError, TenantId, TheoreticalUsageDaily, VarianceFlag, VendorItem,
    store::InventoryStore,
};

type UsageKey = (TenantId, LocationId, NaiveDate, IngredientId);
type FlagKey = (TenantId, LocationId, InventoryItemId, NaiveDate);

#[derive(Default)]
struct Tables {
    inventory_items: BTreeMap<InventoryItemId, InventoryItem>,
    drink_specs: Vec<DrinkSpec>,
    sold_orders: Vec<SoldOrder>,
    theoretical_usage: BTreeMap<UsageKey, TheoreticalUsageDaily>,
    forecasts: Vec<DemandForecastDaily>,
    snapshots: Vec<InventorySnapshot>,
    variance_flags: BTreeMap<FlagKey, VarianceFlag>,
    reorder_policies: BTreeMap<InventoryItemId, ReorderPolicy>,
    vendor_items: Vec<VendorItem>,
    purchase_orders: Vec<PurchaseOrder>,
    job_runs: HashMap<JobRunId, JobRun>,
}

/// In-memory inventory store implementation for testing.
///
/// All tables live behind a single lock, so every write method is atomic
/// with respect to concurrent readers, matching the transactional
/// PostgreSQL implementation.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_inventory_item(&self, item: InventoryItem) {
        self.tables
            .write()
            .await
            .inventory_items
            .insert(item.id, item);
    }

    /// Adds a drink spec version.
    ///
    /// Adding an active version deactivates every other version for the same
    /// (location, menu item), keeping exactly one active.
    pub async fn add_drink_spec(&self, spec: DrinkSpec) {
        let mut tables = self.tables.write().await;
        if spec.active {
            for existing in tables.drink_specs.iter_mut().filter(|s| {
                s.location_id == spec.location_id && s.menu_item_id == spec.menu_item_id
            }) {
                existing.active = false;
            }
        }
        tables.drink_specs.push(spec);
    }

    pub async fn record_sold_order(&self, order: SoldOrder) {
        self.tables.write().await.sold_orders.push(order);
    }

    /// Records a physical count, replacing any count already taken at the
    /// same location on the same date.
    pub async fn record_snapshot(&self, snapshot: InventorySnapshot) {
        let mut tables = self.tables.write().await;
        tables.snapshots.retain(|s| {
            !(s.location_id == snapshot.location_id && s.count_date == snapshot.count_date)
        });
        tables.snapshots.push(snapshot);
    }

    /// Sets the reorder policy for an item, replacing any existing one.
    pub async fn set_reorder_policy(&self, policy: ReorderPolicy) {
        self.tables
            .write()
            .await
            .reorder_policies
            .insert(policy.inventory_item_id, policy);
    }

    pub async fn add_vendor_item(&self, vendor_item: VendorItem) {
        self.tables.write().await.vendor_items.push(vendor_item);
    }

    /// Inserts a purchase order directly, e.g. an already approved one.
    pub async fn insert_purchase_order(&self, order: PurchaseOrder) {
        self.tables.write().await.purchase_orders.push(order);
    }

    /// Writes usage rows directly, bypassing aggregation.
    pub async fn seed_theoretical_usage(&self, rows: Vec<TheoreticalUsageDaily>) {
        let mut tables = self.tables.write().await;
        for row in rows {
            let key = (
                row.tenant_id,
                row.location_id,
                row.usage_date,
                row.ingredient_id,
            );
            tables.theoretical_usage.insert(key, row);
        }
    }

    /// Returns every job run, oldest first.
    pub async fn job_runs(&self) -> Vec<JobRun> {
        let tables = self.tables.read().await;
        let mut runs: Vec<_> = tables.job_runs.values().cloned().collect();
        runs.sort_by_key(|r| r.started_at);
        runs
    }

    async fn finish_job_run(
        &self,
        id: JobRunId,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let run = tables
            .job_runs
            .get_mut(&id)
            .ok_or(StoreError::JobRunNotFound(id))?;
        run.status = status;
        run.finished_at = Some(Utc::now());
        run.error = error;
        Ok(())
    }
}

#[async_trait]
impl InventoryStore for InMemoryStore {
    async fn start_job_run(
        &self,
        job_name: &str,
        scope: Scope,
        params: serde_json::Value,
    ) -> Result<JobRunId> {
        let run = JobRun {
            id: JobRunId::new(),
            job_name: job_name.to_string(),
            tenant_id: scope.tenant_id,
            location_id: scope.location_id,
            status: JobStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            params,
            error: None,
        };
        let id = run.id;
        self.tables.write().await.job_runs.insert(id, run);
        Ok(id)
    }

    async fn complete_job_run(&self, id: JobRunId) -> Result<()> {
        self.finish_job_run(id, JobStatus::Completed, None).await
    }

    async fn fail_job_run(&self, id: JobRunId, error: &str) -> Result<()> {
        self.finish_job_run(id, JobStatus::Failed, Some(error.to_string()))
            .await
    }

    async fn get_job_run(&self, id: JobRunId) -> Result<Option<JobRun>> {
        Ok(self.tables.read().await.job_runs.get(&id).cloned())
    }

    async fn sold_lines(&self, scope: Scope, range: DateRange) -> Result<Vec<SoldLine>> {
        let tables = self.tables.read().await;
        let lines = tables
            .sold_orders
            .iter()
            .filter(|o| scope.matches(o.tenant_id, o.location_id))
            .filter_map(|o| o.usage_date().map(|d| (o, d)))
            .filter(|(_, date)| range.contains(*date))
            .flat_map(|(o, usage_date)| {
                o.items.iter().map(move |item| SoldLine {
                    tenant_id: o.tenant_id,
                    location_id: o.location_id,
                    usage_date,
                    menu_item_id: item.menu_item_id,
                    quantity: item.quantity as i64,
                })
            })
            .collect();
        Ok(lines)
    }

    async fn active_spec_lines(&self, scope: Scope) -> Result<Vec<ActiveSpecLine>> {
        let tables = self.tables.read().await;
        let lines = tables
            .drink_specs
            .iter()
            .filter(|s| s.active && scope.matches(s.tenant_id, s.location_id))
            .flat_map(|s| {
                s.lines.iter().map(move |l| ActiveSpecLine {
                    tenant_id: s.tenant_id,
                    location_id: s.location_id,
                    menu_item_id: s.menu_item_id,
                    ingredient_id: l.ingredient_id,
                    ounces: l.ounces,
                })
            })
            .collect();
        Ok(lines)
    }

    async fn upsert_theoretical_usage(&self, rows: Vec<TheoreticalUsageDaily>) -> Result<u64> {
        let count = rows.len() as u64;
        self.seed_theoretical_usage(rows).await;
        Ok(count)
    }

    async fn theoretical_usage(
        &self,
        scope: Scope,
        range: DateRange,
    ) -> Result<Vec<TheoreticalUsageDaily>> {
        let tables = self.tables.read().await;
        Ok(tables
            .theoretical_usage
            .values()
            .filter(|u| scope.matches(u.tenant_id, u.location_id) && range.contains(u.usage_date))
            .cloned()
            .collect())
    }

    async fn item_usage(&self, scope: Scope, range: DateRange) -> Result<Vec<ItemUsage>> {
        let tables = self.tables.read().await;
        let mut rows = Vec::new();
        for usage in tables
            .theoretical_usage
            .values()
            .filter(|u| scope.matches(u.tenant_id, u.location_id) && range.contains(u.usage_date))
        {
            for item in tables.inventory_items.values().filter(|i| {
                i.ingredient_id == usage.ingredient_id
                    && i.location_id == usage.location_id
                    && i.tenant_id == usage.tenant_id
            }) {
                rows.push(ItemUsage {
                    tenant_id: usage.tenant_id,
                    location_id: usage.location_id,
                    inventory_item_id: item.id,
                    usage_date: usage.usage_date,
                    usage_oz: usage.usage_oz,
                });
            }
        }
        rows.sort_by(|a, b| {
            a.inventory_item_id
                .cmp(&b.inventory_item_id)
                .then(a.usage_date.cmp(&b.usage_date))
        });
        Ok(rows)
    }

    async fn replace_forecasts(
        &self,
        scope: Scope,
        window: DateRange,
        rows: Vec<DemandForecastDaily>,
    ) -> Result<u64> {
        let mut tables = self.tables.write().await;
        tables.forecasts.retain(|f| {
            !(scope.matches(f.tenant_id, f.location_id) && window.contains(f.forecast_date))
        });
        let count = rows.len() as u64;
        tables.forecasts.extend(rows);
        Ok(count)
    }

    async fn forecasts(&self, scope: Scope, range: DateRange) -> Result<Vec<DemandForecastDaily>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<_> = tables
            .forecasts
            .iter()
            .filter(|f| {
                scope.matches(f.tenant_id, f.location_id) && range.contains(f.forecast_date)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.inventory_item_id
                .cmp(&b.inventory_item_id)
                .then(a.forecast_date.cmp(&b.forecast_date))
        });
        Ok(rows)
    }

    async fn snapshot_locations(&self, scope: Scope) -> Result<Vec<(TenantId, LocationId)>> {
        let tables = self.tables.read().await;
        let locations: BTreeSet<_> = tables
            .snapshots
            .iter()
            .filter(|s| scope.matches(s.tenant_id, s.location_id))
            .map(|s| (s.tenant_id, s.location_id))
            .collect();
        Ok(locations.into_iter().collect())
    }

    async fn recent_snapshots(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        limit: usize,
    ) -> Result<Vec<InventorySnapshot>> {
        let tables = self.tables.read().await;
        let mut snapshots: Vec<_> = tables
            .snapshots
            .iter()
            .filter(|s| s.tenant_id == tenant_id && s.location_id == location_id)
            .cloned()
            .collect();
        snapshots.sort_by(|a, b| b.count_date.cmp(&a.count_date));
        snapshots.truncate(limit);
        Ok(snapshots)
    }

    async fn insert_variance_flags(&self, flags: Vec<VarianceFlag>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        let mut inserted = 0;
        for flag in flags {
            let key = (
                flag.tenant_id,
                flag.location_id,
                flag.inventory_item_id,
                flag.week_start_date,
            );
            if let std::collections::btree_map::Entry::Vacant(slot) =
                tables.variance_flags.entry(key)
            {
                slot.insert(flag);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn variance_flags(&self, scope: Scope) -> Result<Vec<VarianceFlag>> {
        let tables = self.tables.read().await;
        Ok(tables
            .variance_flags
            .values()
            .filter(|f| scope.matches(f.tenant_id, f.location_id))
            .cloned()
            .collect())
    }

    async fn reorder_inputs(&self, scope: Scope) -> Result<Vec<ReorderInput>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reorder_policies
            .values()
            .filter(|p| scope.matches(p.tenant_id, p.location_id))
            .map(|policy| ReorderInput {
                policy: policy.clone(),
                vendor_items: tables
                    .vendor_items
                    .iter()
                    .filter(|v| v.inventory_item_id == policy.inventory_item_id)
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn latest_on_hand(&self, scope: Scope) -> Result<HashMap<InventoryItemId, f64>> {
        let tables = self.tables.read().await;
        let mut latest: HashMap<(TenantId, LocationId), &InventorySnapshot> = HashMap::new();
        for snapshot in tables
            .snapshots
            .iter()
            .filter(|s| scope.matches(s.tenant_id, s.location_id))
        {
            let entry = latest
                .entry((snapshot.tenant_id, snapshot.location_id))
                .or_insert(snapshot);
            if snapshot.count_date > entry.count_date {
                *entry = snapshot;
            }
        }
        Ok(latest
            .values()
            .flat_map(|s| s.lines.iter())
            .map(|l| (l.inventory_item_id, l.actual_remaining_oz))
            .collect())
    }

    async fn replace_draft_orders(&self, scope: Scope, orders: Vec<PurchaseOrder>) -> Result<u64> {
        let mut tables = self.tables.write().await;
        tables.purchase_orders.retain(|o| {
            !(o.status == PurchaseOrderStatus::Draft && scope.matches(o.tenant_id, o.location_id))
        });
        let count = orders.len() as u64;
        tables.purchase_orders.extend(orders);
        Ok(count)
    }

    async fn purchase_orders(&self, scope: Scope) -> Result<Vec<PurchaseOrder>> {
        let tables = self.tables.read().await;
        Ok(tables
            .purchase_orders
            .iter()
            .filter(|o| scope.matches(o.tenant_id, o.location_id))
            .cloned()
            .collect())
    }
}
