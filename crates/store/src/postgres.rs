use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    ActiveSpecLine, DateRange, DemandForecastDaily, IngredientId, InventoryItemId,
    InventorySnapshot, InventorySnapshotLine, ItemUsage, JobRun, JobRunId, LocationId, MenuItemId,
    Money, PurchaseOrder, PurchaseOrderId, PurchaseOrderLine, ReorderInput, ReorderPolicy, Result,
    Scope, SnapshotId, SoldLine, StoreError, TenantId, TheoreticalUsageDaily, VarianceFlag,
    VendorId, VendorItem, store::InventoryStore,
};

/// PostgreSQL-backed inventory store implementation.
///
/// Every replace/upsert batch runs in a single transaction, so a failure
/// part-way leaves the previous rows in place.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Splits a scope into the optional bind parameters used by
/// `($n::uuid IS NULL OR column = $n)` filters.
fn scope_params(scope: Scope) -> (Option<Uuid>, Option<Uuid>) {
    (
        scope.tenant_id.map(|t| t.as_uuid()),
        scope.location_id.map(|l| l.as_uuid()),
    )
}

impl PostgresStore {
    /// Creates a new PostgreSQL inventory store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn finish_job_run(&self, id: JobRunId, status: &str, error: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE job_runs
            SET status = $2, finished_at = NOW(), error = $3
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(status)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::JobRunNotFound(id));
        }
        Ok(())
    }

    fn row_to_job_run(row: PgRow) -> Result<JobRun> {
        let status: String = row.try_get("status")?;
        Ok(JobRun {
            id: JobRunId::from_uuid(row.try_get("id")?),
            job_name: row.try_get("job_name")?,
            tenant_id: row
                .try_get::<Option<Uuid>, _>("tenant_id")?
                .map(TenantId::from_uuid),
            location_id: row
                .try_get::<Option<Uuid>, _>("location_id")?
                .map(LocationId::from_uuid),
            status: status.parse()?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            params: row.try_get("params")?,
            error: row.try_get("error")?,
        })
    }

    fn row_to_forecast(row: PgRow) -> Result<DemandForecastDaily> {
        Ok(DemandForecastDaily {
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            location_id: LocationId::from_uuid(row.try_get("location_id")?),
            inventory_item_id: InventoryItemId::from_uuid(row.try_get("inventory_item_id")?),
            forecast_date: row.try_get("forecast_date")?,
            forecast_usage_oz: row.try_get("forecast_usage_oz")?,
            method: row.try_get("method")?,
        })
    }

    fn row_to_variance_flag(row: PgRow) -> Result<VarianceFlag> {
        let severity: String = row.try_get("severity")?;
        Ok(VarianceFlag {
            tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
            location_id: LocationId::from_uuid(row.try_get("location_id")?),
            inventory_item_id: InventoryItemId::from_uuid(row.try_get("inventory_item_id")?),
            week_start_date: row.try_get("week_start_date")?,
            expected_remaining_oz: row.try_get("expected_remaining_oz")?,
            actual_remaining_oz: row.try_get("actual_remaining_oz")?,
            variance_oz: row.try_get("variance_oz")?,
            variance_pct: row.try_get("variance_pct")?,
            severity: severity.parse()?,
        })
    }

    fn row_to_vendor_item(row: &PgRow) -> Result<VendorItem> {
        Ok(VendorItem {
            vendor_id: VendorId::from_uuid(row.try_get("vendor_id")?),
            inventory_item_id: InventoryItemId::from_uuid(row.try_get("inventory_item_id")?),
            vendor_sku: row.try_get("vendor_sku")?,
            unit_size_oz: row.try_get("unit_size_oz")?,
            unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
            lead_time_days: row.try_get("lead_time_days")?,
            preferred: row.try_get("preferred")?,
        })
    }
}

#[async_trait]
impl InventoryStore for PostgresStore {
    async fn start_job_run(
        &self,
        job_name: &str,
        scope: Scope,
        params: serde_json::Value,
    ) -> Result<JobRunId> {
        let id = JobRunId::new();
        let (tenant_id, location_id) = scope_params(scope);
        sqlx::query(
            r#"
            INSERT INTO job_runs (id, job_name, tenant_id, location_id, status, params)
            VALUES ($1, $2, $3, $4, 'running', $5)
            "#,
        )
        .bind(id.as_uuid())
        .bind(job_name)
        .bind(tenant_id)
        .bind(location_id)
        .bind(params)
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    async fn complete_job_run(&self, id: JobRunId) -> Result<()> {
        self.finish_job_run(id, "completed", None).await
    }

    async fn fail_job_run(&self, id: JobRunId, error: &str) -> Result<()> {
        self.finish_job_run(id, "failed", Some(error)).await
    }

    async fn get_job_run(&self, id: JobRunId) -> Result<Option<JobRun>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, job_name, tenant_id, location_id, status, started_at, finished_at, params, error
            FROM job_runs
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_job_run).transpose()
    }

    async fn sold_lines(&self, scope: Scope, range: DateRange) -> Result<Vec<SoldLine>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT o.tenant_id,
                   o.location_id,
                   (o.closed_at AT TIME ZONE 'UTC')::date AS usage_date,
                   i.menu_item_id,
                   i.quantity::BIGINT AS quantity
            FROM sold_orders o
            JOIN sold_order_items i ON i.sold_order_id = o.id
            WHERE o.closed_at IS NOT NULL
              AND (o.closed_at AT TIME ZONE 'UTC')::date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR o.tenant_id = $3)
              AND ($4::uuid IS NULL OR o.location_id = $4)
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<SoldLine> {
                Ok(SoldLine {
                    tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    usage_date: row.try_get("usage_date")?,
                    menu_item_id: MenuItemId::from_uuid(row.try_get("menu_item_id")?),
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect()
    }

    async fn active_spec_lines(&self, scope: Scope) -> Result<Vec<ActiveSpecLine>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT s.tenant_id, s.location_id, s.menu_item_id, l.ingredient_id, l.ounces
            FROM drink_specs s
            JOIN drink_spec_lines l ON l.drink_spec_id = s.id
            WHERE s.active
              AND ($1::uuid IS NULL OR s.tenant_id = $1)
              AND ($2::uuid IS NULL OR s.location_id = $2)
            ORDER BY s.location_id, s.menu_item_id, l.position
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ActiveSpecLine> {
                Ok(ActiveSpecLine {
                    tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    menu_item_id: MenuItemId::from_uuid(row.try_get("menu_item_id")?),
                    ingredient_id: IngredientId::from_uuid(row.try_get("ingredient_id")?),
                    ounces: row.try_get("ounces")?,
                })
            })
            .collect()
    }

    async fn upsert_theoretical_usage(&self, rows: Vec<TheoreticalUsageDaily>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut written = 0;

        for row in &rows {
            written += sqlx::query(
                r#"
                INSERT INTO theoretical_usage_daily (tenant_id, location_id, usage_date, ingredient_id, usage_oz)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (tenant_id, location_id, usage_date, ingredient_id)
                DO UPDATE SET usage_oz = EXCLUDED.usage_oz
                "#,
            )
            .bind(row.tenant_id.as_uuid())
            .bind(row.location_id.as_uuid())
            .bind(row.usage_date)
            .bind(row.ingredient_id.as_uuid())
            .bind(row.usage_oz)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(written)
    }

    async fn theoretical_usage(
        &self,
        scope: Scope,
        range: DateRange,
    ) -> Result<Vec<TheoreticalUsageDaily>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, location_id, usage_date, ingredient_id, usage_oz
            FROM theoretical_usage_daily
            WHERE usage_date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR tenant_id = $3)
              AND ($4::uuid IS NULL OR location_id = $4)
            ORDER BY tenant_id, location_id, usage_date, ingredient_id
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<TheoreticalUsageDaily> {
                Ok(TheoreticalUsageDaily {
                    tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    usage_date: row.try_get("usage_date")?,
                    ingredient_id: IngredientId::from_uuid(row.try_get("ingredient_id")?),
                    usage_oz: row.try_get("usage_oz")?,
                })
            })
            .collect()
    }

    async fn item_usage(&self, scope: Scope, range: DateRange) -> Result<Vec<ItemUsage>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT u.tenant_id, u.location_id, ii.id AS inventory_item_id, u.usage_date, u.usage_oz
            FROM theoretical_usage_daily u
            JOIN inventory_items ii
              ON ii.ingredient_id = u.ingredient_id
             AND ii.location_id = u.location_id
             AND ii.tenant_id = u.tenant_id
            WHERE u.usage_date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR u.tenant_id = $3)
              AND ($4::uuid IS NULL OR u.location_id = $4)
            ORDER BY ii.id, u.usage_date
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<ItemUsage> {
                Ok(ItemUsage {
                    tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    inventory_item_id: InventoryItemId::from_uuid(
                        row.try_get("inventory_item_id")?,
                    ),
                    usage_date: row.try_get("usage_date")?,
                    usage_oz: row.try_get("usage_oz")?,
                })
            })
            .collect()
    }

    async fn replace_forecasts(
        &self,
        scope: Scope,
        window: DateRange,
        rows: Vec<DemandForecastDaily>,
    ) -> Result<u64> {
        let (tenant_id, location_id) = scope_params(scope);
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query(
            r#"
            DELETE FROM demand_forecast_daily
            WHERE forecast_date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR tenant_id = $3)
              AND ($4::uuid IS NULL OR location_id = $4)
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .bind(tenant_id)
        .bind(location_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tracing::debug!(deleted, "cleared forecast window");

        for row in &rows {
            sqlx::query(
                r#"
                INSERT INTO demand_forecast_daily
                    (tenant_id, location_id, inventory_item_id, forecast_date, forecast_usage_oz, method)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(row.tenant_id.as_uuid())
            .bind(row.location_id.as_uuid())
            .bind(row.inventory_item_id.as_uuid())
            .bind(row.forecast_date)
            .bind(row.forecast_usage_oz)
            .bind(&row.method)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(rows.len() as u64)
    }

    async fn forecasts(&self, scope: Scope, range: DateRange) -> Result<Vec<DemandForecastDaily>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, location_id, inventory_item_id, forecast_date, forecast_usage_oz, method
            FROM demand_forecast_daily
            WHERE forecast_date BETWEEN $1 AND $2
              AND ($3::uuid IS NULL OR tenant_id = $3)
              AND ($4::uuid IS NULL OR location_id = $4)
            ORDER BY inventory_item_id, forecast_date
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_forecast).collect()
    }

    async fn snapshot_locations(&self, scope: Scope) -> Result<Vec<(TenantId, LocationId)>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT tenant_id, location_id
            FROM inventory_snapshots
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY tenant_id, location_id
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(TenantId, LocationId)> {
                Ok((
                    TenantId::from_uuid(row.try_get("tenant_id")?),
                    LocationId::from_uuid(row.try_get("location_id")?),
                ))
            })
            .collect()
    }

    async fn recent_snapshots(
        &self,
        tenant_id: TenantId,
        location_id: LocationId,
        limit: usize,
    ) -> Result<Vec<InventorySnapshot>> {
        let headers = sqlx::query(
            r#"
            SELECT id, count_date
            FROM inventory_snapshots
            WHERE tenant_id = $1 AND location_id = $2
            ORDER BY count_date DESC
            LIMIT $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(location_id.as_uuid())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut snapshots = Vec::with_capacity(headers.len());
        for header in headers {
            let id: Uuid = header.try_get("id")?;
            let count_date: NaiveDate = header.try_get("count_date")?;

            let lines = sqlx::query(
                r#"
                SELECT inventory_item_id, actual_remaining_oz
                FROM inventory_snapshot_lines
                WHERE snapshot_id = $1
                ORDER BY inventory_item_id
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| -> Result<InventorySnapshotLine> {
                Ok(InventorySnapshotLine {
                    inventory_item_id: InventoryItemId::from_uuid(
                        row.try_get("inventory_item_id")?,
                    ),
                    actual_remaining_oz: row.try_get("actual_remaining_oz")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

            snapshots.push(InventorySnapshot {
                id: SnapshotId::from_uuid(id),
                tenant_id,
                location_id,
                count_date,
                lines,
            });
        }

        Ok(snapshots)
    }

    async fn insert_variance_flags(&self, flags: Vec<VarianceFlag>) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for flag in &flags {
            inserted += sqlx::query(
                r#"
                INSERT INTO variance_flags
                    (tenant_id, location_id, inventory_item_id, week_start_date,
                     expected_remaining_oz, actual_remaining_oz, variance_oz, variance_pct, severity)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT ON CONSTRAINT unique_variance_flag DO NOTHING
                "#,
            )
            .bind(flag.tenant_id.as_uuid())
            .bind(flag.location_id.as_uuid())
            .bind(flag.inventory_item_id.as_uuid())
            .bind(flag.week_start_date)
            .bind(flag.expected_remaining_oz)
            .bind(flag.actual_remaining_oz)
            .bind(flag.variance_oz)
            .bind(flag.variance_pct)
            .bind(flag.severity.as_str())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn variance_flags(&self, scope: Scope) -> Result<Vec<VarianceFlag>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, location_id, inventory_item_id, week_start_date,
                   expected_remaining_oz, actual_remaining_oz, variance_oz, variance_pct, severity
            FROM variance_flags
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY week_start_date, inventory_item_id
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_variance_flag).collect()
    }

    async fn reorder_inputs(&self, scope: Scope) -> Result<Vec<ReorderInput>> {
        let (tenant_id, location_id) = scope_params(scope);
        let policies = sqlx::query(
            r#"
            SELECT tenant_id, location_id, inventory_item_id, reorder_point_oz, par_level_oz,
                   lead_time_days, safety_buffer_days
            FROM reorder_policies
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY location_id, inventory_item_id
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        let vendor_rows = sqlx::query(
            r#"
            SELECT v.vendor_id, v.inventory_item_id, v.vendor_sku, v.unit_size_oz,
                   v.unit_price_cents, v.lead_time_days, v.preferred
            FROM vendor_items v
            JOIN reorder_policies p ON p.inventory_item_id = v.inventory_item_id
            WHERE ($1::uuid IS NULL OR p.tenant_id = $1)
              AND ($2::uuid IS NULL OR p.location_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        let mut vendor_items: HashMap<InventoryItemId, Vec<VendorItem>> = HashMap::new();
        for row in &vendor_rows {
            let vendor_item = Self::row_to_vendor_item(row)?;
            vendor_items
                .entry(vendor_item.inventory_item_id)
                .or_default()
                .push(vendor_item);
        }

        policies
            .into_iter()
            .map(|row| -> Result<ReorderInput> {
                let policy = ReorderPolicy {
                    tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
                    location_id: LocationId::from_uuid(row.try_get("location_id")?),
                    inventory_item_id: InventoryItemId::from_uuid(
                        row.try_get("inventory_item_id")?,
                    ),
                    reorder_point_oz: row.try_get("reorder_point_oz")?,
                    par_level_oz: row.try_get("par_level_oz")?,
                    lead_time_days: row.try_get("lead_time_days")?,
                    safety_buffer_days: row.try_get("safety_buffer_days")?,
                };
                Ok(ReorderInput {
                    vendor_items: vendor_items
                        .remove(&policy.inventory_item_id)
                        .unwrap_or_default(),
                    policy,
                })
            })
            .collect()
    }

    async fn latest_on_hand(&self, scope: Scope) -> Result<HashMap<InventoryItemId, f64>> {
        let (tenant_id, location_id) = scope_params(scope);
        let rows = sqlx::query(
            r#"
            WITH latest AS (
                SELECT DISTINCT ON (tenant_id, location_id) id
                FROM inventory_snapshots
                WHERE ($1::uuid IS NULL OR tenant_id = $1)
                  AND ($2::uuid IS NULL OR location_id = $2)
                ORDER BY tenant_id, location_id, count_date DESC
            )
            SELECT l.inventory_item_id, l.actual_remaining_oz
            FROM inventory_snapshot_lines l
            JOIN latest ON latest.id = l.snapshot_id
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> Result<(InventoryItemId, f64)> {
                Ok((
                    InventoryItemId::from_uuid(row.try_get("inventory_item_id")?),
                    row.try_get("actual_remaining_oz")?,
                ))
            })
            .collect()
    }

    async fn replace_draft_orders(&self, scope: Scope, orders: Vec<PurchaseOrder>) -> Result<u64> {
        let (tenant_id, location_id) = scope_params(scope);
        let mut tx = self.pool.begin().await?;

        // Lines go with their orders via ON DELETE CASCADE.
        let deleted = sqlx::query(
            r#"
            DELETE FROM purchase_orders
            WHERE status = 'draft'
              AND ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tracing::debug!(deleted, "cleared draft purchase orders");

        for order in &orders {
            sqlx::query(
                r#"
                INSERT INTO purchase_orders (id, tenant_id, location_id, vendor_id, status, order_date)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(order.id.as_uuid())
            .bind(order.tenant_id.as_uuid())
            .bind(order.location_id.as_uuid())
            .bind(order.vendor_id.as_uuid())
            .bind(order.status.as_str())
            .bind(order.order_date)
            .execute(&mut *tx)
            .await?;

            for (position, line) in order.lines.iter().enumerate() {
                let qty_units =
                    i32::try_from(line.qty_units).map_err(|_| StoreError::InvalidColumn {
                        column: "qty_units",
                        value: line.qty_units.to_string(),
                    })?;
                sqlx::query(
                    r#"
                    INSERT INTO purchase_order_lines
                        (purchase_order_id, position, inventory_item_id, qty_units,
                         unit_price_cents, line_total_cents)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    "#,
                )
                .bind(order.id.as_uuid())
                .bind(position as i32)
                .bind(line.inventory_item_id.as_uuid())
                .bind(qty_units)
                .bind(line.unit_price.cents())
                .bind(line.line_total.cents())
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(orders.len() as u64)
    }

    async fn purchase_orders(&self, scope: Scope) -> Result<Vec<PurchaseOrder>> {
        let (tenant_id, location_id) = scope_params(scope);
        let headers = sqlx::query(
            r#"
            SELECT id, tenant_id, location_id, vendor_id, status, order_date
            FROM purchase_orders
            WHERE ($1::uuid IS NULL OR tenant_id = $1)
              AND ($2::uuid IS NULL OR location_id = $2)
            ORDER BY location_id, vendor_id
            "#,
        )
        .bind(tenant_id)
        .bind(location_id)
        .fetch_all(&self.pool)
        .await?;

        let mut orders = Vec::with_capacity(headers.len());
        for header in headers {
            let id: Uuid = header.try_get("id")?;
            let status: String = header.try_get("status")?;

            let lines = sqlx::query(
                r#"
                SELECT inventory_item_id, qty_units, unit_price_cents, line_total_cents
                FROM purchase_order_lines
                WHERE purchase_order_id = $1
                ORDER BY position
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| -> Result<PurchaseOrderLine> {
                let qty_units: i32 = row.try_get("qty_units")?;
                Ok(PurchaseOrderLine {
                    inventory_item_id: InventoryItemId::from_uuid(
                        row.try_get("inventory_item_id")?,
                    ),
                    qty_units: u32::try_from(qty_units).map_err(|_| StoreError::InvalidColumn {
                        column: "qty_units",
                        value: qty_units.to_string(),
                    })?,
                    unit_price: Money::from_cents(row.try_get("unit_price_cents")?),
                    line_total: Money::from_cents(row.try_get("line_total_cents")?),
                })
            })
            .collect::<Result<Vec<_>>>()?;

            orders.push(PurchaseOrder {
                id: PurchaseOrderId::from_uuid(id),
                tenant_id: TenantId::from_uuid(header.try_get("tenant_id")?),
                location_id: LocationId::from_uuid(header.try_get("location_id")?),
                vendor_id: VendorId::from_uuid(header.try_get("vendor_id")?),
                status: status.parse()?,
                order_date: header.try_get("order_date")?,
                lines,
            });
        }

        Ok(orders)
    }
}
