//! Row types for the inventory data model.
//!
//! Source tables (items, specs, sold orders, snapshots, policies, vendor
//! items) are written by upstream collaborators. Derived tables (theoretical
//! usage, forecasts, variance flags, draft purchase orders) are each owned by
//! exactly one pipeline stage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    IngredientId, InventoryItemId, JobRunId, LocationId, MenuItemId, Money, PurchaseOrderId,
    SnapshotId, StoreError, TenantId, VendorId,
};

/// A trackable unit at one location, referencing one ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub ingredient_id: IngredientId,
    pub name: String,
    /// Bottle, keg, can, ...
    pub container_type: String,
    pub container_size_oz: f64,
    /// Items are deactivated, never deleted.
    pub active: bool,
}

/// One ingredient line of a drink spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrinkSpecLine {
    pub ingredient_id: IngredientId,
    pub ounces: f64,
}

/// A versioned recipe for a menu item at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrinkSpec {
    pub id: uuid::Uuid,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub menu_item_id: MenuItemId,
    pub version: i32,
    pub active: bool,
    /// Ordered recipe lines.
    pub lines: Vec<DrinkSpecLine>,
}

/// A line of the active drink spec, flattened for usage attribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSpecLine {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub menu_item_id: MenuItemId,
    pub ingredient_id: IngredientId,
    pub ounces: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldOrderItem {
    pub menu_item_id: MenuItemId,
    pub quantity: i32,
}

/// A POS transaction. Only closed orders count toward usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldOrder {
    pub id: uuid::Uuid,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub closed_at: Option<DateTime<Utc>>,
    pub items: Vec<SoldOrderItem>,
}

impl SoldOrder {
    /// The date usage is attributed to: the UTC date the order closed.
    pub fn usage_date(&self) -> Option<NaiveDate> {
        self.closed_at.map(|ts| ts.date_naive())
    }
}

/// A sold line of a closed order, tagged with its usage date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoldLine {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub usage_date: NaiveDate,
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
}

/// Ounces of one ingredient consumed on one date at one location.
///
/// Unique per (tenant, location, date, ingredient).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TheoreticalUsageDaily {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub usage_date: NaiveDate,
    pub ingredient_id: IngredientId,
    pub usage_oz: f64,
}

/// Theoretical usage joined to the inventory item stocking the ingredient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUsage {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub inventory_item_id: InventoryItemId,
    pub usage_date: NaiveDate,
    pub usage_oz: f64,
}

/// Forecast ounces of one inventory item for one future date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemandForecastDaily {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub inventory_item_id: InventoryItemId,
    pub forecast_date: NaiveDate,
    pub forecast_usage_oz: f64,
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshotLine {
    pub inventory_item_id: InventoryItemId,
    pub actual_remaining_oz: f64,
}

/// A physical count event: one per location per count date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub id: SnapshotId,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub count_date: NaiveDate,
    pub lines: Vec<InventorySnapshotLine>,
}

impl InventorySnapshot {
    /// Returns the counted remaining ounces for an item, if it was counted.
    pub fn remaining_for(&self, item: InventoryItemId) -> Option<f64> {
        self.lines
            .iter()
            .find(|l| l.inventory_item_id == item)
            .map(|l| l.actual_remaining_oz)
    }
}

/// Variance severity bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    None,
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::None => "none",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Severity::None),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(StoreError::InvalidColumn {
                column: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// Expected vs. actual remaining ounces for one item between two counts.
///
/// Unique per (tenant, location, item, week_start_date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarianceFlag {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub inventory_item_id: InventoryItemId,
    /// Count date of the latest snapshot.
    pub week_start_date: NaiveDate,
    pub expected_remaining_oz: f64,
    pub actual_remaining_oz: f64,
    pub variance_oz: f64,
    pub variance_pct: f64,
    pub severity: Severity,
}

/// Reorder thresholds for one item at one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReorderPolicy {
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub inventory_item_id: InventoryItemId,
    pub reorder_point_oz: f64,
    pub par_level_oz: f64,
    pub lead_time_days: i32,
    pub safety_buffer_days: i32,
}

/// A vendor's purchasable SKU for an inventory item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VendorItem {
    pub vendor_id: VendorId,
    pub inventory_item_id: InventoryItemId,
    pub vendor_sku: String,
    pub unit_size_oz: f64,
    pub unit_price: Money,
    /// Overrides the policy lead time when present.
    pub lead_time_days: Option<i32>,
    pub preferred: bool,
}

/// A reorder policy together with every vendor item offering its item.
#[derive(Debug, Clone, PartialEq)]
pub struct ReorderInput {
    pub policy: ReorderPolicy,
    pub vendor_items: Vec<VendorItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseOrderStatus {
    Draft,
    Approved,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Draft => "draft",
            PurchaseOrderStatus::Approved => "approved",
        }
    }
}

impl std::str::FromStr for PurchaseOrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PurchaseOrderStatus::Draft),
            "approved" => Ok(PurchaseOrderStatus::Approved),
            other => Err(StoreError::InvalidColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderLine {
    pub inventory_item_id: InventoryItemId,
    pub qty_units: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

impl PurchaseOrderLine {
    /// Creates a line whose total is `qty_units * unit_price`.
    pub fn new(inventory_item_id: InventoryItemId, qty_units: u32, unit_price: Money) -> Self {
        Self {
            inventory_item_id,
            qty_units,
            unit_price,
            line_total: unit_price.multiply(qty_units),
        }
    }
}

/// An order to one vendor for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: PurchaseOrderId,
    pub tenant_id: TenantId,
    pub location_id: LocationId,
    pub vendor_id: VendorId,
    pub status: PurchaseOrderStatus,
    pub order_date: NaiveDate,
    pub lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrder {
    /// Sum of all line totals.
    pub fn total(&self) -> Money {
        self.lines.iter().map(|l| l.line_total).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            other => Err(StoreError::InvalidColumn {
                column: "status",
                value: other.to_string(),
            }),
        }
    }
}

/// One pipeline invocation, bracketed `running` -> `completed` | `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    pub id: JobRunId,
    pub job_name: String,
    pub tenant_id: Option<TenantId>,
    pub location_id: Option<LocationId>,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Trigger parameters recorded when the run opened.
    pub params: serde_json::Value,
    /// Failure message, set only when `status` is `failed`.
    pub error: Option<String>,
}
