//! Stage 4: draft purchase orders from forecasts and on-hand counts.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use store::{
    DateRange, DemandForecastDaily, InventoryItemId, InventoryStore, LocationId, PurchaseOrder,
    PurchaseOrderId, PurchaseOrderLine, PurchaseOrderStatus, ReorderInput, ReorderPolicy, Scope,
    VendorId, VendorItem,
};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderTrigger {
    pub run_date: NaiveDate,
    #[serde(flatten)]
    pub scope: Scope,
}

impl ReorderTrigger {
    pub fn new(run_date: NaiveDate, scope: Scope) -> Self {
        Self { run_date, scope }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderSummary {
    pub policies_evaluated: usize,
    /// Policies with no usable vendor item.
    pub policies_unsourced: usize,
    /// Policies whose lead time and safety buffer run past the calendar.
    pub policies_out_of_range: usize,
    pub lines_drafted: usize,
    pub orders_drafted: u64,
}

/// Draft orders computed for one run date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReorderPlan {
    pub orders: Vec<PurchaseOrder>,
    pub policies_unsourced: usize,
    pub policies_out_of_range: usize,
}

impl ReorderPlan {
    pub fn line_count(&self) -> usize {
        self.orders.iter().map(|o| o.lines.len()).sum()
    }
}

/// Picks the vendor item to order from: preferred first, then cheapest, then
/// lowest vendor id. Items with a non-positive unit size are never chosen.
pub fn resolve_vendor_item(vendor_items: &[VendorItem]) -> Option<&VendorItem> {
    vendor_items
        .iter()
        .filter(|v| v.unit_size_oz > 0.0)
        .min_by_key(|v| (!v.preferred, v.unit_price.cents(), v.vendor_id))
}

/// Days until a delivery arrives; the vendor's lead time wins when set.
pub fn effective_lead_time(policy: &ReorderPolicy, vendor_item: &VendorItem) -> i64 {
    i64::from(vendor_item.lead_time_days.unwrap_or(policy.lead_time_days).max(0))
}

/// Forecast ounces per item per date.
#[derive(Debug)]
struct ForecastIndex(HashMap<InventoryItemId, BTreeMap<NaiveDate, f64>>);

impl ForecastIndex {
    fn new(rows: &[DemandForecastDaily]) -> Self {
        let mut index: HashMap<InventoryItemId, BTreeMap<NaiveDate, f64>> = HashMap::new();
        for row in rows {
            *index
                .entry(row.inventory_item_id)
                .or_default()
                .entry(row.forecast_date)
                .or_insert(0.0) += row.forecast_usage_oz;
        }
        Self(index)
    }

    /// Total forecast usage over an inclusive date range.
    fn usage(&self, item: InventoryItemId, range: DateRange) -> f64 {
        self.0
            .get(&item)
            .map(|days| days.range(range.start..=range.end).map(|(_, oz)| oz).sum::<f64>())
            .unwrap_or(0.0)
    }
}

/// Forecast usage windows for one policy, both starting at the run date and
/// inclusive of their last day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReorderWindows {
    /// `[run_date, run_date + lead]`
    pub to_arrival: DateRange,
    /// `[run_date, run_date + lead + safety_buffer]`
    pub through_buffer: DateRange,
}

impl ReorderWindows {
    /// `None` when either window ends past the last representable date.
    pub fn new(
        policy: &ReorderPolicy,
        vendor_item: &VendorItem,
        run_date: NaiveDate,
    ) -> Option<Self> {
        let lead = effective_lead_time(policy, vendor_item);
        let buffer = i64::from(policy.safety_buffer_days.max(0));
        Some(Self {
            to_arrival: DateRange::starting_at(run_date, lead + 1)?,
            through_buffer: DateRange::starting_at(run_date, lead + buffer + 1)?,
        })
    }
}

/// Whole vendor units needed to bring one item back to par, or `None` when
/// no order is warranted.
fn units_to_order(
    policy: &ReorderPolicy,
    vendor_item: &VendorItem,
    on_hand: f64,
    forecasts: &ForecastIndex,
    windows: ReorderWindows,
) -> Option<u32> {
    let item = policy.inventory_item_id;

    let remaining_at_buffer = on_hand - forecasts.usage(item, windows.through_buffer);
    if remaining_at_buffer >= policy.reorder_point_oz {
        return None;
    }

    let remaining_at_arrival = on_hand - forecasts.usage(item, windows.to_arrival);
    let needed_units = ((policy.par_level_oz - remaining_at_arrival) / vendor_item.unit_size_oz)
        .ceil()
        .max(0.0);
    if needed_units <= 0.0 {
        return None;
    }
    Some(needed_units as u32)
}

/// Evaluates every policy and groups the resulting lines into one draft order
/// per (vendor, location).
pub fn plan_reorders(
    inputs: &[ReorderInput],
    on_hand: &HashMap<InventoryItemId, f64>,
    forecasts: &[DemandForecastDaily],
    run_date: NaiveDate,
) -> ReorderPlan {
    let index = ForecastIndex::new(forecasts);
    let mut orders: BTreeMap<(VendorId, LocationId), PurchaseOrder> = BTreeMap::new();
    let mut policies_unsourced = 0;
    let mut policies_out_of_range = 0;

    for input in inputs {
        let policy = &input.policy;
        let Some(vendor_item) = resolve_vendor_item(&input.vendor_items) else {
            tracing::debug!(
                inventory_item_id = %policy.inventory_item_id,
                "no usable vendor item for reorder policy"
            );
            policies_unsourced += 1;
            continue;
        };

        let Some(windows) = ReorderWindows::new(policy, vendor_item, run_date) else {
            tracing::debug!(
                inventory_item_id = %policy.inventory_item_id,
                lead_time_days = effective_lead_time(policy, vendor_item),
                safety_buffer_days = policy.safety_buffer_days,
                "reorder horizon past the last representable date"
            );
            policies_out_of_range += 1;
            continue;
        };

        let current = on_hand
            .get(&policy.inventory_item_id)
            .copied()
            .unwrap_or(0.0);
        let Some(qty_units) = units_to_order(policy, vendor_item, current, &index, windows) else {
            continue;
        };

        orders
            .entry((vendor_item.vendor_id, policy.location_id))
            .or_insert_with(|| PurchaseOrder {
                id: PurchaseOrderId::new(),
                tenant_id: policy.tenant_id,
                location_id: policy.location_id,
                vendor_id: vendor_item.vendor_id,
                status: PurchaseOrderStatus::Draft,
                order_date: run_date,
                lines: Vec::new(),
            })
            .lines
            .push(PurchaseOrderLine::new(
                policy.inventory_item_id,
                qty_units,
                vendor_item.unit_price,
            ));
    }

    ReorderPlan {
        orders: orders.into_values().collect(),
        policies_unsourced,
        policies_out_of_range,
    }
}

/// Replaces the draft purchase orders in scope.
pub struct ReorderEngine<S> {
    store: S,
}

impl<S: InventoryStore> ReorderEngine<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Approved orders are never touched; drafts are rebuilt from scratch.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, trigger: ReorderTrigger) -> Result<ReorderSummary> {
        let inputs = self.store.reorder_inputs(trigger.scope).await?;
        let on_hand = self.store.latest_on_hand(trigger.scope).await?;

        let lookahead_end = inputs
            .iter()
            .filter_map(|input| {
                let vendor_item = resolve_vendor_item(&input.vendor_items)?;
                ReorderWindows::new(&input.policy, vendor_item, trigger.run_date)
            })
            .map(|windows| windows.through_buffer.end)
            .max()
            .unwrap_or(trigger.run_date);
        let forecasts = self
            .store
            .forecasts(trigger.scope, DateRange::new(trigger.run_date, lookahead_end))
            .await?;

        let plan = plan_reorders(&inputs, &on_hand, &forecasts, trigger.run_date);
        let lines_drafted = plan.line_count();
        let policies_unsourced = plan.policies_unsourced;
        let policies_out_of_range = plan.policies_out_of_range;

        let orders_drafted = self
            .store
            .replace_draft_orders(trigger.scope, plan.orders)
            .await?;
        metrics::counter!("purchase_order_lines_drafted").increment(lines_drafted as u64);

        tracing::info!(
            policies = inputs.len(),
            orders_drafted,
            lines_drafted,
            "reorder run complete"
        );

        Ok(ReorderSummary {
            policies_evaluated: inputs.len(),
            policies_unsourced,
            policies_out_of_range,
            lines_drafted,
            orders_drafted,
        })
    }
}

#[cfg(test)]
mod tests {
    use store::{Money, TenantId};

    use super::*;

    fn run_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 4).unwrap()
    }

    struct Fixture {
        tenant: TenantId,
        location: LocationId,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                tenant: TenantId::new(),
                location: LocationId::new(),
            }
        }

        /// Reorder point 50, par 120, lead 3, buffer 2.
        fn policy(&self, item: InventoryItemId) -> ReorderPolicy {
            ReorderPolicy {
                tenant_id: self.tenant,
                location_id: self.location,
                inventory_item_id: item,
                reorder_point_oz: 50.0,
                par_level_oz: 120.0,
                lead_time_days: 3,
                safety_buffer_days: 2,
            }
        }

        /// 15 oz per day for the next 30 days.
        fn forecasts(&self, item: InventoryItemId) -> Vec<DemandForecastDaily> {
            DateRange::starting_at(run_date(), 30)
                .unwrap()
                .days()
                .map(|forecast_date| DemandForecastDaily {
                    tenant_id: self.tenant,
                    location_id: self.location,
                    inventory_item_id: item,
                    forecast_date,
                    forecast_usage_oz: 15.0,
                    method: "dow_baseline".to_string(),
                })
                .collect()
        }
    }

    fn vendor_item(vendor: VendorId, item: InventoryItemId, price_cents: i64) -> VendorItem {
        VendorItem {
            vendor_id: vendor,
            inventory_item_id: item,
            vendor_sku: "SKU-1".to_string(),
            unit_size_oz: 33.8,
            unit_price: Money::from_cents(price_cents),
            lead_time_days: None,
            preferred: false,
        }
    }

    #[test]
    fn orders_whole_units_to_reach_par() {
        let f = Fixture::new();
        let item = InventoryItemId::new();
        let vendor = VendorId::new();
        let inputs = vec![ReorderInput {
            policy: f.policy(item),
            vendor_items: vec![vendor_item(vendor, item, 2899)],
        }];
        // 40 on hand, 60 oz used through arrival: projected -20, so 140 oz short.
        let on_hand = HashMap::from([(item, 40.0)]);

        let plan = plan_reorders(&inputs, &on_hand, &f.forecasts(item), run_date());

        assert_eq!(plan.orders.len(), 1);
        let order = &plan.orders[0];
        assert_eq!(order.status, PurchaseOrderStatus::Draft);
        assert_eq!(order.order_date, run_date());
        assert_eq!(order.lines.len(), 1);
        assert_eq!(order.lines[0].qty_units, 5);
        assert_eq!(order.lines[0].line_total, Money::from_cents(5 * 2899));
    }

    #[test]
    fn enough_stock_through_buffer_suppresses_order() {
        let f = Fixture::new();
        let item = InventoryItemId::new();
        let inputs = vec![ReorderInput {
            policy: f.policy(item),
            vendor_items: vec![vendor_item(VendorId::new(), item, 2899)],
        }];
        // 90 oz used through buffer leaves exactly the reorder point.
        let on_hand = HashMap::from([(item, 140.0)]);

        let plan = plan_reorders(&inputs, &on_hand, &f.forecasts(item), run_date());

        assert!(plan.orders.is_empty());
    }

    #[test]
    fn missing_count_is_treated_as_empty() {
        let f = Fixture::new();
        let item = InventoryItemId::new();
        let inputs = vec![ReorderInput {
            policy: f.policy(item),
            vendor_items: vec![vendor_item(VendorId::new(), item, 1000)],
        }];

        let plan = plan_reorders(&inputs, &HashMap::new(), &[], run_date());

        // Nothing on hand and no forecast: 120 oz short.
        assert_eq!(plan.orders[0].lines[0].qty_units, 4);
    }

    #[test]
    fn lines_group_by_vendor_and_location() {
        let f = Fixture::new();
        let (a, b, c) = (InventoryItemId::new(), InventoryItemId::new(), InventoryItemId::new());
        let (shared, other) = (VendorId::new(), VendorId::new());
        let inputs = vec![
            ReorderInput {
                policy: f.policy(a),
                vendor_items: vec![vendor_item(shared, a, 1000)],
            },
            ReorderInput {
                policy: f.policy(b),
                vendor_items: vec![vendor_item(shared, b, 1000)],
            },
            ReorderInput {
                policy: f.policy(c),
                vendor_items: vec![vendor_item(other, c, 1000)],
            },
        ];

        let plan = plan_reorders(&inputs, &HashMap::new(), &[], run_date());

        assert_eq!(plan.orders.len(), 2);
        let shared_order = plan.orders.iter().find(|o| o.vendor_id == shared).unwrap();
        assert_eq!(shared_order.lines.len(), 2);
        assert_eq!(plan.line_count(), 3);
    }

    #[test]
    fn preferred_vendor_wins_over_cheaper() {
        let item = InventoryItemId::new();
        let cheap = vendor_item(VendorId::new(), item, 1000);
        let mut preferred = vendor_item(VendorId::new(), item, 2000);
        preferred.preferred = true;

        let items = [cheap.clone(), preferred.clone()];
        assert_eq!(resolve_vendor_item(&items), Some(&preferred));

        let expensive = vendor_item(VendorId::new(), item, 3000);
        let items = [expensive, cheap.clone()];
        assert_eq!(resolve_vendor_item(&items), Some(&cheap));
    }

    #[test]
    fn vendor_without_unit_size_is_unusable() {
        let f = Fixture::new();
        let item = InventoryItemId::new();
        let mut broken = vendor_item(VendorId::new(), item, 1000);
        broken.unit_size_oz = 0.0;
        let inputs = vec![
            ReorderInput {
                policy: f.policy(item),
                vendor_items: vec![broken],
            },
            ReorderInput {
                policy: f.policy(InventoryItemId::new()),
                vendor_items: vec![],
            },
        ];

        let plan = plan_reorders(&inputs, &HashMap::new(), &[], run_date());

        assert!(plan.orders.is_empty());
        assert_eq!(plan.policies_unsourced, 2);
    }

    #[test]
    fn vendor_lead_time_overrides_policy() {
        let f = Fixture::new();
        let item = InventoryItemId::new();
        let policy = f.policy(item);
        let mut slow = vendor_item(VendorId::new(), item, 1000);
        assert_eq!(effective_lead_time(&policy, &slow), 3);

        slow.lead_time_days = Some(7);
        assert_eq!(effective_lead_time(&policy, &slow), 7);

        // 150 on hand covers 6 days of usage (90 oz) but not 10 days (150 oz).
        let on_hand = HashMap::from([(item, 150.0)]);
        let inputs = vec![ReorderInput {
            policy,
            vendor_items: vec![slow],
        }];
        let plan = plan_reorders(&inputs, &on_hand, &f.forecasts(item), run_date());
        assert_eq!(plan.orders.len(), 1);
    }

    #[test]
    fn windows_include_both_ends() {
        let f = Fixture::new();
        let item = InventoryItemId::new();
        let vendor = vendor_item(VendorId::new(), item, 1000);
        let windows = ReorderWindows::new(&f.policy(item), &vendor, run_date()).unwrap();

        assert_eq!(windows.to_arrival.start, run_date());
        assert_eq!(windows.to_arrival.days().count(), 4);
        assert_eq!(windows.through_buffer.days().count(), 6);
    }

    #[test]
    fn horizon_past_the_calendar_skips_policy() {
        let f = Fixture::new();
        let (far, buffered, near) = (
            InventoryItemId::new(),
            InventoryItemId::new(),
            InventoryItemId::new(),
        );
        let mut far_policy = f.policy(far);
        far_policy.lead_time_days = i32::MAX;
        let mut buffered_policy = f.policy(buffered);
        buffered_policy.safety_buffer_days = i32::MAX;
        let inputs = vec![
            ReorderInput {
                policy: far_policy,
                vendor_items: vec![vendor_item(VendorId::new(), far, 1000)],
            },
            ReorderInput {
                policy: buffered_policy,
                vendor_items: vec![vendor_item(VendorId::new(), buffered, 1000)],
            },
            ReorderInput {
                policy: f.policy(near),
                vendor_items: vec![vendor_item(VendorId::new(), near, 1000)],
            },
        ];

        let plan = plan_reorders(&inputs, &HashMap::new(), &[], run_date());

        assert_eq!(plan.policies_out_of_range, 2);
        assert_eq!(plan.line_count(), 1);
        assert_eq!(plan.orders[0].lines[0].inventory_item_id, near);
    }
}
