//! Stage 1: theoretical ingredient usage from sold drinks.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use store::{
    ActiveSpecLine, DateRange, IngredientId, InventoryStore, LocationId, MenuItemId, Scope,
    SoldLine, TenantId, TheoreticalUsageDaily,
};

use crate::{PipelineError, Result};

/// Parameters of a usage aggregation run. Both dates are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageTrigger {
    pub from: NaiveDate,
    pub to: NaiveDate,
    #[serde(flatten)]
    pub scope: Scope,
}

impl UsageTrigger {
    pub fn new(from: NaiveDate, to: NaiveDate, scope: Scope) -> Self {
        Self { from, to, scope }
    }

    /// Rejects triggers whose start date follows their end date.
    pub fn validate(&self) -> Result<()> {
        if self.from > self.to {
            return Err(PipelineError::InvalidTrigger(format!(
                "from ({}) is after to ({})",
                self.from, self.to
            )));
        }
        Ok(())
    }

    pub fn range(&self) -> DateRange {
        DateRange::new(self.from, self.to)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub sold_lines: usize,
    /// Sold lines whose menu item had no active spec.
    pub unattributed_lines: usize,
    pub rows_upserted: u64,
}

/// Usage rows computed from one batch of sold lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageAggregation {
    pub rows: Vec<TheoreticalUsageDaily>,
    pub unattributed_lines: usize,
}

type SpecKey = (TenantId, LocationId, MenuItemId);
type UsageKey = (TenantId, LocationId, NaiveDate, IngredientId);

/// Multiplies each sold quantity through its active spec and sums ounces per
/// (tenant, location, date, ingredient).
///
/// Menu items without an active spec contribute nothing.
pub fn aggregate_usage(sold: &[SoldLine], spec_lines: &[ActiveSpecLine]) -> UsageAggregation {
    let mut specs: HashMap<SpecKey, Vec<&ActiveSpecLine>> = HashMap::new();
    for line in spec_lines {
        specs
            .entry((line.tenant_id, line.location_id, line.menu_item_id))
            .or_default()
            .push(line);
    }

    let mut totals: BTreeMap<UsageKey, f64> = BTreeMap::new();
    let mut unattributed_lines = 0;

    for sale in sold {
        let Some(lines) = specs.get(&(sale.tenant_id, sale.location_id, sale.menu_item_id)) else {
            tracing::debug!(
                menu_item_id = %sale.menu_item_id,
                location_id = %sale.location_id,
                "no active spec for sold menu item"
            );
            unattributed_lines += 1;
            continue;
        };
        for line in lines {
            *totals
                .entry((
                    sale.tenant_id,
                    sale.location_id,
                    sale.usage_date,
                    line.ingredient_id,
                ))
                .or_insert(0.0) += sale.quantity as f64 * line.ounces;
        }
    }

    let rows = totals
        .into_iter()
        .map(
            |((tenant_id, location_id, usage_date, ingredient_id), usage_oz)| {
                TheoreticalUsageDaily {
                    tenant_id,
                    location_id,
                    usage_date,
                    ingredient_id,
                    usage_oz,
                }
            },
        )
        .collect();

    UsageAggregation {
        rows,
        unattributed_lines,
    }
}

/// Converts closed sales into [`TheoreticalUsageDaily`] rows.
pub struct UsageAggregator<S> {
    store: S,
}

impl<S: InventoryStore> UsageAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Aggregates every closed order in the trigger range and upserts the
    /// result. Re-running the same range overwrites rather than accumulates.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, trigger: UsageTrigger) -> Result<UsageSummary> {
        trigger.validate()?;

        let sold = self.store.sold_lines(trigger.scope, trigger.range()).await?;
        let spec_lines = self.store.active_spec_lines(trigger.scope).await?;
        let aggregation = aggregate_usage(&sold, &spec_lines);

        let rows_upserted = self
            .store
            .upsert_theoretical_usage(aggregation.rows)
            .await?;
        metrics::counter!("usage_rows_upserted").increment(rows_upserted);

        tracing::info!(
            sold_lines = sold.len(),
            unattributed = aggregation.unattributed_lines,
            rows_upserted,
            "usage aggregation complete"
        );

        Ok(UsageSummary {
            sold_lines: sold.len(),
            unattributed_lines: aggregation.unattributed_lines,
            rows_upserted,
        })
    }
}
