//! Stage 3: reconcile physical counts against theoretical depletion.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use store::{
    DateRange, InventoryItemId, InventorySnapshot, InventoryStore, ItemUsage, Scope, VarianceFlag,
};

use crate::{PipelineConfig, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceTrigger {
    #[serde(flatten)]
    pub scope: Scope,
}

impl VarianceTrigger {
    pub fn new(scope: Scope) -> Self {
        Self { scope }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VarianceSummary {
    pub locations_reconciled: usize,
    /// Locations with fewer than two snapshots.
    pub locations_skipped: usize,
    pub flags_computed: usize,
    /// Flags actually stored; already-flagged periods are ignored.
    pub flags_inserted: u64,
}

/// Compares two consecutive counts of one location.
///
/// `usage` is the item usage dated after `previous` and up to and including
/// `latest`. Items counted previously but missing from `latest` get no flag.
pub fn reconcile(
    previous: &InventorySnapshot,
    latest: &InventorySnapshot,
    usage: &[ItemUsage],
    config: &PipelineConfig,
) -> Vec<VarianceFlag> {
    let mut used: HashMap<InventoryItemId, f64> = HashMap::new();
    for row in usage {
        *used.entry(row.inventory_item_id).or_insert(0.0) += row.usage_oz;
    }

    previous
        .lines
        .iter()
        .filter_map(|line| {
            let item = line.inventory_item_id;
            let Some(actual) = latest.remaining_for(item) else {
                tracing::debug!(inventory_item_id = %item, "item missing from latest count");
                return None;
            };
            let expected = line.actual_remaining_oz - used.get(&item).copied().unwrap_or(0.0);
            let variance = actual - expected;
            let variance_pct = if expected == 0.0 {
                0.0
            } else {
                variance.abs() / expected
            };

            Some(VarianceFlag {
                tenant_id: latest.tenant_id,
                location_id: latest.location_id,
                inventory_item_id: item,
                week_start_date: latest.count_date,
                expected_remaining_oz: expected,
                actual_remaining_oz: actual,
                variance_oz: variance,
                variance_pct,
                severity: config.severity_for(variance_pct),
            })
        })
        .collect()
}

/// Flags the gap between the two most recent counts of each location.
pub struct VarianceReconciler<S> {
    store: S,
    config: PipelineConfig,
}

impl<S: InventoryStore> VarianceReconciler<S> {
    pub fn new(store: S, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    /// Inserts one flag per counted item per location. Re-running over the
    /// same counts inserts nothing new.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, trigger: VarianceTrigger) -> Result<VarianceSummary> {
        let mut summary = VarianceSummary::default();
        let mut flags = Vec::new();

        for (tenant_id, location_id) in self.store.snapshot_locations(trigger.scope).await? {
            let snapshots = self
                .store
                .recent_snapshots(tenant_id, location_id, 2)
                .await?;
            let [latest, previous] = snapshots.as_slice() else {
                tracing::debug!(%location_id, "fewer than two snapshots; skipping");
                summary.locations_skipped += 1;
                continue;
            };

            let Some(period) = DateRange::after(previous.count_date, latest.count_date) else {
                tracing::debug!(%location_id, "count date out of range; skipping");
                summary.locations_skipped += 1;
                continue;
            };
            let usage = self
                .store
                .item_usage(Scope::location(tenant_id, location_id), period)
                .await?;

            flags.extend(reconcile(previous, latest, &usage, &self.config));
            summary.locations_reconciled += 1;
        }

        summary.flags_computed = flags.len();
        summary.flags_inserted = self.store.insert_variance_flags(flags).await?;
        metrics::counter!("variance_flags_inserted").increment(summary.flags_inserted);

        tracing::info!(
            locations = summary.locations_reconciled,
            skipped = summary.locations_skipped,
            flags_inserted = summary.flags_inserted,
            "variance reconciliation complete"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use store::{InventorySnapshotLine, LocationId, Severity, SnapshotId, TenantId};

    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn snapshot(
        tenant: TenantId,
        location: LocationId,
        day: u32,
        lines: &[(InventoryItemId, f64)],
    ) -> InventorySnapshot {
        InventorySnapshot {
            id: SnapshotId::new(),
            tenant_id: tenant,
            location_id: location,
            count_date: date(day),
            lines: lines
                .iter()
                .map(|&(inventory_item_id, actual_remaining_oz)| InventorySnapshotLine {
                    inventory_item_id,
                    actual_remaining_oz,
                })
                .collect(),
        }
    }

    fn used(
        tenant: TenantId,
        location: LocationId,
        item: InventoryItemId,
        day: u32,
        usage_oz: f64,
    ) -> ItemUsage {
        ItemUsage {
            tenant_id: tenant,
            location_id: location,
            inventory_item_id: item,
            usage_date: date(day),
            usage_oz,
        }
    }

    #[test]
    fn count_matching_depletion_has_no_variance() {
        let (tenant, location, item) = (TenantId::new(), LocationId::new(), InventoryItemId::new());
        let previous = snapshot(tenant, location, 1, &[(item, 28.0)]);
        let latest = snapshot(tenant, location, 8, &[(item, 21.5)]);
        let usage = vec![
            used(tenant, location, item, 3, 4.0),
            used(tenant, location, item, 6, 2.5),
        ];

        let flags = reconcile(&previous, &latest, &usage, &PipelineConfig::default());

        assert_eq!(flags.len(), 1);
        let flag = &flags[0];
        assert_eq!(flag.expected_remaining_oz, 21.5);
        assert_eq!(flag.variance_oz, 0.0);
        assert_eq!(flag.variance_pct, 0.0);
        assert_eq!(flag.severity, Severity::None);
        assert_eq!(flag.week_start_date, date(8));
    }

    #[test]
    fn short_count_is_high_severity() {
        let (tenant, location, item) = (TenantId::new(), LocationId::new(), InventoryItemId::new());
        let previous = snapshot(tenant, location, 1, &[(item, 28.0)]);
        let latest = snapshot(tenant, location, 8, &[(item, 14.9)]);
        let usage = vec![used(tenant, location, item, 4, 6.5)];

        let flags = reconcile(&previous, &latest, &usage, &PipelineConfig::default());

        let flag = &flags[0];
        assert!((flag.variance_oz - -6.6).abs() < 1e-9);
        assert!((flag.variance_pct - 6.6 / 21.5).abs() < 1e-9);
        assert_eq!(flag.severity, Severity::High);
    }

    #[test]
    fn zero_expected_yields_zero_pct() {
        let (tenant, location, item) = (TenantId::new(), LocationId::new(), InventoryItemId::new());
        let previous = snapshot(tenant, location, 1, &[(item, 6.0)]);
        let latest = snapshot(tenant, location, 8, &[(item, 2.0)]);
        let usage = vec![used(tenant, location, item, 2, 6.0)];

        let flags = reconcile(&previous, &latest, &usage, &PipelineConfig::default());

        assert_eq!(flags[0].expected_remaining_oz, 0.0);
        assert_eq!(flags[0].variance_oz, 2.0);
        assert_eq!(flags[0].variance_pct, 0.0);
        assert_eq!(flags[0].severity, Severity::None);
    }

    #[test]
    fn item_missing_from_latest_count_is_skipped() {
        let (tenant, location) = (TenantId::new(), LocationId::new());
        let (kept, dropped) = (InventoryItemId::new(), InventoryItemId::new());
        let previous = snapshot(tenant, location, 1, &[(kept, 10.0), (dropped, 10.0)]);
        let latest = snapshot(tenant, location, 8, &[(kept, 10.0)]);

        let flags = reconcile(&previous, &latest, &[], &PipelineConfig::default());

        assert_eq!(flags.len(), 1);
        assert_eq!(flags[0].inventory_item_id, kept);
    }

    #[test]
    fn thresholds_come_from_config() {
        let (tenant, location, item) = (TenantId::new(), LocationId::new(), InventoryItemId::new());
        let previous = snapshot(tenant, location, 1, &[(item, 100.0)]);
        let latest = snapshot(tenant, location, 8, &[(item, 92.0)]);
        let strict = PipelineConfig {
            severity_low: 0.01,
            severity_medium: 0.02,
            severity_high: 0.05,
            ..PipelineConfig::default()
        };

        let default_flags = reconcile(&previous, &latest, &[], &PipelineConfig::default());
        let strict_flags = reconcile(&previous, &latest, &[], &strict);

        assert_eq!(default_flags[0].severity, Severity::Low);
        assert_eq!(strict_flags[0].severity, Severity::High);
    }
}
