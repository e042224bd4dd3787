//! Stage 2: day-of-week baseline demand forecast.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use store::{
    DateRange, DemandForecastDaily, InventoryItemId, InventoryStore, ItemUsage, LocationId, Scope,
    TenantId,
};

use crate::{PipelineConfig, PipelineError, Result};

/// Method tag written on every forecast row.
pub const FORECAST_METHOD: &str = "dow_baseline";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastTrigger {
    pub run_date: NaiveDate,
    #[serde(flatten)]
    pub scope: Scope,
}

impl ForecastTrigger {
    pub fn new(run_date: NaiveDate, scope: Scope) -> Self {
        Self { run_date, scope }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastSummary {
    pub history_rows: usize,
    pub items_forecast: usize,
    pub rows_written: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Mean {
    sum: f64,
    count: usize,
}

impl Mean {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Usage history of one item, bucketed by weekday (Monday = 0).
#[derive(Debug, Default)]
struct ItemHistory {
    by_weekday: [Mean; 7],
    overall: Mean,
}

impl ItemHistory {
    fn daily_forecast(&self, date: NaiveDate, min_samples: usize) -> f64 {
        let weekday = &self.by_weekday[date.weekday().num_days_from_monday() as usize];
        if weekday.count >= min_samples {
            weekday.value()
        } else {
            self.overall.value()
        }
    }
}

/// The `horizon_days` dates starting at `run_date`.
fn horizon(run_date: NaiveDate, config: &PipelineConfig) -> Result<DateRange> {
    DateRange::starting_at(run_date, config.horizon_days).ok_or_else(|| {
        PipelineError::InvalidTrigger(format!(
            "forecast horizon of {} days from {run_date} is out of range",
            config.horizon_days
        ))
    })
}

/// Projects daily usage for each item over the configured horizon starting at
/// `run_date`.
///
/// A weekday with at least `weekday_min_samples` history rows uses its own
/// average; other weekdays fall back to the item's overall average. Items with
/// no history get no rows.
pub fn forecast_demand(
    history: &[ItemUsage],
    run_date: NaiveDate,
    config: &PipelineConfig,
) -> Result<Vec<DemandForecastDaily>> {
    let horizon = horizon(run_date, config)?;

    let mut items: BTreeMap<(TenantId, LocationId, InventoryItemId), ItemHistory> =
        BTreeMap::new();
    for usage in history {
        let item = items
            .entry((usage.tenant_id, usage.location_id, usage.inventory_item_id))
            .or_default();
        item.by_weekday[usage.usage_date.weekday().num_days_from_monday() as usize]
            .add(usage.usage_oz);
        item.overall.add(usage.usage_oz);
    }

    Ok(items
        .iter()
        .flat_map(|(&(tenant_id, location_id, inventory_item_id), item)| {
            horizon.days().map(move |forecast_date| DemandForecastDaily {
                tenant_id,
                location_id,
                inventory_item_id,
                forecast_date,
                forecast_usage_oz: item
                    .daily_forecast(forecast_date, config.weekday_min_samples),
                method: FORECAST_METHOD.to_string(),
            })
        })
        .collect())
}

/// Rebuilds the forecast window from trailing item usage.
pub struct DemandForecaster<S> {
    store: S,
    config: PipelineConfig,
}

impl<S: InventoryStore> DemandForecaster<S> {
    pub fn new(store: S, config: PipelineConfig) -> Self {
        Self { store, config }
    }

    /// Replaces every forecast row in scope dated within the horizon.
    ///
    /// History is the `history_days` strictly before the run date.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self, trigger: ForecastTrigger) -> Result<ForecastSummary> {
        let window = horizon(trigger.run_date, &self.config)?;
        let history_range = DateRange::trailing(trigger.run_date, self.config.history_days)
            .ok_or_else(|| {
                PipelineError::InvalidTrigger(format!(
                    "{} days of history before {} is out of range",
                    self.config.history_days, trigger.run_date
                ))
            })?;
        let history = self.store.item_usage(trigger.scope, history_range).await?;
        if history.is_empty() {
            tracing::debug!(run_date = %trigger.run_date, "no usage history in scope");
        }

        let rows = forecast_demand(&history, trigger.run_date, &self.config)?;
        let items_forecast = rows.len() / self.config.horizon_days.max(1) as usize;

        let rows_written = self
            .store
            .replace_forecasts(trigger.scope, window, rows)
            .await?;
        metrics::counter!("forecast_rows_written").increment(rows_written);

        tracing::info!(items_forecast, rows_written, "demand forecast complete");

        Ok(ForecastSummary {
            history_rows: history.len(),
            items_forecast,
            rows_written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2024-01-02 is a Tuesday.
    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn usage(item: InventoryItemId, usage_date: NaiveDate, usage_oz: f64) -> ItemUsage {
        ItemUsage {
            tenant_id: TenantId::from_uuid(uuid::Uuid::nil()),
            location_id: LocationId::from_uuid(uuid::Uuid::nil()),
            inventory_item_id: item,
            usage_date,
            usage_oz,
        }
    }

    fn forecast_on(rows: &[DemandForecastDaily], day: NaiveDate) -> f64 {
        rows.iter()
            .find(|r| r.forecast_date == day)
            .map(|r| r.forecast_usage_oz)
            .unwrap()
    }

    /// Three Tuesdays at 10 oz and four other days at 5 oz.
    fn three_tuesdays(item: InventoryItemId) -> Vec<ItemUsage> {
        vec![
            usage(item, date(2024, 1, 2), 10.0),
            usage(item, date(2024, 1, 9), 10.0),
            usage(item, date(2024, 1, 16), 10.0),
            usage(item, date(2024, 1, 3), 5.0),
            usage(item, date(2024, 1, 4), 5.0),
            usage(item, date(2024, 1, 5), 5.0),
            usage(item, date(2024, 1, 6), 5.0),
        ]
    }

    #[test]
    fn weekday_with_enough_samples_uses_weekday_average() {
        let item = InventoryItemId::new();
        let rows = forecast_demand(
            &three_tuesdays(item),
            date(2024, 1, 22),
            &PipelineConfig::default(),
        )
        .unwrap();

        assert_eq!(forecast_on(&rows, date(2024, 1, 23)), 10.0);
        // Overall average is 50 / 7.
        let wednesday = forecast_on(&rows, date(2024, 1, 24));
        assert!((wednesday - 50.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn sparse_weekday_falls_back_to_overall_average() {
        let item = InventoryItemId::new();
        let mut history = three_tuesdays(item);
        history.retain(|u| u.usage_date != date(2024, 1, 16));

        let rows =
            forecast_demand(&history, date(2024, 1, 22), &PipelineConfig::default()).unwrap();

        // Two Tuesdays at 10 plus four days at 5, averaged over six rows.
        assert_eq!(forecast_on(&rows, date(2024, 1, 23)), 40.0 / 6.0);
    }

    #[test]
    fn covers_horizon_starting_at_run_date() {
        let item = InventoryItemId::new();
        let config = PipelineConfig::default();
        let run_date = date(2024, 1, 22);

        let rows = forecast_demand(&three_tuesdays(item), run_date, &config).unwrap();

        assert_eq!(rows.len(), 14);
        assert_eq!(rows.first().unwrap().forecast_date, run_date);
        assert_eq!(rows.last().unwrap().forecast_date, date(2024, 2, 4));
        assert!(rows.iter().all(|r| r.method == FORECAST_METHOD));
    }

    #[test]
    fn item_without_history_gets_no_rows() {
        let rows = forecast_demand(&[], date(2024, 1, 22), &PipelineConfig::default()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn min_samples_is_configurable() {
        let item = InventoryItemId::new();
        let config = PipelineConfig {
            weekday_min_samples: 4,
            ..PipelineConfig::default()
        };

        let rows = forecast_demand(&three_tuesdays(item), date(2024, 1, 22), &config).unwrap();

        assert!((forecast_on(&rows, date(2024, 1, 23)) - 50.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn horizon_past_the_calendar_is_an_invalid_trigger() {
        let item = InventoryItemId::new();
        let result = forecast_demand(
            &three_tuesdays(item),
            NaiveDate::MAX,
            &PipelineConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::InvalidTrigger(_))));
    }
}
