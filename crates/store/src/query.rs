use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{LocationId, TenantId};

/// Tenant/location filter applied to every pipeline query.
///
/// A `None` component matches everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scope {
    pub tenant_id: Option<TenantId>,
    pub location_id: Option<LocationId>,
}

impl Scope {
    /// A scope covering all tenants and locations.
    pub fn all() -> Self {
        Self::default()
    }

    /// A scope covering every location of one tenant.
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            location_id: None,
        }
    }

    /// A scope covering a single location.
    pub fn location(tenant_id: TenantId, location_id: LocationId) -> Self {
        Self {
            tenant_id: Some(tenant_id),
            location_id: Some(location_id),
        }
    }

    /// Filters by location.
    pub fn with_location(mut self, location_id: LocationId) -> Self {
        self.location_id = Some(location_id);
        self
    }

    /// Returns true if a row keyed by `(tenant, location)` is in scope.
    pub fn matches(&self, tenant_id: TenantId, location_id: LocationId) -> bool {
        self.tenant_id.is_none_or(|t| t == tenant_id)
            && self.location_id.is_none_or(|l| l == location_id)
    }
}

/// A closed date interval, inclusive of both `start` and `end`.
///
/// Half-open windows are expressed by shifting a bound by one day, see
/// [`DateRange::trailing`] and [`DateRange::after`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// A single day.
    pub fn day(date: NaiveDate) -> Self {
        Self::new(date, date)
    }

    /// `days` dates starting at `start`: `[start, start + days - 1]`.
    ///
    /// `None` when `days < 1` or the end falls outside chrono's date range.
    pub fn starting_at(start: NaiveDate, days: i64) -> Option<Self> {
        let span = u64::try_from(days).ok()?.checked_sub(1)?;
        Some(Self::new(start, start.checked_add_days(Days::new(span))?))
    }

    /// The `days` dates strictly before `before`: `[before - days, before)`.
    ///
    /// `None` when `days < 1` or the start falls outside chrono's date range.
    pub fn trailing(before: NaiveDate, days: i64) -> Option<Self> {
        let days = u64::try_from(days).ok().filter(|d| *d >= 1)?;
        Some(Self::new(
            before.checked_sub_days(Days::new(days))?,
            before.pred_opt()?,
        ))
    }

    /// Dates strictly after `after` up to and including `through`.
    pub fn after(after: NaiveDate, through: NaiveDate) -> Option<Self> {
        Some(Self::new(after.succ_opt()?, through))
    }

    /// Returns true if the range contains no dates.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Iterates every date in the range in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}
