//! Policy constants for the pipeline stages.

use serde::{Deserialize, Serialize};
use store::Severity;

use crate::{PipelineError, Result};

/// Longest usage history the forecaster may read (ten years).
pub const MAX_HISTORY_DAYS: i64 = 3660;

/// Longest forecast horizon (one year).
pub const MAX_HORIZON_DAYS: i64 = 366;

/// Tunable policy values shared by the forecast and variance stages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Trailing days of usage history the forecaster reads.
    pub history_days: i64,
    /// Number of consecutive days forecast from the run date.
    pub horizon_days: i64,
    /// Minimum samples before a weekday average overrides the overall average.
    pub weekday_min_samples: usize,
    /// Variance percentage at which severity becomes `low`.
    pub severity_low: f64,
    /// Variance percentage at which severity becomes `medium`.
    pub severity_medium: f64,
    /// Variance percentage at which severity becomes `high`.
    pub severity_high: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_days: 56,
            horizon_days: 14,
            weekday_min_samples: 3,
            severity_low: 0.05,
            severity_medium: 0.10,
            severity_high: 0.15,
        }
    }
}

impl PipelineConfig {
    /// Checks that windows are non-empty and bounded and that severity
    /// thresholds ascend.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HISTORY_DAYS).contains(&self.history_days) {
            return Err(PipelineError::InvalidConfig(format!(
                "history_days must be between 1 and {MAX_HISTORY_DAYS}, got {}",
                self.history_days
            )));
        }
        if !(1..=MAX_HORIZON_DAYS).contains(&self.horizon_days) {
            return Err(PipelineError::InvalidConfig(format!(
                "horizon_days must be between 1 and {MAX_HORIZON_DAYS}, got {}",
                self.horizon_days
            )));
        }
        if !(0.0 <= self.severity_low
            && self.severity_low <= self.severity_medium
            && self.severity_medium <= self.severity_high)
        {
            return Err(PipelineError::InvalidConfig(format!(
                "severity thresholds must ascend: low={}, medium={}, high={}",
                self.severity_low, self.severity_medium, self.severity_high
            )));
        }
        Ok(())
    }

    /// Buckets a variance percentage into a severity.
    pub fn severity_for(&self, variance_pct: f64) -> Severity {
        if variance_pct >= self.severity_high {
            Severity::High
        } else if variance_pct >= self.severity_medium {
            Severity::Medium
        } else if variance_pct >= self.severity_low {
            Severity::Low
        } else {
            Severity::None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn descending_thresholds_are_rejected() {
        let config = PipelineConfig {
            severity_low: 0.2,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_horizon_is_rejected() {
        let config = PipelineConfig {
            horizon_days: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_windows_are_rejected() {
        let history = PipelineConfig {
            history_days: i64::MAX,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            history.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));

        let horizon = PipelineConfig {
            horizon_days: MAX_HORIZON_DAYS + 1,
            ..PipelineConfig::default()
        };
        assert!(horizon.validate().is_err());

        let widest = PipelineConfig {
            history_days: MAX_HISTORY_DAYS,
            horizon_days: MAX_HORIZON_DAYS,
            ..PipelineConfig::default()
        };
        assert!(widest.validate().is_ok());
    }

    #[test]
    fn severity_boundaries_are_inclusive() {
        let config = PipelineConfig::default();
        assert_eq!(config.severity_for(0.0), Severity::None);
        assert_eq!(config.severity_for(0.049), Severity::None);
        assert_eq!(config.severity_for(0.05), Severity::Low);
        assert_eq!(config.severity_for(0.10), Severity::Medium);
        assert_eq!(config.severity_for(0.15), Severity::High);
        assert_eq!(config.severity_for(0.307), Severity::High);
    }

    #[test]
    fn negative_percentage_is_none() {
        assert_eq!(PipelineConfig::default().severity_for(-0.5), Severity::None);
    }
}
