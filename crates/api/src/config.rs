//! Application configuration loaded from environment variables.

use std::str::FromStr;

use pipeline::{PipelineConfig, PipelineError};
use thiserror::Error;

/// Errors raised while loading configuration. The server refuses to start on
/// any of them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Server configuration.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `text` or `json` (default: `text`)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `FORECAST_HORIZON_DAYS`, `FORECAST_HISTORY_DAYS`,
///   `FORECAST_WEEKDAY_MIN_SAMPLES`, `VARIANCE_SEVERITY_LOW`,
///   `VARIANCE_SEVERITY_MEDIUM`, `VARIANCE_SEVERITY_HIGH`: pipeline policy
///   overrides
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: String,
    pub database_max_connections: u32,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = PipelineConfig::default();
        let pipeline = PipelineConfig {
            horizon_days: parse_or(&lookup, "FORECAST_HORIZON_DAYS", defaults.horizon_days)?,
            history_days: parse_or(&lookup, "FORECAST_HISTORY_DAYS", defaults.history_days)?,
            weekday_min_samples: parse_or(
                &lookup,
                "FORECAST_WEEKDAY_MIN_SAMPLES",
                defaults.weekday_min_samples,
            )?,
            severity_low: parse_or(&lookup, "VARIANCE_SEVERITY_LOW", defaults.severity_low)?,
            severity_medium: parse_or(
                &lookup,
                "VARIANCE_SEVERITY_MEDIUM",
                defaults.severity_medium,
            )?,
            severity_high: parse_or(&lookup, "VARIANCE_SEVERITY_HIGH", defaults.severity_high)?,
        };
        pipeline.validate()?;

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&lookup, "PORT", 3000)?,
            log_level: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            log_format: parse_or(&lookup, "LOG_FORMAT", LogFormat::Text)?,
            database_url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            pipeline,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = load(&[("DATABASE_URL", "postgres://localhost/inventory")]).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.pipeline, PipelineConfig::default());
    }

    #[test]
    fn test_database_url_is_required() {
        assert!(matches!(
            load(&[]),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));
    }

    #[test]
    fn test_pipeline_overrides() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("FORECAST_HORIZON_DAYS", "7"),
            ("FORECAST_WEEKDAY_MIN_SAMPLES", "2"),
            ("VARIANCE_SEVERITY_HIGH", "0.25"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(config.pipeline.horizon_days, 7);
        assert_eq!(config.pipeline.weekday_min_samples, 2);
        assert_eq!(config.pipeline.severity_high, 0.25);
        assert_eq!(config.pipeline.history_days, 56);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_unparseable_value_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("PORT", "eighty"),
        ]);
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
    }

    #[test]
    fn test_out_of_order_thresholds_are_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("VARIANCE_SEVERITY_MEDIUM", "0.5"),
        ]);
        assert!(matches!(result, Err(ConfigError::Pipeline(_))));
    }

    #[test]
    fn test_oversized_history_is_rejected() {
        let result = load(&[
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("FORECAST_HISTORY_DAYS", "9223372036854775807"),
        ]);
        assert!(matches!(result, Err(ConfigError::Pipeline(_))));
    }

    #[test]
    fn test_addr_formatting() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/inventory"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
