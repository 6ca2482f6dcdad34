use serde::{Deserialize, Serialize};
use std::{ops::RangeInclusive, path::PathBuf};

use crate::ConfigError;

const WARNING_PERCENT_RANGE: RangeInclusive<u8> = 1..=100;
const TRAILING_MONTHS_RANGE: RangeInclusive<u32> = 1..=24;
const DATA_DIR_NAME: &str = "Tally";

/// Engine settings shared by every tracker opened from the same data directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Percent of a limit above which a budget warning is raised.
    #[serde(default = "Config::default_warning_threshold_percent")]
    pub warning_threshold_percent: u8,
    /// Whole months of history behind a forecast.
    #[serde(default = "Config::default_forecast_trailing_months")]
    pub forecast_trailing_months: u32,
    #[serde(default = "Config::default_log_filter")]
    pub log_filter: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Optional custom root directory for store files. Defaults to `~/Documents/Tally`.
    pub data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            warning_threshold_percent: Self::default_warning_threshold_percent(),
            forecast_trailing_months: Self::default_forecast_trailing_months(),
            log_filter: Self::default_log_filter(),
            data_dir: None,
        }
    }
}

impl Config {
    pub fn default_warning_threshold_percent() -> u8 {
        90
    }

    pub fn default_forecast_trailing_months() -> u32 {
        3
    }

    pub fn default_log_filter() -> String {
        "tally=info".into()
    }

    /// Rejects values the evaluator and forecaster cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !WARNING_PERCENT_RANGE.contains(&self.warning_threshold_percent) {
            return Err(ConfigError::Invalid(format!(
                "warning_threshold_percent must be between {} and {}, got {}",
                WARNING_PERCENT_RANGE.start(),
                WARNING_PERCENT_RANGE.end(),
                self.warning_threshold_percent
            )));
        }
        if !TRAILING_MONTHS_RANGE.contains(&self.forecast_trailing_months) {
            return Err(ConfigError::Invalid(format!(
                "forecast_trailing_months must be between {} and {}, got {}",
                TRAILING_MONTHS_RANGE.start(),
                TRAILING_MONTHS_RANGE.end(),
                self.forecast_trailing_months
            )));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Invalid("log_filter must not be empty".into()));
        }
        Ok(())
    }

    pub fn resolve_data_dir(&self) -> PathBuf {
        if let Some(path) = &self.data_dir {
            return path.clone();
        }

        let base = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        base.join(DATA_DIR_NAME)
    }
}
