//! Shared helpers for presentation.

use crate::config::GeoseriesConfig;
use crate::error::ApiError;
use crate::period::PeriodLabel;
use serde::Serialize;

pub(crate) fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, ApiError> {
    serde_json::to_string_pretty(value).map_err(|e| ApiError::Output(e.to_string()))
}

pub(crate) fn join_periods(periods: &[PeriodLabel]) -> String {
    if periods.is_empty() {
        return "-".to_string();
    }
    periods
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn table() -> comfy_table::Table {
    let mut table = comfy_table::Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table
}

pub fn format_config_toml(config: &GeoseriesConfig) -> Result<String, ApiError> {
    toml::to_string_pretty(config).map_err(|e| ApiError::Output(e.to_string()))
}
