// Runtime settings: header names, labels and tooltip timings.
//
// Everything has a default so a missing or partial JSON file still yields a
// usable configuration.
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const CONFIG_ENV: &str = "ROLLUP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "rollup.json";

/// Exact header strings (after stacked-header merge) for each semantic field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnNames {
    pub city: String,
    pub jk: String,
    pub liter: String,
    pub elevators: String,
    pub floors: String,
    pub profit: String,
    pub income_equipment: String,
    pub income_installation: String,
    pub income_commissioning: String,
    pub income_other: String,
    pub expense_equipment: String,
    pub expense_installation: String,
    pub expense_commissioning: String,
    pub expense_other: String,
    pub profit_per_unit: String,
    pub contract_id: String,
    pub client: String,
    pub object_type: String,
    pub year: String,
    pub region: String,
    pub handed_over: String,
    pub handover_date: String,
    pub total_row: String,
    pub aggregate_row: String,
    pub separate_detail: String,
}

impl Default for ColumnNames {
    fn default() -> Self {
        Self {
            city: "Город".into(),
            jk: "ЖК".into(),
            liter: "Литер".into(),
            elevators: "Кол-во лифтов".into(),
            floors: "Этажность".into(),
            profit: "Валовая прибыль".into(),
            income_equipment: "Доход Оборудование".into(),
            income_installation: "Доход Монтаж".into(),
            income_commissioning: "Доход ПНР".into(),
            income_other: "Доход Прочее".into(),
            expense_equipment: "Расход Оборудование".into(),
            expense_installation: "Расход Монтаж".into(),
            expense_commissioning: "Расход ПНР".into(),
            expense_other: "Расход Прочее".into(),
            profit_per_unit: "Прибыль на лифт".into(),
            contract_id: "№ договора".into(),
            client: "Заказчик".into(),
            object_type: "Тип объекта".into(),
            year: "Год".into(),
            region: "Регион".into(),
            handed_over: "Сдан".into(),
            handover_date: "Дата сдачи".into(),
            total_row: "Итого".into(),
            aggregate_row: "Сводная".into(),
            separate_detail: "Отдельно".into(),
        }
    }
}

/// Labels for the status dimension derived from the handed-over flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusLabels {
    pub handed_over: String,
    pub in_progress: String,
    pub mixed: String,
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self {
            handed_over: "Сдан".into(),
            in_progress: "В работе".into(),
            mixed: "Частично сдан".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TooltipSettings {
    /// Idle time before a tooltip is shown.
    pub show_delay_ms: u64,
    /// Grace period before a visible tooltip is dismissed.
    pub hide_delay_ms: u64,
    /// Text facet values shown before collapsing into "+N".
    pub facet_preview: usize,
}

impl Default for TooltipSettings {
    fn default() -> Self {
        Self {
            show_delay_ms: 600,
            hide_delay_ms: 200,
            facet_preview: 2,
        }
    }
}

impl TooltipSettings {
    pub fn show_delay(&self) -> Duration {
        Duration::from_millis(self.show_delay_ms)
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.hide_delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub columns: ColumnNames,
    /// Number of stacked header rows merged into compound column names.
    pub header_rows: usize,
    /// Liter name used when a row has no section breakdown.
    pub no_breakdown_label: String,
    pub status_labels: StatusLabels,
    pub tooltip: TooltipSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            columns: ColumnNames::default(),
            header_rows: 1,
            no_breakdown_label: "Без разбивки".into(),
            status_labels: StatusLabels::default(),
            tooltip: TooltipSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// Read settings from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&text)?;
        tracing::info!("loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Resolve the config path from `ROLLUP_CONFIG`, falling back to `rollup.json`.
    pub fn load_default() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let settings = Settings::from_json(
            r#"{ "header_rows": 2, "columns": { "city": "City" }, "tooltip": { "show_delay_ms": 900 } }"#,
        )
        .unwrap();
        assert_eq!(settings.header_rows, 2);
        assert_eq!(settings.columns.city, "City");
        assert_eq!(settings.columns.jk, "ЖК");
        assert_eq!(settings.tooltip.show_delay(), Duration::from_millis(900));
        assert_eq!(settings.tooltip.hide_delay_ms, 200);
        assert_eq!(settings.no_breakdown_label, "Без разбивки");
    }

    #[test]
    fn test_missing_file_is_default() {
        let settings = Settings::load("definitely/not/here/rollup.json").unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_bad_json_is_config_error() {
        let err = Settings::from_json("{ not json").unwrap_err();
        assert!(matches!(err, crate::error::RollupError::Config(_)));
    }
}
