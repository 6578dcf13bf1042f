use crate::error::RollupError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Selectable numeric field driving chart values and percentages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKey {
    Elevators,
    Floors,
    Profit,
    IncomeEquipment,
    IncomeInstallation,
    IncomeCommissioning,
    IncomeOther,
    ExpenseEquipment,
    ExpenseInstallation,
    ExpenseCommissioning,
    ExpenseOther,
    ProfitPerUnit,
}

/// How a metric rolls up from records into a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// Physical counts, summed only from separate-detail rows.
    DetailOnly,
    Sum,
    /// Accumulated sum divided by the node's record count.
    Average,
}

/// Cost line that has both an income and an expense metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ledger {
    Equipment,
    Installation,
    Commissioning,
    Other,
}

impl Ledger {
    pub const ALL: [Ledger; 4] = [
        Ledger::Equipment,
        Ledger::Installation,
        Ledger::Commissioning,
        Ledger::Other,
    ];

    pub fn income(self) -> MetricKey {
        match self {
            Ledger::Equipment => MetricKey::IncomeEquipment,
            Ledger::Installation => MetricKey::IncomeInstallation,
            Ledger::Commissioning => MetricKey::IncomeCommissioning,
            Ledger::Other => MetricKey::IncomeOther,
        }
    }

    pub fn expense(self) -> MetricKey {
        match self {
            Ledger::Equipment => MetricKey::ExpenseEquipment,
            Ledger::Installation => MetricKey::ExpenseInstallation,
            Ledger::Commissioning => MetricKey::ExpenseCommissioning,
            Ledger::Other => MetricKey::ExpenseOther,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Ledger::Equipment => "Оборудование",
            Ledger::Installation => "Монтаж",
            Ledger::Commissioning => "ПНР",
            Ledger::Other => "Прочее",
        }
    }
}

impl MetricKey {
    pub const COUNT: usize = 12;

    pub const ALL: [MetricKey; MetricKey::COUNT] = [
        MetricKey::Elevators,
        MetricKey::Floors,
        MetricKey::Profit,
        MetricKey::IncomeEquipment,
        MetricKey::IncomeInstallation,
        MetricKey::IncomeCommissioning,
        MetricKey::IncomeOther,
        MetricKey::ExpenseEquipment,
        MetricKey::ExpenseInstallation,
        MetricKey::ExpenseCommissioning,
        MetricKey::ExpenseOther,
        MetricKey::ProfitPerUnit,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn kind(self) -> MetricKind {
        match self {
            MetricKey::Elevators | MetricKey::Floors => MetricKind::DetailOnly,
            MetricKey::ProfitPerUnit => MetricKind::Average,
            _ => MetricKind::Sum,
        }
    }

    /// Income/expense pair this metric belongs to, if any.
    pub fn ledger(self) -> Option<Ledger> {
        Ledger::ALL
            .into_iter()
            .find(|l| l.income() == self || l.expense() == self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKey::Elevators => "elevators",
            MetricKey::Floors => "floors",
            MetricKey::Profit => "profit",
            MetricKey::IncomeEquipment => "income_equipment",
            MetricKey::IncomeInstallation => "income_installation",
            MetricKey::IncomeCommissioning => "income_commissioning",
            MetricKey::IncomeOther => "income_other",
            MetricKey::ExpenseEquipment => "expense_equipment",
            MetricKey::ExpenseInstallation => "expense_installation",
            MetricKey::ExpenseCommissioning => "expense_commissioning",
            MetricKey::ExpenseOther => "expense_other",
            MetricKey::ProfitPerUnit => "profit_per_unit",
        }
    }

    /// Human-readable name used in labels and tooltips.
    pub fn label(self) -> &'static str {
        match self {
            MetricKey::Elevators => "Лифты",
            MetricKey::Floors => "Этажи",
            MetricKey::Profit => "Валовая прибыль",
            MetricKey::IncomeEquipment => "Доход: оборудование",
            MetricKey::IncomeInstallation => "Доход: монтаж",
            MetricKey::IncomeCommissioning => "Доход: ПНР",
            MetricKey::IncomeOther => "Доход: прочее",
            MetricKey::ExpenseEquipment => "Расход: оборудование",
            MetricKey::ExpenseInstallation => "Расход: монтаж",
            MetricKey::ExpenseCommissioning => "Расход: ПНР",
            MetricKey::ExpenseOther => "Расход: прочее",
            MetricKey::ProfitPerUnit => "Прибыль на лифт",
        }
    }

    /// Counts are shown without decimals, money with two.
    pub fn decimals(self) -> usize {
        match self {
            MetricKey::Elevators | MetricKey::Floors => 0,
            _ => 2,
        }
    }
}

impl fmt::Display for MetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKey {
    type Err = RollupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKey::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| RollupError::UnknownMetric(s.to_string()))
    }
}

/// One value per `MetricKey`, indexed by the key.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics([f64; MetricKey::COUNT]);

impl Metrics {
    pub fn get(&self, key: MetricKey) -> f64 {
        self.0[key.index()]
    }

    pub fn set(&mut self, key: MetricKey, value: f64) {
        self.0[key.index()] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, f64)> + '_ {
        MetricKey::ALL.into_iter().map(|k| (k, self.get(k)))
    }
}

/// Node coloring/grouping mode requested by the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    ByJk,
    ByStatus,
}

/// One normalized input row. Immutable once produced by the loader.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    pub city: String,
    pub jk: String,
    pub liter: String,
    pub metrics: Metrics,
    pub handed_over: bool,
    pub status: String,
    pub client: String,
    pub object_type: String,
    pub year: String,
    pub region: String,
    pub contract_id: Option<f64>,
    pub is_aggregate: bool,
    pub is_separate_detail: bool,
    pub handover_date: Option<NaiveDate>,
}

impl Record {
    /// Separate-detail record with zeroed metrics; fields are filled with the
    /// `with_*` helpers.
    pub fn new(city: &str, jk: &str, liter: &str) -> Self {
        Self {
            city: city.to_string(),
            jk: jk.to_string(),
            liter: liter.to_string(),
            is_separate_detail: true,
            ..Default::default()
        }
    }

    pub fn with_metric(mut self, key: MetricKey, value: f64) -> Self {
        self.metrics.set(key, value);
        self
    }

    pub fn with_contract(mut self, id: f64) -> Self {
        self.contract_id = Some(id);
        self
    }

    pub fn with_status(mut self, handed_over: bool, status: &str) -> Self {
        self.handed_over = handed_over;
        self.status = status.to_string();
        self
    }

    pub fn metric(&self, key: MetricKey) -> f64 {
        self.metrics.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_parse() {
        assert_eq!("floors".parse::<MetricKey>().unwrap(), MetricKey::Floors);
        for key in MetricKey::ALL {
            assert_eq!(key.as_str().parse::<MetricKey>().unwrap(), key);
        }
        let err = "value".parse::<MetricKey>().unwrap_err();
        assert!(matches!(err, RollupError::UnknownMetric(ref k) if k == "value"));
    }

    #[test]
    fn test_ledger_lookup() {
        assert_eq!(MetricKey::ExpenseInstallation.ledger(), Some(Ledger::Installation));
        assert_eq!(MetricKey::IncomeOther.ledger(), Some(Ledger::Other));
        assert_eq!(MetricKey::Profit.ledger(), None);
    }

    #[test]
    fn test_metric_kinds() {
        assert_eq!(MetricKey::Elevators.kind(), MetricKind::DetailOnly);
        assert_eq!(MetricKey::ProfitPerUnit.kind(), MetricKind::Average);
        assert_eq!(MetricKey::IncomeEquipment.kind(), MetricKind::Sum);
    }
}
