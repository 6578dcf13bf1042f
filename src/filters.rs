// Filter registry: option lists per categorical dimension and the
// AND-across / OR-within record predicate.
use crate::types::Record;
use crate::util::natural_cmp;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Categorical dimension a record can be filtered on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Year,
    Region,
    City,
    Jk,
    Client,
    Status,
    ObjectType,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Year,
        Dimension::Region,
        Dimension::City,
        Dimension::Jk,
        Dimension::Client,
        Dimension::Status,
        Dimension::ObjectType,
    ];

    /// The record's value for this dimension.
    pub fn value_of(self, record: &Record) -> &str {
        match self {
            Dimension::Year => &record.year,
            Dimension::Region => &record.region,
            Dimension::City => &record.city,
            Dimension::Jk => &record.jk,
            Dimension::Client => &record.client,
            Dimension::Status => &record.status,
            Dimension::ObjectType => &record.object_type,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Year => "Год",
            Dimension::Region => "Регион",
            Dimension::City => "Город",
            Dimension::Jk => "ЖК",
            Dimension::Client => "Заказчик",
            Dimension::Status => "Статус",
            Dimension::ObjectType => "Тип объекта",
        }
    }
}

/// Selected values per dimension. An empty set means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub years: BTreeSet<String>,
    pub regions: BTreeSet<String>,
    pub cities: BTreeSet<String>,
    pub jks: BTreeSet<String>,
    pub clients: BTreeSet<String>,
    pub statuses: BTreeSet<String>,
    pub object_types: BTreeSet<String>,
}

impl FilterState {
    pub fn selection(&self, dim: Dimension) -> &BTreeSet<String> {
        match dim {
            Dimension::Year => &self.years,
            Dimension::Region => &self.regions,
            Dimension::City => &self.cities,
            Dimension::Jk => &self.jks,
            Dimension::Client => &self.clients,
            Dimension::Status => &self.statuses,
            Dimension::ObjectType => &self.object_types,
        }
    }

    fn selection_mut(&mut self, dim: Dimension) -> &mut BTreeSet<String> {
        match dim {
            Dimension::Year => &mut self.years,
            Dimension::Region => &mut self.regions,
            Dimension::City => &mut self.cities,
            Dimension::Jk => &mut self.jks,
            Dimension::Client => &mut self.clients,
            Dimension::Status => &mut self.statuses,
            Dimension::ObjectType => &mut self.object_types,
        }
    }

    /// New state with `value` flipped in `dim`; other dimensions untouched.
    pub fn toggled(&self, dim: Dimension, value: &str) -> Self {
        let mut next = self.clone();
        let set = next.selection_mut(dim);
        if !set.remove(value) {
            set.insert(value.to_string());
        }
        next
    }

    /// New state with `dim` set to every option currently offered.
    ///
    /// This is not the same as [`FilterState::cleared`]: the explicit list
    /// stays fixed even if the option universe later grows.
    pub fn with_all(&self, dim: Dimension, options: &FilterOptions) -> Self {
        let mut next = self.clone();
        *next.selection_mut(dim) = options.values(dim).iter().cloned().collect();
        next
    }

    /// New state with no restriction on `dim`.
    pub fn cleared(&self, dim: Dimension) -> Self {
        let mut next = self.clone();
        next.selection_mut(dim).clear();
        next
    }

    /// New state with `dim` restricted to exactly `values`.
    pub fn with_selection<I, S>(&self, dim: Dimension, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        *next.selection_mut(dim) = values.into_iter().map(Into::into).collect();
        next
    }

    pub fn is_unrestricted(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.selection(*d).is_empty())
    }

    pub fn matches(&self, record: &Record) -> bool {
        Dimension::ALL.iter().all(|&dim| {
            let selected = self.selection(dim);
            selected.is_empty() || selected.contains(dim.value_of(record))
        })
    }
}

/// Sorted distinct values per dimension, always taken from the unfiltered
/// record universe.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub years: Vec<String>,
    pub regions: Vec<String>,
    pub cities: Vec<String>,
    pub jks: Vec<String>,
    pub clients: Vec<String>,
    pub statuses: Vec<String>,
    pub object_types: Vec<String>,
}

impl FilterOptions {
    pub fn values(&self, dim: Dimension) -> &[String] {
        match dim {
            Dimension::Year => &self.years,
            Dimension::Region => &self.regions,
            Dimension::City => &self.cities,
            Dimension::Jk => &self.jks,
            Dimension::Client => &self.clients,
            Dimension::Status => &self.statuses,
            Dimension::ObjectType => &self.object_types,
        }
    }

    pub fn is_empty(&self) -> bool {
        Dimension::ALL.iter().all(|d| self.values(*d).is_empty())
    }
}

fn distinct_sorted(records: &[Record], dim: Dimension) -> Vec<String> {
    let seen: HashSet<&str> = records
        .iter()
        .map(|r| dim.value_of(r))
        .filter(|v| !v.is_empty())
        .collect();
    let mut values: Vec<String> = seen.into_iter().map(str::to_string).collect();
    values.sort_by(|a, b| natural_cmp(a, b));
    values
}

pub fn derive_options(all_records: &[Record]) -> FilterOptions {
    FilterOptions {
        years: distinct_sorted(all_records, Dimension::Year),
        regions: distinct_sorted(all_records, Dimension::Region),
        cities: distinct_sorted(all_records, Dimension::City),
        jks: distinct_sorted(all_records, Dimension::Jk),
        clients: distinct_sorted(all_records, Dimension::Client),
        statuses: distinct_sorted(all_records, Dimension::Status),
        object_types: distinct_sorted(all_records, Dimension::ObjectType),
    }
}

/// Records passing `state`, in input order.
pub fn apply_filters(all_records: &[Record], state: &FilterState) -> Vec<Record> {
    if state.is_unrestricted() {
        return all_records.to_vec();
    }
    let filtered: Vec<Record> = all_records
        .iter()
        .filter(|r| state.matches(r))
        .cloned()
        .collect();
    tracing::debug!("filters kept {} of {} records", filtered.len(), all_records.len());
    filtered
}
