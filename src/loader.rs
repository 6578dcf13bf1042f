// Row normalizer: turns a raw spreadsheet table into typed `Record`s.
//
// Columns are resolved by exact header name, never by position. A missing
// required column empties the whole result instead of failing.
use crate::config::{ColumnNames, Settings};
use crate::error::Result;
use crate::types::{MetricKey, Record};
use crate::util::{clean_text, parse_bool_safe, parse_date_safe, parse_f64_safe};
use chrono::Datelike;
use csv::ReaderBuilder;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Snapshot of a sheet: stacked header rows plus data rows, all as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<Vec<String>>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<Vec<String>>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Single header row convenience constructor.
    pub fn from_strs(header: &[&str], rows: &[&[&str]]) -> Self {
        let to_row = |r: &[&str]| r.iter().map(|c| c.to_string()).collect::<Vec<_>>();
        Self {
            headers: vec![to_row(header)],
            rows: rows.iter().map(|r| to_row(r)).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub total_rows: usize,
    pub kept_rows: usize,
    pub dropped_total_rows: usize,
    pub skipped_rows: usize,
    pub malformed_cells: usize,
    pub missing_columns: Vec<String>,
}

pub fn read_table(path: impl AsRef<Path>, header_rows: usize) -> Result<RawTable> {
    let file = std::fs::File::open(path.as_ref())?;
    read_table_from(file, header_rows)
}

/// Read CSV text where the first `header_rows` records are headers.
pub fn read_table_from<R: Read>(reader: R, header_rows: usize) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);
    let mut table = RawTable::default();
    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        let cells: Vec<String> = record.iter().map(|c| c.to_string()).collect();
        if idx < header_rows {
            table.headers.push(cells);
        } else {
            table.rows.push(cells);
        }
    }
    Ok(table)
}

/// Merge stacked header rows into one name per column.
///
/// Upper rows are forward-filled across blank cells (merged ranges export
/// as one value followed by blanks). Parts are joined with a space and a
/// part repeated from the row above is dropped.
pub fn merge_headers(headers: &[Vec<String>]) -> Vec<String> {
    let width = headers.iter().map(Vec::len).max().unwrap_or(0);
    let last = headers.len().saturating_sub(1);
    let filled: Vec<Vec<String>> = headers
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut carry = String::new();
            (0..width)
                .map(|c| {
                    let cell = row.get(c).map(|s| s.trim()).unwrap_or("");
                    if !cell.is_empty() {
                        carry = cell.to_string();
                        carry.clone()
                    } else if i < last {
                        carry.clone()
                    } else {
                        String::new()
                    }
                })
                .collect()
        })
        .collect();

    (0..width)
        .map(|c| {
            let mut parts: Vec<&str> = Vec::new();
            for row in &filled {
                let cell = row[c].as_str();
                if !cell.is_empty() && parts.last() != Some(&cell) {
                    parts.push(cell);
                }
            }
            parts.join(" ")
        })
        .collect()
}

fn metric_header(columns: &ColumnNames, key: MetricKey) -> &str {
    match key {
        MetricKey::Elevators => &columns.elevators,
        MetricKey::Floors => &columns.floors,
        MetricKey::Profit => &columns.profit,
        MetricKey::IncomeEquipment => &columns.income_equipment,
        MetricKey::IncomeInstallation => &columns.income_installation,
        MetricKey::IncomeCommissioning => &columns.income_commissioning,
        MetricKey::IncomeOther => &columns.income_other,
        MetricKey::ExpenseEquipment => &columns.expense_equipment,
        MetricKey::ExpenseInstallation => &columns.expense_installation,
        MetricKey::ExpenseCommissioning => &columns.expense_commissioning,
        MetricKey::ExpenseOther => &columns.expense_other,
        MetricKey::ProfitPerUnit => &columns.profit_per_unit,
    }
}

/// Header-name to column-index lookup. First occurrence wins.
struct ColumnIndex(HashMap<String, usize>);

impl ColumnIndex {
    fn new(names: &[String]) -> Self {
        let mut map = HashMap::new();
        for (i, name) in names.iter().enumerate() {
            if !name.is_empty() {
                map.entry(name.clone()).or_insert(i);
            }
        }
        Self(map)
    }

    fn has(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    fn cell<'r>(&self, row: &'r [String], name: &str) -> Option<&'r str> {
        self.0
            .get(name)
            .and_then(|&i| row.get(i))
            .map(String::as_str)
    }
}

pub fn normalize(table: &RawTable, settings: &Settings) -> (Vec<Record>, NormalizeReport) {
    let cols = &settings.columns;
    let index = ColumnIndex::new(&merge_headers(&table.headers));
    let mut report = NormalizeReport {
        total_rows: table.rows.len(),
        ..Default::default()
    };

    report.missing_columns = [&cols.city, &cols.jk, &cols.elevators]
        .into_iter()
        .filter(|name| !index.has(name))
        .cloned()
        .collect();
    if !report.missing_columns.is_empty() {
        tracing::warn!(
            "required columns missing: {}; no data",
            report.missing_columns.join(", ")
        );
        return (Vec::new(), report);
    }

    let has_detail_marker = index.has(&cols.separate_detail);
    let mut records = Vec::with_capacity(table.rows.len());

    for row in &table.rows {
        if row.iter().all(|c| c.trim().is_empty()) {
            report.skipped_rows += 1;
            continue;
        }
        if parse_bool_safe(index.cell(row, &cols.total_row)) {
            report.dropped_total_rows += 1;
            continue;
        }
        let (Some(city), Some(jk)) = (
            clean_text(index.cell(row, &cols.city)),
            clean_text(index.cell(row, &cols.jk)),
        ) else {
            report.skipped_rows += 1;
            continue;
        };

        let mut record = Record {
            city,
            jk,
            liter: clean_text(index.cell(row, &cols.liter))
                .unwrap_or_else(|| settings.no_breakdown_label.clone()),
            ..Default::default()
        };

        for key in MetricKey::ALL {
            let cell = index.cell(row, metric_header(cols, key));
            let value = match parse_f64_safe(cell) {
                Some(v) => v,
                None => {
                    if cell.is_some_and(|c| !c.trim().is_empty()) {
                        report.malformed_cells += 1;
                    }
                    0.0
                }
            };
            record.metrics.set(key, value);
        }

        record.handed_over = parse_bool_safe(index.cell(row, &cols.handed_over));
        record.status = if record.handed_over {
            settings.status_labels.handed_over.clone()
        } else {
            settings.status_labels.in_progress.clone()
        };
        record.client = clean_text(index.cell(row, &cols.client)).unwrap_or_default();
        record.object_type = clean_text(index.cell(row, &cols.object_type)).unwrap_or_default();
        record.region = clean_text(index.cell(row, &cols.region)).unwrap_or_default();
        record.handover_date = parse_date_safe(index.cell(row, &cols.handover_date));
        record.year = clean_text(index.cell(row, &cols.year))
            .or_else(|| record.handover_date.map(|d| d.year().to_string()))
            .unwrap_or_default();
        record.contract_id = parse_f64_safe(index.cell(row, &cols.contract_id));
        record.is_aggregate = parse_bool_safe(index.cell(row, &cols.aggregate_row));
        record.is_separate_detail = if has_detail_marker {
            parse_bool_safe(index.cell(row, &cols.separate_detail))
        } else {
            !record.is_aggregate
        };

        records.push(record);
    }

    report.kept_rows = records.len();
    tracing::info!(
        "normalized {} of {} rows ({} total rows dropped, {} skipped, {} malformed cells)",
        report.kept_rows,
        report.total_rows,
        report.dropped_total_rows,
        report.skipped_rows,
        report.malformed_cells
    );
    (records, report)
}
