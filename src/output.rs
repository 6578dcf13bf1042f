use crate::aggregate::{Rollup, TreeNode};
use crate::error::Result;
use crate::util::{format_number, format_percent};
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Flattened rollup line for CSV export and console previews.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct RollupRow {
    #[serde(rename = "Path")]
    #[tabled(rename = "Path")]
    pub path: String,
    #[serde(rename = "Name")]
    #[tabled(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
    #[serde(rename = "PctOfParent")]
    #[tabled(rename = "PctOfParent")]
    pub percent_of_parent: String,
    #[serde(rename = "PctOfTotal")]
    #[tabled(rename = "PctOfTotal")]
    pub percent_of_total: String,
}

/// Depth-first rows, children indented under their parent.
pub fn rollup_rows(rollup: &Rollup, max_depth: usize) -> Vec<RollupRow> {
    fn walk(out: &mut Vec<RollupRow>, node: &TreeNode, decimals: usize, indent: usize, max_depth: usize) {
        out.push(RollupRow {
            path: node.path.encode(),
            name: format!("{}{}", "  ".repeat(indent), node.name),
            value: format_number(node.value, decimals),
            percent_of_parent: format_percent(node.percent_of_parent),
            percent_of_total: format_percent(node.percent_of_total),
        });
        if indent + 1 < max_depth {
            for child in &node.children {
                walk(out, child, decimals, indent + 1, max_depth);
            }
        }
    }

    let mut out = Vec::new();
    for city in &rollup.cities {
        walk(&mut out, city, rollup.metric.decimals(), 0, max_depth);
    }
    out
}

pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &str, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, or "(no rows)".
pub fn preview_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::build_tree;
    use crate::types::{MetricKey, Record};

    fn rollup() -> Rollup {
        let records = vec![
            Record::new("A", "J", "1").with_metric(MetricKey::Elevators, 3.0),
            Record::new("A", "J", "2").with_metric(MetricKey::Elevators, 1.0),
        ];
        build_tree(&records, MetricKey::Elevators)
    }

    #[test]
    fn test_rollup_rows_depth_limit() {
        let r = rollup();
        assert_eq!(rollup_rows(&r, 1).len(), 1);
        let rows = rollup_rows(&r, 3);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "  J", "    1", "    2"]);
        assert_eq!(rows[2].percent_of_parent, "75");
        assert_eq!(rows[2].path, "city:A|jk:J|liter:1");
    }

    #[test]
    fn test_preview_table() {
        assert_eq!(preview_table::<RollupRow>(&[], 5), "(no rows)");
        let table = preview_table(&rollup_rows(&rollup(), 3), 2);
        assert!(table.contains("| Path"));
        assert!(table.contains("city:A|jk:J"));
        assert!(!table.contains("liter:1"));
    }

    #[test]
    fn test_write_json_roundtrip() {
        let path = std::env::temp_dir().join(format!("rollup_test_{}.json", std::process::id()));
        let path_str = path.to_string_lossy().to_string();
        write_json(&path_str, &rollup_rows(&rollup(), 1)).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"PctOfTotal\": \"100\""));
        std::fs::remove_file(&path).ok();
    }
}
