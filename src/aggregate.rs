// Aggregation engine: City → JK → Liter rollup over filtered records.
//
// The tree is rebuilt from scratch for every (records, metric, mode) input;
// node values and percentages always reflect the metric passed in.
use crate::config::StatusLabels;
use crate::grouping::group_liters;
use crate::path::{Level, NodePath};
use crate::types::{ColorMode, MetricKey, MetricKind, Metrics, Record};
use crate::util::{desc_f64, natural_cmp, percent_of};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tabled::Tabled;

/// Distinct text values contributing to a node, each sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Facets {
    pub clients: Vec<String>,
    pub cities: Vec<String>,
    pub jks: Vec<String>,
    pub statuses: Vec<String>,
    pub object_types: Vec<String>,
    pub years: Vec<String>,
}

/// All metric values of a node plus its text facets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSnapshot {
    pub metrics: Metrics,
    pub record_count: usize,
    pub facets: Facets,
}

impl MetricSnapshot {
    pub fn get(&self, key: MetricKey) -> f64 {
        self.metrics.get(key)
    }

    /// A single record's own values; detail-only metrics are taken as-is.
    pub fn from_record(record: &Record) -> Self {
        let mut agg = Aggregator::default();
        agg.add_facets(record);
        let mut snapshot = agg.snapshot();
        snapshot.metrics = record.metrics;
        snapshot.record_count = 1;
        snapshot
    }
}

/// Running totals for one node.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    sums: Metrics,
    count: usize,
    handed_over: usize,
    clients: BTreeSet<String>,
    cities: BTreeSet<String>,
    jks: BTreeSet<String>,
    statuses: BTreeSet<String>,
    object_types: BTreeSet<String>,
    years: BTreeSet<String>,
}

impl Aggregator {
    pub fn add(&mut self, record: &Record) {
        for (key, value) in record.metrics.iter() {
            if key.kind() == MetricKind::DetailOnly && !record.is_separate_detail {
                continue;
            }
            self.sums.set(key, self.sums.get(key) + value);
        }
        self.count += 1;
        if record.handed_over {
            self.handed_over += 1;
        }
        self.add_facets(record);
    }

    fn add_facets(&mut self, record: &Record) {
        let insert = |set: &mut BTreeSet<String>, v: &str| {
            if !v.is_empty() && !set.contains(v) {
                set.insert(v.to_string());
            }
        };
        insert(&mut self.clients, &record.client);
        insert(&mut self.cities, &record.city);
        insert(&mut self.jks, &record.jk);
        insert(&mut self.statuses, &record.status);
        insert(&mut self.object_types, &record.object_type);
        insert(&mut self.years, &record.year);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn value(&self, key: MetricKey) -> f64 {
        match key.kind() {
            MetricKind::Average if self.count == 0 => 0.0,
            MetricKind::Average => self.sums.get(key) / self.count as f64,
            _ => self.sums.get(key),
        }
    }

    /// Status label for by-status coloring: one status or "mixed".
    pub fn status(&self, labels: &StatusLabels) -> String {
        if self.count > 0 && self.handed_over == self.count {
            labels.handed_over.clone()
        } else if self.handed_over == 0 {
            labels.in_progress.clone()
        } else {
            labels.mixed.clone()
        }
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        let mut metrics = Metrics::default();
        for key in MetricKey::ALL {
            metrics.set(key, self.value(key));
        }
        let sorted = |set: &BTreeSet<String>| {
            let mut v: Vec<String> = set.iter().cloned().collect();
            v.sort_by(|a, b| natural_cmp(a, b));
            v
        };
        MetricSnapshot {
            metrics,
            record_count: self.count,
            facets: Facets {
                clients: sorted(&self.clients),
                cities: sorted(&self.cities),
                jks: sorted(&self.jks),
                statuses: sorted(&self.statuses),
                object_types: sorted(&self.object_types),
                years: sorted(&self.years),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeNode {
    pub path: NodePath,
    pub name: String,
    pub level: Level,
    /// Value of the active metric.
    pub value: f64,
    pub percent_of_parent: f64,
    pub percent_of_total: f64,
    pub color_key: String,
    pub snapshot: MetricSnapshot,
    /// Contract number; liters only.
    pub contract_id: Option<f64>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Depth-first search for the node at `path` within this subtree.
    pub fn find(&self, path: &NodePath) -> Option<&TreeNode> {
        if &self.path == path {
            return Some(self);
        }
        if !self.path.is_ancestor_of(path) {
            return None;
        }
        self.children.iter().find_map(|c| c.find(path))
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    pub color_mode: ColorMode,
    pub status_labels: StatusLabels,
}

/// Output of one rollup: top-level city nodes plus the grand total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub metric: MetricKey,
    pub color_mode: ColorMode,
    pub total: f64,
    pub record_count: usize,
    pub cities: Vec<TreeNode>,
}

impl Rollup {
    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    /// Node addressed by `path`; `None` for the root or unknown paths.
    pub fn find(&self, path: &NodePath) -> Option<&TreeNode> {
        self.cities.iter().find_map(|c| c.find(path))
    }

    /// Children shown at the chart center `path`. The root shows all cities.
    pub fn children_at(&self, path: &NodePath) -> &[TreeNode] {
        if path.is_root() {
            return &self.cities;
        }
        self.find(path).map(|n| n.children.as_slice()).unwrap_or(&[])
    }
}

#[derive(Default)]
struct JkAcc {
    agg: Aggregator,
    records: Vec<Record>,
}

#[derive(Default)]
struct CityAcc {
    agg: Aggregator,
    jks: HashMap<String, JkAcc>,
}

pub fn build_tree(records: &[Record], metric: MetricKey) -> Rollup {
    build_tree_with(records, metric, &BuildOptions::default())
}

pub fn build_tree_with(records: &[Record], metric: MetricKey, options: &BuildOptions) -> Rollup {
    let mut grand = Aggregator::default();
    let mut cities: HashMap<String, CityAcc> = HashMap::new();
    for r in records {
        grand.add(r);
        let city = cities.entry(r.city.clone()).or_default();
        city.agg.add(r);
        let jk = city.jks.entry(r.jk.clone()).or_default();
        jk.agg.add(r);
        jk.records.push(r.clone());
    }

    let total = grand.value(metric);
    let mut city_nodes: Vec<TreeNode> = cities
        .into_iter()
        .map(|(city_name, city)| {
            let city_path = NodePath::city(&city_name);
            let jk_nodes: Vec<TreeNode> = city
                .jks
                .into_iter()
                .map(|(jk_name, jk)| {
                    let jk_path = city_path.child(&jk_name);
                    let mut taken = HashSet::new();
                    let leaves: Vec<TreeNode> = jk
                        .records
                        .iter()
                        .map(|r| {
                            let segment = unique_segment(&mut taken, &r.liter);
                            liter_node(jk_path.child(&segment), r, metric, options)
                        })
                        .collect();
                    let color_key = match options.color_mode {
                        ColorMode::ByJk => jk_name.clone(),
                        ColorMode::ByStatus => jk.agg.status(&options.status_labels),
                    };
                    TreeNode {
                        path: jk_path,
                        name: jk_name,
                        level: Level::Jk,
                        value: jk.agg.value(metric),
                        percent_of_parent: 0.0,
                        percent_of_total: 0.0,
                        color_key,
                        snapshot: jk.agg.snapshot(),
                        contract_id: None,
                        children: group_liters(leaves),
                    }
                })
                .collect();
            let color_key = match options.color_mode {
                ColorMode::ByJk => city_name.clone(),
                ColorMode::ByStatus => city.agg.status(&options.status_labels),
            };
            TreeNode {
                path: city_path,
                name: city_name,
                level: Level::City,
                value: city.agg.value(metric),
                percent_of_parent: 0.0,
                percent_of_total: 0.0,
                color_key,
                snapshot: city.agg.snapshot(),
                contract_id: None,
                children: jk_nodes,
            }
        })
        .collect();

    assign_percentages(&mut city_nodes, total, total);
    rank_siblings(&mut city_nodes);

    tracing::debug!(
        "rollup of {} records by {}: {} cities, total {}",
        records.len(),
        metric,
        city_nodes.len(),
        total
    );
    Rollup {
        metric,
        color_mode: options.color_mode,
        total,
        record_count: records.len(),
        cities: city_nodes,
    }
}

/// Path segment for a liter within its JK. A name already used by an earlier
/// record of the same JK gets an ordinal suffix: "Без разбивки (2)".
fn unique_segment(taken: &mut HashSet<String>, name: &str) -> String {
    let mut segment = name.to_string();
    let mut ordinal = 1;
    while !taken.insert(segment.clone()) {
        ordinal += 1;
        segment = format!("{} ({})", name, ordinal);
    }
    segment
}

fn liter_node(path: NodePath, record: &Record, metric: MetricKey, options: &BuildOptions) -> TreeNode {
    let color_key = match options.color_mode {
        ColorMode::ByJk => record.jk.clone(),
        ColorMode::ByStatus => record.status.clone(),
    };
    TreeNode {
        path,
        name: record.liter.clone(),
        level: Level::Liter,
        value: record.metric(metric),
        percent_of_parent: 0.0,
        percent_of_total: 0.0,
        color_key,
        snapshot: MetricSnapshot::from_record(record),
        contract_id: record.contract_id,
        children: Vec::new(),
    }
}

/// Shares for one ring of siblings. Cities and JKs are measured against
/// their parent's value. A ring of liters is measured against its own sum:
/// aggregate liters and contract members do not add up to the JK value.
fn assign_percentages(nodes: &mut [TreeNode], parent_value: f64, total: f64) {
    let base = if nodes.first().is_some_and(|n| n.level == Level::Liter) {
        nodes.iter().map(|n| n.value).sum()
    } else {
        parent_value
    };
    for node in nodes.iter_mut() {
        node.percent_of_parent = percent_of(node.value, base);
        node.percent_of_total = percent_of(node.value, total);
        let value = node.value;
        assign_percentages(&mut node.children, value, total);
    }
}

fn by_rank(a: &TreeNode, b: &TreeNode) -> Ordering {
    desc_f64(a.value, b.value).then_with(|| natural_cmp(&a.name, &b.name))
}

/// Orders each sibling list by descending active value. Children nested
/// under a contract parent keep their name order.
fn rank_siblings(nodes: &mut [TreeNode]) {
    nodes.sort_by(by_rank);
    for node in nodes.iter_mut() {
        if node.level != Level::Liter {
            rank_siblings(&mut node.children);
        }
    }
}

/// Row of the flat catalog view.
#[derive(Debug, Clone, PartialEq, Serialize, Tabled)]
pub struct CatalogRow {
    #[serde(rename = "City")]
    #[tabled(rename = "City")]
    pub city: String,
    #[serde(rename = "JK")]
    #[tabled(rename = "JK")]
    pub jk: String,
    #[serde(rename = "Liter")]
    #[tabled(rename = "Liter")]
    pub liter: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Client")]
    #[tabled(rename = "Client")]
    pub client: String,
}

/// Filtered records in lexical (natural) city/JK/liter order.
pub fn catalog(records: &[Record], metric: MetricKey) -> Vec<CatalogRow> {
    let mut rows: Vec<CatalogRow> = records
        .iter()
        .map(|r| CatalogRow {
            city: r.city.clone(),
            jk: r.jk.clone(),
            liter: r.liter.clone(),
            value: r.metric(metric),
            status: r.status.clone(),
            client: r.client.clone(),
        })
        .collect();
    rows.sort_by(|a, b| {
        natural_cmp(&a.city, &b.city)
            .then_with(|| natural_cmp(&a.jk, &b.jk))
            .then_with(|| natural_cmp(&a.liter, &b.liter))
    });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn units(city: &str, jk: &str, liter: &str, n: f64) -> Record {
        Record::new(city, jk, liter).with_metric(MetricKey::Elevators, n)
    }

    fn scenario() -> Vec<Record> {
        vec![
            units("City A", "JK1", "Liter1", 10.0).with_metric(MetricKey::Profit, 100.0),
            units("City A", "JK1", "Liter2", 5.0).with_metric(MetricKey::Profit, 300.0),
            units("City B", "JK2", "Liter3", 20.0).with_metric(MetricKey::Profit, 50.0),
        ]
    }

    #[test]
    fn test_three_record_rollup() {
        let rollup = build_tree(&scenario(), MetricKey::Elevators);
        assert_eq!(rollup.total, 35.0);
        let names: Vec<&str> = rollup.cities.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["City B", "City A"]);
        assert_eq!(rollup.cities[0].value, 20.0);
        assert_eq!(rollup.cities[0].percent_of_parent, 57.1);
        assert_eq!(rollup.cities[1].value, 15.0);
        assert_eq!(rollup.cities[1].percent_of_parent, 42.9);

        let jk1 = rollup.find(&NodePath::jk("City A", "JK1")).unwrap();
        assert_eq!(jk1.value, 15.0);
        assert_eq!(jk1.percent_of_parent, 100.0);
        assert_eq!(jk1.percent_of_total, 42.9);
        let liters: Vec<(&str, f64)> = jk1.children.iter().map(|l| (l.name.as_str(), l.percent_of_parent)).collect();
        assert_eq!(liters, vec![("Liter1", 66.7), ("Liter2", 33.3)]);
    }

    #[test]
    fn test_switching_metric_reorders_without_reshaping() {
        let by_units = build_tree(&scenario(), MetricKey::Elevators);
        let by_profit = build_tree(&scenario(), MetricKey::Profit);
        assert_eq!(by_profit.total, 450.0);
        assert_eq!(by_profit.cities[0].name, "City A");
        assert_eq!(by_profit.cities[0].percent_of_parent, 88.9);
        let jk1 = by_profit.find(&NodePath::jk("City A", "JK1")).unwrap();
        assert_eq!(jk1.children[0].name, "Liter2");

        let shape = |r: &Rollup| {
            let mut paths: Vec<String> = r
                .cities
                .iter()
                .flat_map(|c| c.children.iter().flat_map(|j| j.children.iter().map(|l| l.path.encode())))
                .collect();
            paths.sort();
            paths
        };
        assert_eq!(shape(&by_units), shape(&by_profit));
    }

    #[test]
    fn test_detail_only_counts_skip_aggregate_rows() {
        let mut aggregate = units("Сочи", "ЖК Море", "Без разбивки", 8.0).with_metric(MetricKey::Profit, 1000.0);
        aggregate.is_aggregate = true;
        aggregate.is_separate_detail = false;
        let records = vec![
            aggregate,
            units("Сочи", "ЖК Море", "Литер 1", 5.0).with_metric(MetricKey::Profit, 10.0),
            units("Сочи", "ЖК Море", "Литер 2", 3.0).with_metric(MetricKey::Profit, 20.0),
        ];
        let rollup = build_tree(&records, MetricKey::Elevators);
        let jk = rollup.find(&NodePath::jk("Сочи", "ЖК Море")).unwrap();
        assert_eq!(jk.value, 8.0);
        assert_eq!(rollup.total, 8.0);
        // the aggregate leaf still shows its own reported count
        let leaf = jk.children.iter().find(|l| l.name == "Без разбивки").unwrap();
        assert_eq!(leaf.value, 8.0);

        let by_profit = build_tree(&records, MetricKey::Profit);
        assert_eq!(by_profit.total, 1030.0);
    }

    #[test]
    fn test_average_metric_uses_record_count() {
        let records = vec![
            units("A", "J1", "1", 1.0).with_metric(MetricKey::ProfitPerUnit, 100.0),
            units("A", "J1", "2", 1.0).with_metric(MetricKey::ProfitPerUnit, 200.0),
            units("A", "J2", "3", 1.0).with_metric(MetricKey::ProfitPerUnit, 600.0),
        ];
        let rollup = build_tree(&records, MetricKey::ProfitPerUnit);
        assert_eq!(rollup.total, 300.0);
        let city = &rollup.cities[0];
        // (100 + 200 + 600) / 3, not the mean of the JK means (150 and 600)
        assert_eq!(city.value, 300.0);
        assert_eq!(city.snapshot.record_count, 3);
        assert_eq!(rollup.find(&NodePath::jk("A", "J1")).unwrap().value, 150.0);
    }

    #[test]
    fn test_zero_parent_yields_zero_percent() {
        let records = vec![units("A", "J", "1", 0.0), units("A", "J", "2", 0.0)];
        let rollup = build_tree(&records, MetricKey::Elevators);
        let jk = rollup.find(&NodePath::jk("A", "J")).unwrap();
        assert!(jk.children.iter().all(|l| l.percent_of_parent == 0.0 && l.percent_of_total == 0.0));
        assert_eq!(rollup.cities[0].percent_of_parent, 0.0);
    }

    #[test]
    fn test_facets_and_status_color() {
        let records = vec![
            units("A", "J", "1", 1.0).with_status(true, "Сдан"),
            units("A", "J", "2", 1.0).with_status(false, "В работе"),
            units("A", "K", "1", 1.0).with_status(true, "Сдан"),
        ];
        let options = BuildOptions {
            color_mode: ColorMode::ByStatus,
            ..Default::default()
        };
        let rollup = build_tree_with(&records, MetricKey::Elevators, &options);
        let city = &rollup.cities[0];
        assert_eq!(city.color_key, "Частично сдан");
        assert_eq!(city.snapshot.facets.jks, vec!["J", "K"]);
        assert_eq!(city.snapshot.facets.statuses, vec!["В работе", "Сдан"]);
        assert_eq!(rollup.find(&NodePath::jk("A", "K")).unwrap().color_key, "Сдан");

        let by_jk = build_tree(&records, MetricKey::Elevators);
        assert_eq!(by_jk.cities[0].color_key, "A");
        assert_eq!(by_jk.find(&NodePath::jk("A", "K")).unwrap().color_key, "K");
    }

    #[test]
    fn test_empty_input() {
        let rollup = build_tree(&[], MetricKey::Profit);
        assert!(rollup.is_empty());
        assert_eq!(rollup.total, 0.0);
        assert!(rollup.children_at(&NodePath::root()).is_empty());
    }

    fn contract_records() -> Vec<Record> {
        vec![
            units("A", "J", "Литер 5.5", 2.0).with_contract(5.5).with_metric(MetricKey::Profit, 2.0),
            units("A", "J", "Все", 5.0).with_contract(5.999).with_metric(MetricKey::Profit, 5.0),
            units("A", "J", "Литер 5", 3.0).with_contract(5.0).with_metric(MetricKey::Profit, 3.0),
            units("A", "J", "Литер 7", 1.0).with_contract(7.0).with_metric(MetricKey::Profit, 1.0),
            units("A", "J", "Литер 7.5", 4.0).with_contract(7.5).with_metric(MetricKey::Profit, 4.0),
        ]
    }

    #[test]
    fn test_contract_members_are_addressable() {
        let rollup = build_tree(&contract_records(), MetricKey::Profit);
        let parent_path = NodePath::liter("A", "J", "Все");
        let parent = rollup.find(&parent_path).unwrap();
        assert_eq!(parent.children.len(), 2);

        let member = rollup.find(&parent_path.child("Литер 5")).unwrap();
        assert_eq!(member.name, "Литер 5");
        assert_eq!(member.value, 3.0);
        assert_eq!(rollup.children_at(&parent_path).len(), 2);
        // a member is not reachable as a direct child of the JK
        assert!(rollup.find(&NodePath::liter("A", "J", "Литер 5")).is_none());
    }

    #[test]
    fn test_liter_rings_add_up_to_hundred() {
        let rollup = build_tree(&contract_records(), MetricKey::Profit);
        let jk = rollup.find(&NodePath::jk("A", "J")).unwrap();
        let ring: Vec<(&str, f64)> = jk.children.iter().map(|l| (l.name.as_str(), l.percent_of_parent)).collect();
        assert_eq!(ring, vec![("Все", 50.0), ("Литер 7.5", 40.0), ("Литер 7", 10.0)]);
        let members: Vec<f64> = jk.children[0].children.iter().map(|l| l.percent_of_parent).collect();
        assert_eq!(members, vec![60.0, 40.0]);
        assert_eq!(jk.children[0].percent_of_total, 33.3);
    }

    #[test]
    fn test_repeated_liter_names_get_distinct_paths() {
        let records = vec![
            units("A", "J", "Без разбивки", 2.0).with_metric(MetricKey::Profit, 10.0),
            units("A", "J", "Без разбивки", 7.0).with_metric(MetricKey::Profit, 20.0),
        ];
        let rollup = build_tree(&records, MetricKey::Profit);
        let first = rollup.find(&NodePath::liter("A", "J", "Без разбивки")).unwrap();
        let second = rollup.find(&NodePath::liter("A", "J", "Без разбивки (2)")).unwrap();
        assert_eq!(first.name, second.name);
        assert_eq!(first.value, 10.0);
        assert_eq!(second.value, 20.0);
        assert_eq!(second.snapshot.get(MetricKey::Elevators), 7.0);

        // ordinals follow input order, so a rebuild gives the same paths
        let again = build_tree(&records, MetricKey::Elevators);
        assert_eq!(again.find(&second.path).unwrap().value, 7.0);
    }

    #[test]
    fn test_catalog_is_lexical() {
        let records = vec![
            units("Б", "ЖК 10", "2", 1.0),
            units("А", "ЖК 2", "10", 9.0),
            units("А", "ЖК 2", "9", 3.0),
        ];
        let rows = catalog(&records, MetricKey::Elevators);
        let keys: Vec<(&str, &str)> = rows.iter().map(|r| (r.city.as_str(), r.liter.as_str())).collect();
        assert_eq!(keys, vec![("А", "9"), ("А", "10"), ("Б", "2")]);
    }
}
