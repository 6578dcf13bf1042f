// Dashboard state: one snapshot of records plus the caller's query.
//
// Every query change rebuilds the whole view (filtered records, options,
// rollup) from the snapshot and swaps it in; nothing is patched in place.
use crate::aggregate::{build_tree_with, catalog, BuildOptions, CatalogRow, Rollup, TreeNode};
use crate::config::{Settings, StatusLabels};
use crate::error::Result;
use crate::filters::{apply_filters, derive_options, Dimension, FilterOptions, FilterState};
use crate::loader::{normalize, read_table, NormalizeReport, RawTable};
use crate::navigator::{list_rows, ListRow, NavEvent, Navigator};
use crate::path::NodePath;
use crate::tooltip::{self, Tooltip};
use crate::types::{ColorMode, MetricKey, Record};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Read-only provider of the raw sheet.
pub trait TableSource {
    fn table(&self) -> Result<RawTable>;
}

impl TableSource for RawTable {
    fn table(&self) -> Result<RawTable> {
        Ok(self.clone())
    }
}

/// CSV export of the contracts sheet.
#[derive(Debug, Clone)]
pub struct CsvSource {
    pub path: PathBuf,
    pub header_rows: usize,
}

impl TableSource for CsvSource {
    fn table(&self) -> Result<RawTable> {
        read_table(&self.path, self.header_rows)
    }
}

/// City/region/year selection pushed in from outside the dashboard
/// (another page, a map click). Each set field replaces that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalOverride {
    pub city: Option<String>,
    pub region: Option<String>,
    pub year: Option<String>,
}

impl ExternalOverride {
    pub fn apply(&self, filters: &FilterState) -> FilterState {
        let mut next = filters.clone();
        for (dim, value) in [
            (Dimension::City, &self.city),
            (Dimension::Region, &self.region),
            (Dimension::Year, &self.year),
        ] {
            if let Some(v) = value {
                next = next.with_selection(dim, [v.clone()]);
            }
        }
        next
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub filters: FilterState,
    pub metric: MetricKey,
    pub color_mode: ColorMode,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            filters: FilterState::default(),
            metric: MetricKey::Elevators,
            color_mode: ColorMode::ByJk,
        }
    }
}

/// Everything the rendering layer consumes for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub filtered: Vec<Record>,
    pub rollup: Rollup,
}

/// Pure recomputation of the view for `query` over the full record set.
pub fn compute(all_records: &[Record], query: &Query, labels: &StatusLabels) -> View {
    let filtered = apply_filters(all_records, &query.filters);
    let options = BuildOptions {
        color_mode: query.color_mode,
        status_labels: labels.clone(),
    };
    let rollup = build_tree_with(&filtered, query.metric, &options);
    View { filtered, rollup }
}

pub struct Dashboard {
    settings: Settings,
    records: Vec<Record>,
    options: FilterOptions,
    report: NormalizeReport,
    query: Query,
    view: View,
    nav: Navigator,
}

impl Dashboard {
    pub fn new(records: Vec<Record>, settings: Settings) -> Self {
        Self::with_report(records, NormalizeReport::default(), settings)
    }

    fn with_report(records: Vec<Record>, report: NormalizeReport, settings: Settings) -> Self {
        let options = derive_options(&records);
        let query = Query::default();
        let view = compute(&records, &query, &settings.status_labels);
        Self {
            settings,
            records,
            options,
            report,
            query,
            view,
            nav: Navigator::new(),
        }
    }

    pub fn from_table(table: &RawTable, settings: Settings) -> Self {
        let (records, report) = normalize(table, &settings);
        Self::with_report(records, report, settings)
    }

    pub fn load(source: &dyn TableSource, settings: Settings) -> Result<Self> {
        let table = source.table()?;
        Ok(Self::from_table(&table, settings))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn report(&self) -> &NormalizeReport {
        &self.report
    }

    /// Option lists from the unfiltered snapshot; filters never change them.
    pub fn options(&self) -> &FilterOptions {
        &self.options
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn rollup(&self) -> &Rollup {
        &self.view.rollup
    }

    pub fn navigator(&self) -> &Navigator {
        &self.nav
    }

    fn set_query(&mut self, query: Query) {
        if query == self.query {
            return;
        }
        self.view = compute(&self.records, &query, &self.settings.status_labels);
        self.query = query;
        self.nav = self.nav.revalidated(&self.view.rollup);
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.set_query(Query {
            filters,
            ..self.query.clone()
        });
    }

    pub fn toggle_filter(&mut self, dim: Dimension, value: &str) {
        self.set_filters(self.query.filters.toggled(dim, value));
    }

    pub fn select_all(&mut self, dim: Dimension) {
        self.set_filters(self.query.filters.with_all(dim, &self.options));
    }

    pub fn clear_filter(&mut self, dim: Dimension) {
        self.set_filters(self.query.filters.cleared(dim));
    }

    pub fn set_metric(&mut self, metric: MetricKey) {
        self.set_query(Query {
            metric,
            ..self.query.clone()
        });
    }

    /// Switch the active metric by its string key. Unknown keys are a caller
    /// bug and are reported, not ignored.
    pub fn set_metric_key(&mut self, key: &str) -> Result<()> {
        let metric: MetricKey = key.parse()?;
        self.set_metric(metric);
        Ok(())
    }

    pub fn set_color_mode(&mut self, color_mode: ColorMode) {
        self.set_query(Query {
            color_mode,
            ..self.query.clone()
        });
    }

    /// Merge an outside city/region/year selection and return to the root.
    pub fn apply_external(&mut self, external: &ExternalOverride) {
        self.set_filters(external.apply(&self.query.filters));
        self.nav = self.nav.apply(&NavEvent::Reset);
    }

    pub fn navigate(&mut self, event: &NavEvent) {
        self.nav = self.nav.apply(event).revalidated(&self.view.rollup);
    }

    /// Node at the chart center; `None` at the root.
    pub fn focus_node(&self) -> Option<&TreeNode> {
        self.view.rollup.find(self.nav.focus())
    }

    /// Nodes drawn around the chart center.
    pub fn chart_children(&self) -> &[TreeNode] {
        self.view.rollup.children_at(self.nav.focus())
    }

    pub fn list_rows(&self) -> Vec<ListRow> {
        list_rows(&self.view.rollup, &self.nav)
    }

    pub fn catalog(&self) -> Vec<CatalogRow> {
        catalog(&self.view.filtered, self.query.metric)
    }

    pub fn tooltip(&self, path: &NodePath) -> Option<Tooltip> {
        let node = self.view.rollup.find(path)?;
        Some(tooltip::format_with(
            &node.name,
            &node.snapshot,
            self.query.metric,
            self.settings.tooltip.facet_preview,
        ))
    }

    pub fn label(&self, path: &NodePath) -> Option<String> {
        self.view
            .rollup
            .find(path)
            .map(|node| tooltip::node_label(node, self.query.metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table() -> RawTable {
        RawTable::from_strs(
            &["Город", "ЖК", "Литер", "Кол-во лифтов", "Валовая прибыль", "Регион", "Сдан"],
            &[
                &["City A", "JK1", "Liter1", "10", "100", "R1", "1"],
                &["City A", "JK1", "Liter2", "5", "300", "R1", ""],
                &["City B", "JK2", "Liter3", "20", "50", "R2", "1"],
            ],
        )
    }

    fn dashboard() -> Dashboard {
        Dashboard::from_table(&table(), Settings::default())
    }

    #[test]
    fn test_initial_view() {
        let d = dashboard();
        assert_eq!(d.rollup().total, 35.0);
        assert_eq!(d.view().filtered.len(), 3);
        assert_eq!(d.options().cities, vec!["City A", "City B"]);
        assert!(d.navigator().focus().is_root());
        assert_eq!(d.chart_children().len(), 2);
    }

    #[test]
    fn test_filter_keeps_options() {
        let mut d = dashboard();
        d.toggle_filter(Dimension::City, "City A");
        assert_eq!(d.rollup().total, 15.0);
        assert!(d.rollup().find(&NodePath::city("City B")).is_none());
        assert_eq!(d.options().cities, vec!["City A", "City B"]);
    }

    #[test]
    fn test_unknown_metric_key_fails() {
        let mut d = dashboard();
        assert!(d.set_metric_key("value").is_err());
        assert_eq!(d.query().metric, MetricKey::Elevators);
        d.set_metric_key("profit").unwrap();
        assert_eq!(d.rollup().total, 450.0);
    }

    #[test]
    fn test_external_override_resets_navigation() {
        let mut d = dashboard();
        d.navigate(&NavEvent::Click(NodePath::jk("City A", "JK1")));
        assert_eq!(d.navigator().expanded_jk(), Some("JK1"));
        d.apply_external(&ExternalOverride {
            region: Some("R2".into()),
            ..Default::default()
        });
        assert!(d.navigator().focus().is_root());
        assert_eq!(d.navigator().expanded_city(), None);
        assert_eq!(d.rollup().total, 20.0);
        assert!(d.query().filters.regions.contains("R2"));
    }

    #[test]
    fn test_filtering_away_focus_moves_up() {
        let mut d = dashboard();
        d.navigate(&NavEvent::Click(NodePath::city("City B")));
        d.toggle_filter(Dimension::City, "City A");
        assert!(d.navigator().focus().is_root());
    }

    #[test]
    fn test_tooltip_and_label() {
        let mut d = dashboard();
        let path = NodePath::city("City A");
        assert_eq!(d.label(&path).unwrap(), "City A\n15 (42.9%)");
        d.set_metric(MetricKey::Profit);
        let tip = d.tooltip(&path).unwrap();
        assert_eq!(tip.primary().unwrap().text(), "Валовая прибыль: 400.00");
        assert!(d.tooltip(&NodePath::city("Nowhere")).is_none());
    }

    #[test]
    fn test_status_color_mode() {
        let mut d = dashboard();
        d.set_color_mode(ColorMode::ByStatus);
        let city_a = d.rollup().find(&NodePath::city("City A")).unwrap();
        assert_eq!(city_a.color_key, "Частично сдан");
    }

    #[test]
    fn test_contract_members_have_tooltips() {
        let records = vec![
            Record::new("A", "J", "Все").with_contract(5.999).with_metric(MetricKey::Profit, 5.0),
            Record::new("A", "J", "Литер 5").with_contract(5.0).with_metric(MetricKey::Profit, 3.0),
            Record::new("A", "J", "Литер 5.5").with_contract(5.5).with_metric(MetricKey::Profit, 2.0),
        ];
        let mut d = Dashboard::new(records, Settings::default());
        d.set_metric(MetricKey::Profit);
        d.navigate(&NavEvent::Click(NodePath::jk("A", "J")));

        for row in d.list_rows() {
            assert!(d.tooltip(&row.path).is_some(), "no tooltip for {}", row.path);
            assert!(d.label(&row.path).is_some());
        }
        let member = NodePath::liter("A", "J", "Все").child("Литер 5");
        let tip = d.tooltip(&member).unwrap();
        assert_eq!(tip.title, "Литер 5");
        assert_eq!(tip.primary().unwrap().text(), "Валовая прибыль: 3.00");
        assert_eq!(d.label(&member).unwrap(), "Литер 5\n3.00 (60%)");

        d.navigate(&NavEvent::Click(NodePath::liter("A", "J", "Все")));
        assert_eq!(d.focus_node().unwrap().name, "Все");
        assert_eq!(d.chart_children().len(), 2);
    }

    #[test]
    fn test_load_from_source() {
        let d = Dashboard::load(&table(), Settings::default()).unwrap();
        assert_eq!(d.report().kept_rows, 3);
        assert_eq!(d.catalog().len(), 3);
    }
}
