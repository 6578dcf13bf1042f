// Chart labels and structured tooltips for rollup nodes.
//
// Everything here is a pure function of (node, active metric); the
// rendering layer decides how a "primary" block or a facet looks.
use crate::aggregate::{MetricSnapshot, TreeNode};
use crate::types::{Ledger, MetricKey};
use crate::util::{format_number, format_percent};
use serde::Serialize;
use std::cmp::Ordering;

pub const DEFAULT_FACET_PREVIEW: usize = 2;

/// Which side of an income/expense pair is larger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    IncomeHigher,
    ExpenseHigher,
    Even,
}

impl Direction {
    fn of(income: f64, expense: f64) -> Self {
        match income.partial_cmp(&expense) {
            Some(Ordering::Greater) => Direction::IncomeHigher,
            Some(Ordering::Less) => Direction::ExpenseHigher,
            _ => Direction::Even,
        }
    }

    pub fn arrow(self) -> &'static str {
        match self {
            Direction::IncomeHigher => "▲",
            Direction::ExpenseHigher => "▼",
            Direction::Even => "=",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricBlock {
    Single {
        key: MetricKey,
        label: String,
        value: String,
    },
    Pair {
        ledger: Ledger,
        label: String,
        income: String,
        expense: String,
        direction: Direction,
    },
}

impl MetricBlock {
    fn contains(&self, key: MetricKey) -> bool {
        match self {
            MetricBlock::Single { key: k, .. } => *k == key,
            MetricBlock::Pair { ledger, .. } => key.ledger() == Some(*ledger),
        }
    }

    pub fn text(&self) -> String {
        match self {
            MetricBlock::Single { label, value, .. } => format!("{}: {}", label, value),
            MetricBlock::Pair {
                label,
                income,
                expense,
                direction,
                ..
            } => format!("{}: {} / {} {}", label, income, expense, direction.arrow()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BlockView {
    pub primary: bool,
    pub block: MetricBlock,
}

/// Distinct text values of one facet, collapsed to a short preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextFacet {
    pub label: String,
    pub values: Vec<String>,
    pub preview: usize,
    pub expanded: bool,
}

impl TextFacet {
    pub fn is_collapsed(&self) -> bool {
        !self.expanded && self.values.len() > self.preview
    }

    pub fn hidden_count(&self) -> usize {
        if self.is_collapsed() {
            self.values.len() - self.preview
        } else {
            0
        }
    }

    pub fn expanded(&self) -> Self {
        Self {
            expanded: true,
            ..self.clone()
        }
    }

    /// "a, b +3" while collapsed, every value once expanded.
    pub fn display(&self) -> String {
        if !self.is_collapsed() {
            return self.values.join(", ");
        }
        format!(
            "{} +{}",
            self.values[..self.preview].join(", "),
            self.hidden_count()
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tooltip {
    pub title: String,
    pub blocks: Vec<BlockView>,
    pub facets: Vec<TextFacet>,
}

impl Tooltip {
    pub fn primary(&self) -> Option<&MetricBlock> {
        self.blocks.iter().find(|b| b.primary).map(|b| &b.block)
    }

    /// Expand the facet named `label`, keeping every other facet as is.
    pub fn with_facet_expanded(&self, label: &str) -> Self {
        let mut next = self.clone();
        for facet in &mut next.facets {
            if facet.label == label {
                *facet = facet.expanded();
            }
        }
        next
    }

    /// Plain-text rendering; the primary block is prefixed with `»`.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.title.clone()];
        for view in &self.blocks {
            let marker = if view.primary { "» " } else { "  " };
            lines.push(format!("{}{}", marker, view.block.text()));
        }
        for facet in &self.facets {
            lines.push(format!("  {}: {}", facet.label, facet.display()));
        }
        lines
    }
}

fn single(snapshot: &MetricSnapshot, key: MetricKey) -> MetricBlock {
    MetricBlock::Single {
        key,
        label: key.label().to_string(),
        value: format_number(snapshot.get(key), key.decimals()),
    }
}

fn pair(snapshot: &MetricSnapshot, ledger: Ledger) -> MetricBlock {
    let income = snapshot.get(ledger.income());
    let expense = snapshot.get(ledger.expense());
    MetricBlock::Pair {
        ledger,
        label: ledger.label().to_string(),
        income: format_number(income, ledger.income().decimals()),
        expense: format_number(expense, ledger.expense().decimals()),
        direction: Direction::of(income, expense),
    }
}

fn metric_blocks(snapshot: &MetricSnapshot) -> Vec<MetricBlock> {
    let mut blocks: Vec<MetricBlock> = [
        MetricKey::Elevators,
        MetricKey::Floors,
        MetricKey::Profit,
        MetricKey::ProfitPerUnit,
    ]
    .into_iter()
    .map(|k| single(snapshot, k))
    .collect();
    blocks.extend(Ledger::ALL.into_iter().map(|l| pair(snapshot, l)));
    blocks
}

fn facets(snapshot: &MetricSnapshot, preview: usize) -> Vec<TextFacet> {
    let f = &snapshot.facets;
    [
        ("Заказчики", &f.clients),
        ("Города", &f.cities),
        ("ЖК", &f.jks),
        ("Статусы", &f.statuses),
        ("Типы объектов", &f.object_types),
        ("Годы", &f.years),
    ]
    .into_iter()
    .filter(|(_, values)| !values.is_empty())
    .map(|(label, values)| TextFacet {
        label: label.to_string(),
        values: values.clone(),
        preview,
        expanded: false,
    })
    .collect()
}

pub fn format(label: &str, snapshot: &MetricSnapshot, active: MetricKey) -> Tooltip {
    format_with(label, snapshot, active, DEFAULT_FACET_PREVIEW)
}

/// Structured tooltip: the active metric's block first and marked primary,
/// then the remaining blocks in their fixed order, then text facets.
pub fn format_with(label: &str, snapshot: &MetricSnapshot, active: MetricKey, preview: usize) -> Tooltip {
    let (primary, rest): (Vec<MetricBlock>, Vec<MetricBlock>) = metric_blocks(snapshot)
        .into_iter()
        .partition(|b| b.contains(active));
    let blocks = primary
        .into_iter()
        .map(|block| BlockView { primary: true, block })
        .chain(rest.into_iter().map(|block| BlockView { primary: false, block }))
        .collect();
    Tooltip {
        title: label.to_string(),
        blocks,
        facets: facets(snapshot, preview),
    }
}

pub fn describe(node: &TreeNode, active: MetricKey) -> Tooltip {
    format(&node.name, &node.snapshot, active)
}

/// Chart label: name, active value and share of the parent.
pub fn node_label(node: &TreeNode, active: MetricKey) -> String {
    format!(
        "{}\n{} ({}%)",
        node.name,
        format_number(node.value, active.decimals()),
        format_percent(node.percent_of_parent)
    )
}
