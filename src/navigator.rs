// Drill-down navigation shared by the radial chart and the side list.
//
// The chart focus and the list's expanded rows are two views of a single
// `Navigator` value. Every transition returns a new value; chart clicks and
// list toggles go through the same focus rules, so both views always agree.
use crate::aggregate::{Rollup, TreeNode};
use crate::path::{Level, NodePath};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavEvent {
    /// Chart click on the node at this path.
    Click(NodePath),
    /// Chart click on the center, or an explicit "back".
    Ascend,
    /// City/region filter applied from outside the dashboard.
    Reset,
    /// Side-list city row expand/collapse.
    ToggleCity(String),
    /// Side-list JK row expand/collapse.
    ToggleJk { city: String, jk: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigator {
    focus: NodePath,
    expanded_city: Option<String>,
    expanded_jk: Option<String>,
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator focused on `path`, with the expanded rows on its way.
    pub fn at(path: &NodePath) -> Self {
        let focus = path.clone();
        Self {
            expanded_city: focus.name_at(Level::City).map(str::to_string),
            expanded_jk: focus.name_at(Level::Jk).map(str::to_string),
            focus,
        }
    }

    pub fn focus(&self) -> &NodePath {
        &self.focus
    }

    pub fn breadcrumb(&self) -> Vec<String> {
        self.focus.breadcrumb()
    }

    pub fn expanded_city(&self) -> Option<&str> {
        self.expanded_city.as_deref()
    }

    pub fn expanded_jk(&self) -> Option<&str> {
        self.expanded_jk.as_deref()
    }

    pub fn apply(&self, event: &NavEvent) -> Self {
        let next = match event {
            NavEvent::Click(path) => self.click(path),
            NavEvent::Ascend => self.ascend(),
            NavEvent::Reset => Self::new(),
            NavEvent::ToggleCity(city) => self.toggle_city(city),
            NavEvent::ToggleJk { city, jk } => self.toggle_jk(city, jk),
        };
        if next != *self {
            tracing::debug!("navigation {:?}: {} -> {}", event, self.focus, next.focus);
        }
        next
    }

    /// Clicking the current center ascends; clicking anything else focuses
    /// it directly, however deep. Leaf liters are settled back onto their
    /// parent by `revalidated`.
    pub fn click(&self, target: &NodePath) -> Self {
        if target == &self.focus {
            return self.ascend();
        }
        Self::at(target)
    }

    pub fn ascend(&self) -> Self {
        Self::at(&self.focus.parent())
    }

    /// Expanding a city focuses it; collapsing the expanded city returns to
    /// the root.
    pub fn toggle_city(&self, city: &str) -> Self {
        if self.expanded_city.as_deref() == Some(city) {
            Self::at(&NodePath::root())
        } else {
            self.click(&NodePath::city(city))
        }
    }

    /// Expanding a JK focuses it; collapsing the expanded JK returns to its
    /// city.
    pub fn toggle_jk(&self, city: &str, jk: &str) -> Self {
        if self.expanded_city.as_deref() == Some(city) && self.expanded_jk.as_deref() == Some(jk) {
            Self::at(&NodePath::city(city))
        } else {
            self.click(&NodePath::jk(city, jk))
        }
    }

    /// Move the focus up to the nearest node of `rollup` that can be a chart
    /// center: one that still exists and has children. Vanished nodes
    /// (filtered away) and leaf liters are skipped.
    pub fn revalidated(&self, rollup: &Rollup) -> Self {
        let mut focus = self.focus.clone();
        while !focus.is_root() && !rollup.find(&focus).is_some_and(is_focusable) {
            focus = focus.parent();
        }
        if focus == self.focus {
            return self.clone();
        }
        Self::at(&focus)
    }
}

fn is_focusable(node: &TreeNode) -> bool {
    node.level != Level::Liter || !node.children.is_empty()
}

/// One row of the collapsible side list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListRow {
    pub path: NodePath,
    pub name: String,
    pub indent: usize,
    pub value: f64,
    pub percent_of_parent: f64,
    pub expandable: bool,
    pub expanded: bool,
    pub focused: bool,
}

/// Flatten `rollup` into list rows, opening exactly the rows on the
/// navigator's focus path.
pub fn list_rows(rollup: &Rollup, nav: &Navigator) -> Vec<ListRow> {
    let mut rows = Vec::new();
    for city in &rollup.cities {
        push_rows(&mut rows, city, nav, 0);
    }
    rows
}

fn push_rows(rows: &mut Vec<ListRow>, node: &TreeNode, nav: &Navigator, indent: usize) {
    let expandable = node.level != Level::Liter || !node.children.is_empty();
    let expanded = match node.level {
        Level::City => nav.expanded_city() == Some(node.name.as_str()),
        Level::Jk => {
            nav.expanded_city() == node.path.name_at(Level::City)
                && nav.expanded_jk() == Some(node.name.as_str())
        }
        // contract groups are always shown open under an open JK
        Level::Liter => expandable,
    };
    rows.push(ListRow {
        path: node.path.clone(),
        name: node.name.clone(),
        indent,
        value: node.value,
        percent_of_parent: node.percent_of_parent,
        expandable,
        expanded,
        focused: &node.path == nav.focus(),
    });
    if expanded {
        for child in &node.children {
            push_rows(rows, child, nav, indent + 1);
        }
    }
}
