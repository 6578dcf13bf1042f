// Rollup core for the elevator-installation contracts dashboard.
//
// Raw sheet rows go through the `loader`, the `filters` registry and
// the `aggregate` engine (with `grouping` of contract liters) into a
// City → JK → Liter tree. `navigator` keeps the radial chart and the
// side list on the same drill-down focus, `tooltip` and `timer` cover
// presentation text and tooltip timing. `dashboard` ties them together
// behind a single query/snapshot API.
pub mod aggregate;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod filters;
pub mod grouping;
pub mod loader;
pub mod navigator;
pub mod output;
pub mod path;
pub mod timer;
pub mod tooltip;
pub mod types;
pub mod util;

pub use aggregate::{build_tree, build_tree_with, Rollup, TreeNode};
pub use config::Settings;
pub use dashboard::{Dashboard, ExternalOverride, Query};
pub use error::{Result, RollupError};
pub use filters::{apply_filters, derive_options, Dimension, FilterOptions, FilterState};
pub use grouping::group_liters;
pub use navigator::{NavEvent, Navigator};
pub use path::{Level, NodePath};
pub use types::{ColorMode, MetricKey, Record};
