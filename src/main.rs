// Entry point and high-level CLI flow.
//
// A small menu loop over the rollup core:
// - Option [1] loads and normalizes the contracts CSV, printing diagnostics.
// - Options [2]-[5] show the rollup and change metric, filters and focus.
// - Option [6] exports the current rollup as CSV and the full view as JSON.
use elevator_rollup::dashboard::CsvSource;
use elevator_rollup::navigator::NavEvent;
use elevator_rollup::output;
use elevator_rollup::util;
use elevator_rollup::{Dashboard, Dimension, MetricKey, NodePath, Settings};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DATA_PATH: &str = "contracts.csv";

// Loaded once, queried many times within a single run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState { dashboard: None }));

struct AppState {
    dashboard: Option<Dashboard>,
}

fn prompt(label: &str) -> String {
    print!("{}: ", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn read_choice() -> String {
    prompt("Enter choice")
}

fn data_path() -> PathBuf {
    std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_PATH))
}

/// Handle option [1]: load and normalize the CSV file.
fn handle_load() {
    let settings = match Settings::load_default() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read settings: {}\n", e);
            return;
        }
    };
    let source = CsvSource {
        path: data_path(),
        header_rows: settings.header_rows,
    };
    match Dashboard::load(&source, settings) {
        Ok(dashboard) => {
            let report = dashboard.report();
            println!(
                "Processing dataset... ({} rows read, {} kept)",
                util::format_int(report.total_rows),
                util::format_int(report.kept_rows)
            );
            if report.dropped_total_rows > 0 {
                println!("Note: {} total rows dropped.", util::format_int(report.dropped_total_rows));
            }
            if report.malformed_cells > 0 {
                println!("Note: {} malformed numeric cells read as 0.", util::format_int(report.malformed_cells));
            }
            if !report.missing_columns.is_empty() {
                println!("Missing columns: {} (no data).", report.missing_columns.join(", "));
            }
            println!();
            APP_STATE.lock().unwrap().dashboard = Some(dashboard);
        }
        Err(e) => eprintln!("Failed to load file: {}\n", e),
    }
}

/// Run `f` against the loaded dashboard, or complain that nothing is loaded.
fn with_dashboard(f: impl FnOnce(&mut Dashboard)) {
    let mut state = APP_STATE.lock().unwrap();
    match state.dashboard.as_mut() {
        Some(d) => f(d),
        None => println!("Error: No data loaded. Please load the CSV file first (option 1).\n"),
    }
}

fn show_rollup(d: &mut Dashboard) {
    let rollup = d.rollup();
    let nav = d.navigator();
    println!(
        "Metric: {} | Total: {} | Records: {}",
        rollup.metric.label(),
        util::format_number(rollup.total, rollup.metric.decimals()),
        util::format_int(rollup.record_count)
    );
    let crumbs = nav.breadcrumb();
    println!(
        "Focus: {}\n",
        if crumbs.is_empty() { "(all)".to_string() } else { crumbs.join(" / ") }
    );
    if let Some(node) = d.focus_node() {
        for line in elevator_rollup::tooltip::describe(node, rollup.metric).lines() {
            println!("{}", line);
        }
        println!();
    }
    for row in d.list_rows() {
        let marker = if row.focused { "*" } else if row.expanded { "-" } else if row.expandable { "+" } else { " " };
        println!(
            "{}{} {} {} ({}%)",
            "  ".repeat(row.indent),
            marker,
            row.name,
            util::format_number(row.value, rollup.metric.decimals()),
            util::format_percent(row.percent_of_parent)
        );
    }
    println!();
}

fn change_metric(d: &mut Dashboard) {
    for (i, key) in MetricKey::ALL.iter().enumerate() {
        println!("[{}] {} ({})", i + 1, key.label(), key);
    }
    let choice = prompt("Metric number or key");
    let key = choice
        .parse::<usize>()
        .ok()
        .and_then(|n| MetricKey::ALL.get(n.wrapping_sub(1)).copied())
        .map(|k| k.as_str().to_string())
        .unwrap_or(choice);
    if let Err(e) = d.set_metric_key(&key) {
        println!("{}\n", e);
    }
}

fn toggle_filter(d: &mut Dashboard) {
    for (i, dim) in Dimension::ALL.iter().enumerate() {
        let selected = d.query().filters.selection(*dim);
        println!(
            "[{}] {} ({} options, {} selected)",
            i + 1,
            dim.label(),
            d.options().values(*dim).len(),
            selected.len()
        );
    }
    let Some(dim) = prompt("Dimension")
        .parse::<usize>()
        .ok()
        .and_then(|n| Dimension::ALL.get(n.wrapping_sub(1)).copied())
    else {
        println!("Invalid dimension.\n");
        return;
    };
    println!("Options: {}", d.options().values(dim).join(" | "));
    let value = prompt("Value to toggle (* = all, empty = clear)");
    match value.as_str() {
        "" => d.clear_filter(dim),
        "*" => d.select_all(dim),
        v => d.toggle_filter(dim, v),
    }
}

fn drill(d: &mut Dashboard) {
    let input = prompt("City[/JK[/Liter]] to open, '..' to go up, '/' for all");
    let event = match input.as_str() {
        ".." => NavEvent::Ascend,
        "/" => NavEvent::Reset,
        other => {
            let parts: Vec<&str> = other.split('/').map(str::trim).collect();
            match parts.as_slice() {
                [city] => NavEvent::Click(NodePath::city(city)),
                [city, jk] => NavEvent::Click(NodePath::jk(city, jk)),
                [city, jk, liters @ ..] => NavEvent::Click(
                    liters
                        .iter()
                        .fold(NodePath::jk(city, jk), |path, liter| path.child(liter)),
                ),
                [] => return,
            }
        }
    };
    d.navigate(&event);
}

fn export(d: &mut Dashboard) {
    let rows = output::rollup_rows(d.rollup(), 4);
    let file1 = "rollup.csv";
    if let Err(e) = output::write_csv(file1, &rows) {
        eprintln!("Write error: {}", e);
    }
    println!("{}\n", output::preview_table(&rows, 5));
    println!("(Full rollup exported to {})", file1);

    let file2 = "rollup_view.json";
    if let Err(e) = output::write_json(file2, d.view()) {
        eprintln!("Write error: {}", e);
    }
    println!("(View with filtered records exported to {})\n", file2);
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    loop {
        println!("Elevator contracts rollup:");
        println!("[1] Load the file");
        println!("[2] Show rollup");
        println!("[3] Change metric");
        println!("[4] Toggle filter");
        println!("[5] Drill down / up");
        println!("[6] Export");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => handle_load(),
            "2" => with_dashboard(show_rollup),
            "3" => with_dashboard(change_metric),
            "4" => with_dashboard(toggle_filter),
            "5" => with_dashboard(|d| {
                drill(d);
                show_rollup(d);
            }),
            "6" => with_dashboard(export),
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-6.\n"),
        }
    }
}
