// Entry point and interactive CLI flow.
//
// - Option [1] loads the contract and progress-report exports.
// - Option [2] narrows the portfolio by bank, center, sector, status,
//   free text or report dates.
// - Option [3] computes every rollup, previews it and writes CSV/JSON files.
use emprestito_report::config::AppConfig;
use emprestito_report::filter::{available_values, FilterConfig, FilterDimension};
use emprestito_report::reports::{
    generate_aggregate_rows, generate_alert_rows, generate_variation_rows, generate_week_rows,
};
use emprestito_report::types::Snapshot;
use emprestito_report::util::{format_int, format_number, parse_date_safe};
use emprestito_report::{loader, logging, output, Rollup};
use once_cell::sync::Lazy;
use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};
use tracing::error;

// Loaded once, reused across report generations in the same run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| {
    Mutex::new(AppState {
        snapshot: None,
        filter: FilterConfig::new(),
    })
});

struct AppState {
    snapshot: Option<Snapshot>,
    filter: FilterConfig,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn prompt(label: &str) -> String {
    print!("{}", label);
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

fn handle_load(config: &AppConfig) {
    match loader::load_snapshot(&config.contracts_path, &config.reports_path) {
        Ok((snapshot, load_report)) => {
            println!(
                "Loaded {} contracts and {} progress reports.",
                format_int(snapshot.contracts.len() as i64),
                format_int(snapshot.reports.len() as i64)
            );
            println!(
                "Note: {} rows skipped, {} duplicate contracts, {} contracts without a usable value, {} malformed dates.",
                format_int(load_report.skipped_rows as i64),
                format_int(load_report.duplicate_contracts as i64),
                format_int(load_report.count_missing_weights() as i64),
                format_int(load_report.count_malformed_dates() as i64)
            );
            println!();
            state().snapshot = Some(snapshot);
        }
        Err(e) => {
            error!(error = %e, "failed to load snapshot");
            eprintln!("Failed to load files: {}\n", e);
        }
    }
}

fn handle_set_filter() {
    let snapshot = state().snapshot.clone();
    let Some(snapshot) = snapshot else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };

    println!("Filter on: bank, managing_center, sector, status, search, from, to");
    let what = prompt("Filter: ");
    let mut app = state();
    match what.to_lowercase().as_str() {
        "search" => {
            let text = prompt("Search text: ");
            app.filter = app.filter.clone().with_search(text);
        }
        "from" | "to" => {
            let raw = prompt("Date (YYYY-MM-DD, empty to clear): ");
            let date = parse_date_safe(Some(raw.as_str()));
            if date.is_none() && !raw.is_empty() {
                println!("Invalid date.\n");
                return;
            }
            if what.eq_ignore_ascii_case("from") {
                app.filter.report_from = date;
            } else {
                app.filter.report_to = date;
            }
        }
        other => {
            let Some(dimension) = FilterDimension::parse(other) else {
                println!("Unknown filter \"{}\".\n", other);
                return;
            };
            for value in available_values(&snapshot.contracts, dimension) {
                println!("  - {}", value);
            }
            let value = prompt("Value: ");
            if value.is_empty() {
                app.filter.selections.remove(&dimension);
            } else {
                app.filter = app.filter.clone().select(dimension, value);
            }
        }
    }
    println!("Active filter: {:?}\n", app.filter);
}

fn handle_generate_reports(config: &AppConfig) {
    let (snapshot, filter) = {
        let app = state();
        (app.snapshot.clone(), app.filter.clone())
    };
    let Some(snapshot) = snapshot else {
        println!("Error: No data loaded. Please load the files first (option 1).\n");
        return;
    };

    println!("Generating rollups...\n");
    let rollup = Rollup::compute_with(&snapshot, &filter, config.week_axis);
    let rows = config.preview_rows;

    let by_bank = generate_aggregate_rows(&rollup.by_bank);
    let by_center = generate_aggregate_rows(&rollup.by_managing_center);
    let by_sector = generate_aggregate_rows(&rollup.by_sector);
    let weeks = generate_week_rows(&rollup.weekly_series);
    let mut variation = generate_variation_rows(&rollup.physical_variation);
    variation.extend(generate_variation_rows(&rollup.financial_variation));
    let alerts = generate_alert_rows(&rollup.summary);

    output::preview_table("Progress by Bank", &by_bank, rows);
    output::preview_table("Progress by Managing Center", &by_center, rows);
    output::preview_table("Progress by Sector", &by_sector, rows);
    output::preview_table("Weekly Weighted Progress", &weeks, rows);
    output::preview_table("Weekly Variation (most recent first)", &variation, rows);
    output::preview_table("Contracts with Alerts", &alerts, rows);

    let dir = &config.output_dir;
    let exports = [
        ("rollup_by_bank.csv", output::write_csv(&dir.join("rollup_by_bank.csv"), &by_bank)),
        ("rollup_by_managing_center.csv", output::write_csv(&dir.join("rollup_by_managing_center.csv"), &by_center)),
        ("rollup_by_sector.csv", output::write_csv(&dir.join("rollup_by_sector.csv"), &by_sector)),
        ("rollup_weekly.csv", output::write_csv(&dir.join("rollup_weekly.csv"), &weeks)),
        ("rollup_weekly_variation.csv", output::write_csv(&dir.join("rollup_weekly_variation.csv"), &variation)),
        ("alerts.csv", output::write_csv(&dir.join("alerts.csv"), &alerts)),
        ("summary.json", output::write_json(&dir.join("summary.json"), &rollup.summary)),
    ];
    for (name, result) in exports {
        match result {
            Ok(()) => println!("Exported {}", name),
            Err(e) => {
                error!(file = name, error = %e, "export failed");
                eprintln!("Write error: {}", e);
            }
        }
    }

    let s = &rollup.summary;
    println!(
        "\nSummary: {} contracts ({} reporting), awarded {}, executed {}, physical {}%, financial {}%\n",
        format_int(s.total_contracts as i64),
        format_int(s.contracts_with_reports as i64),
        format_number(s.awarded_value, 2),
        format_number(s.executed_value, 2),
        format_number(s.weighted_physical_pct, 2),
        format_number(s.weighted_financial_pct, 2)
    );
}

fn main() {
    let config = AppConfig::from_env();
    logging::init_logging();

    loop {
        println!("Empréstito Progress Rollups");
        println!("[1] Load contracts and reports");
        println!("[2] Set filter");
        println!("[3] Generate rollups");
        println!("[4] Clear filter");
        println!("[5] Exit\n");
        match prompt("Enter choice: ").as_str() {
            "1" => handle_load(&config),
            "2" => handle_set_filter(),
            "3" => handle_generate_reports(&config),
            "4" => {
                state().filter = FilterConfig::new();
                println!("Filter cleared.\n");
            }
            "5" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 1-5.\n"),
        }
    }
}
