use crate::error::{DataIssue, LoadError, LoadResult};
use crate::types::{
    Alert, Contract, ProgressReport, RawContractRow, RawReportRow, Snapshot, UNDEFINED_BANK,
};
use crate::util::{parse_date_safe, parse_datetime_safe, parse_f64_safe, parse_flag, text_or};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub contract_rows: usize,
    pub report_rows: usize,
    /// Rows dropped because they could not be read or had no reference id.
    pub skipped_rows: usize,
    pub duplicate_contracts: usize,
    pub issues: Vec<DataIssue>,
}

impl LoadReport {
    fn record(&mut self, issue: DataIssue) {
        warn!(%issue, "data issue");
        self.issues.push(issue);
    }

    pub fn count_missing_weights(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, DataIssue::MissingWeight { .. }))
            .count()
    }

    pub fn count_malformed_dates(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| matches!(i, DataIssue::MalformedDate { .. }))
            .count()
    }
}

/// Load contracts and progress reports from `.json` or `.csv` exports.
pub fn load_snapshot(
    contracts_path: impl AsRef<Path>,
    reports_path: impl AsRef<Path>,
) -> LoadResult<(Snapshot, LoadReport)> {
    let mut report = LoadReport::default();

    let (raw_contracts, bad_contract_rows) = read_rows::<RawContractRow>(contracts_path.as_ref())?;
    let (raw_reports, bad_report_rows) = read_rows::<RawReportRow>(reports_path.as_ref())?;
    report.contract_rows = raw_contracts.len() + bad_contract_rows;
    report.report_rows = raw_reports.len() + bad_report_rows;
    report.skipped_rows = bad_contract_rows + bad_report_rows;

    let mut seen: HashSet<String> = HashSet::new();
    let mut contracts: Vec<Contract> = Vec::with_capacity(raw_contracts.len());
    for row in raw_contracts {
        let Some(contract) = clean_contract(row, &mut report) else {
            report.skipped_rows += 1;
            continue;
        };
        if !seen.insert(contract.reference_id.clone()) {
            warn!(reference_id = %contract.reference_id, "duplicate contract, keeping first");
            report.duplicate_contracts += 1;
            continue;
        }
        contracts.push(contract);
    }

    let mut reports: Vec<ProgressReport> = Vec::with_capacity(raw_reports.len());
    for row in raw_reports {
        match clean_report(row, &mut report) {
            Some(r) => reports.push(r),
            None => report.skipped_rows += 1,
        }
    }

    info!(
        contracts = contracts.len(),
        reports = reports.len(),
        skipped = report.skipped_rows,
        issues = report.issues.len(),
        "snapshot loaded"
    );
    Ok((Snapshot::new(contracts, reports), report))
}

/// Deserialize every row of a file, counting the rows that fail instead of
/// aborting on them.
pub fn read_rows<T: DeserializeOwned>(path: &Path) -> LoadResult<(Vec<T>, usize)> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);
    match ext.as_deref() {
        Some("json") => read_json_rows(path),
        Some("csv") => read_csv_rows(path),
        _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
    }
}

fn read_csv_rows<T: DeserializeOwned>(path: &Path) -> LoadResult<(Vec<T>, usize)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_path(path)?;
    let mut rows = Vec::new();
    let mut bad = 0usize;
    for result in rdr.deserialize::<T>() {
        match result {
            Ok(r) => rows.push(r),
            Err(_) => bad += 1,
        }
    }
    Ok((rows, bad))
}

fn read_json_rows<T: DeserializeOwned>(path: &Path) -> LoadResult<(Vec<T>, usize)> {
    let text = std::fs::read_to_string(path).map_err(|e| LoadError::io(path, e))?;
    let items = match serde_json::from_str::<Value>(&text)? {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            _ => return Err(LoadError::UnexpectedShape(path.to_path_buf())),
        },
        _ => return Err(LoadError::UnexpectedShape(path.to_path_buf())),
    };
    let mut rows = Vec::with_capacity(items.len());
    let mut bad = 0usize;
    for item in items {
        match serde_json::from_value::<T>(stringify_fields(item)) {
            Ok(r) => rows.push(r),
            Err(_) => bad += 1,
        }
    }
    Ok((rows, bad))
}

// API payloads mix numbers and numeric strings; raw rows only take text.
fn stringify_fields(item: Value) -> Value {
    match item {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::Null | Value::String(_) => v,
                        Value::Number(n) => Value::String(n.to_string()),
                        Value::Bool(b) => Value::String(b.to_string()),
                        nested => Value::String(nested.to_string()),
                    };
                    (k, v)
                })
                .collect(),
        ),
        other => other,
    }
}

fn required_id(s: Option<String>) -> Option<String> {
    let s = s?.trim().to_string();
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

fn clean_date(
    raw: Option<&str>,
    record: &'static str,
    reference_id: &str,
    field: &'static str,
    report: &mut LoadReport,
) -> Option<NaiveDate> {
    let parsed = parse_date_safe(raw);
    if parsed.is_none() {
        if let Some(raw) = raw.filter(|r| !r.trim().is_empty()) {
            report.record(DataIssue::MalformedDate {
                record,
                reference_id: reference_id.to_string(),
                field,
                raw: raw.to_string(),
            });
        }
    }
    parsed
}

fn clean_contract(row: RawContractRow, report: &mut LoadReport) -> Option<Contract> {
    let reference_id = required_id(row.reference_id)?;

    let contract_value = match parse_f64_safe(row.contract_value.as_deref()) {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        parsed => {
            report.record(DataIssue::MissingWeight {
                reference_id: reference_id.clone(),
                raw: row.contract_value.clone().unwrap_or_default(),
            });
            parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
        }
    };

    let start_date = clean_date(
        row.start_date.as_deref(),
        "contract",
        &reference_id,
        "start_date",
        report,
    );
    let end_date = clean_date(
        row.end_date.as_deref(),
        "contract",
        &reference_id,
        "end_date",
        report,
    );

    Some(Contract {
        managing_center: text_or(row.managing_center, "Sin centro gestor"),
        bank: text_or(row.bank, UNDEFINED_BANK),
        contract_value,
        start_date,
        end_date,
        sector: text_or(row.sector, "Sin sector"),
        status: text_or(row.status, "Sin estado"),
        reference_id,
    })
}

fn clean_report(row: RawReportRow, report: &mut LoadReport) -> Option<ProgressReport> {
    let contract_reference_id = required_id(row.contract_reference_id)?;

    let report_date = parse_datetime_safe(row.report_date.as_deref());
    if report_date.is_none() {
        report.record(DataIssue::MalformedDate {
            record: "report",
            reference_id: contract_reference_id.clone(),
            field: "report_date",
            raw: row.report_date.clone().unwrap_or_default(),
        });
    }

    let description = row
        .alert_description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    let alert = Alert {
        flagged: parse_flag(row.alert_flag.as_deref()),
        description,
    };

    Some(ProgressReport {
        contract_reference_id,
        report_date,
        physical_progress_pct: parse_f64_safe(row.physical_progress_pct.as_deref()).unwrap_or(0.0),
        financial_progress_pct: parse_f64_safe(row.financial_progress_pct.as_deref())
            .unwrap_or(0.0),
        observations: row.observations.unwrap_or_default().trim().to_string(),
        alert,
    })
}
