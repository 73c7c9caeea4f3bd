use crate::aggregate::{aggregate_with, weighted_rollup, WeightedAggregate, STANDARD_METRICS};
use crate::filter::FilterConfig;
use crate::resolver::{ReportIndex, ReportWindow};
use crate::types::{AggregateRow, AlertRow, Contract, Snapshot, VariationRow, WeekRow};
use crate::util::format_number;
use crate::weekly::{
    build_weekly_series_with, weekly_variation, SeriesMetric, WeekAxis, WeekBucket,
    WeeklyVariation,
};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::info;

/// A contract whose current report raises an alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertEntry {
    pub reference_id: String,
    pub managing_center: String,
    pub report_date: NaiveDateTime,
    pub description: String,
}

/// Headline figures over the filtered portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    pub total_contracts: usize,
    pub contracts_with_reports: usize,
    pub awarded_value: f64,
    pub executed_value: f64,
    pub weighted_physical_pct: f64,
    pub weighted_financial_pct: f64,
    pub report_count: usize,
    pub undated_report_count: usize,
    /// Date of the most recent current report; the reference for overdue checks.
    pub as_of: Option<NaiveDate>,
    pub overdue_contracts: usize,
    pub alerts: Vec<AlertEntry>,
}

/// Every view of one snapshot under one filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rollup {
    pub by_bank: Vec<WeightedAggregate>,
    pub by_managing_center: Vec<WeightedAggregate>,
    pub by_sector: Vec<WeightedAggregate>,
    pub weekly_series: Vec<WeekBucket>,
    pub physical_variation: Vec<WeeklyVariation>,
    pub financial_variation: Vec<WeeklyVariation>,
    pub summary: PortfolioSummary,
}

impl Rollup {
    pub fn compute(snapshot: &Snapshot, filter: &FilterConfig) -> Self {
        Self::compute_with(snapshot, filter, WeekAxis::default())
    }

    /// Recompute all views from scratch. Nothing is cached between calls.
    pub fn compute_with(snapshot: &Snapshot, filter: &FilterConfig, axis: WeekAxis) -> Self {
        let contracts = filter.apply(&snapshot.contracts);
        let index = ReportIndex::new(&snapshot.reports);
        let window = filter.report_window();

        let by_bank = weighted_rollup(&contracts, &index, &window, |c| c.bank.clone());
        let by_managing_center =
            weighted_rollup(&contracts, &index, &window, |c| c.managing_center.clone());
        let by_sector = weighted_rollup(&contracts, &index, &window, |c| c.sector.clone());
        let weekly_series = build_weekly_series_with(&contracts, &index, &window, axis);
        let physical_variation = weekly_variation(&weekly_series, SeriesMetric::Physical);
        let financial_variation = weekly_variation(&weekly_series, SeriesMetric::Financial);
        let summary = summarize(&contracts, &index, &window);

        info!(
            contracts = contracts.len(),
            banks = by_bank.len(),
            centers = by_managing_center.len(),
            weeks = weekly_series.len(),
            "rollup computed"
        );

        Self {
            by_bank,
            by_managing_center,
            by_sector,
            weekly_series,
            physical_variation,
            financial_variation,
            summary,
        }
    }
}

pub fn summarize(
    contracts: &[Contract],
    index: &ReportIndex<'_>,
    window: &ReportWindow,
) -> PortfolioSummary {
    let totals = aggregate_with(
        contracts,
        |c| index.latest(&c.reference_id, window),
        |_| String::new(),
        &STANDARD_METRICS,
    )
    .into_values()
    .next()
    .map(WeightedAggregate::from_totals);

    let mut report_count = 0usize;
    let mut undated_report_count = 0usize;
    let mut current = Vec::new();
    for contract in contracts {
        let history = index.history(&contract.reference_id);
        report_count += history.len();
        undated_report_count += history.iter().filter(|r| r.report_date.is_none()).count();
        current.push((contract, index.latest(&contract.reference_id, window)));
    }

    let as_of = current
        .iter()
        .filter_map(|(_, r)| r.and_then(|r| r.report_date))
        .max()
        .map(|d| d.date());

    let overdue_contracts = match as_of {
        Some(as_of) => current
            .iter()
            .filter(|(c, r)| {
                let physical = r.map(|r| r.physical_progress_pct).unwrap_or(0.0);
                c.is_overdue(as_of, physical)
            })
            .count(),
        None => 0,
    };

    let alerts = current
        .iter()
        .filter_map(|(c, r)| {
            let r = (*r)?;
            if !r.alert.flagged {
                return None;
            }
            Some(AlertEntry {
                reference_id: c.reference_id.clone(),
                managing_center: c.managing_center.clone(),
                report_date: r.report_date?,
                description: r
                    .alert
                    .description
                    .clone()
                    .unwrap_or_else(|| r.observations.clone()),
            })
        })
        .collect();

    PortfolioSummary {
        total_contracts: contracts.len(),
        contracts_with_reports: totals.as_ref().map(|t| t.reported_count).unwrap_or(0),
        awarded_value: totals.as_ref().map(|t| t.awarded_value).unwrap_or(0.0),
        executed_value: totals.as_ref().map(|t| t.executed_value).unwrap_or(0.0),
        weighted_physical_pct: totals.as_ref().map(|t| t.weighted_physical_pct).unwrap_or(0.0),
        weighted_financial_pct: totals
            .as_ref()
            .map(|t| t.weighted_financial_pct)
            .unwrap_or(0.0),
        report_count,
        undated_report_count,
        as_of,
        overdue_contracts,
        alerts,
    }
}

pub fn generate_aggregate_rows(rows: &[WeightedAggregate]) -> Vec<AggregateRow> {
    rows.iter()
        .map(|r| AggregateRow {
            group: r.key.clone(),
            contracts: r.contract_count,
            awarded_value: format_number(r.awarded_value, 2),
            executed_value: format_number(r.executed_value, 2),
            physical_pct: format_number(r.weighted_physical_pct, 2),
            financial_pct: format_number(r.weighted_financial_pct, 2),
        })
        .collect()
}

pub fn generate_week_rows(series: &[WeekBucket]) -> Vec<WeekRow> {
    series
        .iter()
        .map(|b| WeekRow {
            week: if b.is_current {
                format!("{} (current)", b.key)
            } else {
                b.key.to_string()
            },
            week_start: b
                .week_start
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            contracts: b.contract_count,
            awarded_value: format_number(b.awarded_value, 2),
            physical_pct: format_number(b.weighted_physical_pct, 2),
            financial_pct: format_number(b.weighted_financial_pct, 2),
        })
        .collect()
}

pub fn generate_variation_rows(variation: &[WeeklyVariation]) -> Vec<VariationRow> {
    variation
        .iter()
        .map(|v| VariationRow {
            week: v.key.to_string(),
            metric: v.metric.label().to_string(),
            previous: format_number(v.previous_value, 2),
            current: format_number(v.current_value, 2),
            delta: format_number(v.delta, 2),
            growth_pct: format_number(v.growth_rate * 100.0, 2),
        })
        .collect()
}

pub fn generate_alert_rows(summary: &PortfolioSummary) -> Vec<AlertRow> {
    summary
        .alerts
        .iter()
        .map(|a| AlertRow {
            reference_id: a.reference_id.clone(),
            managing_center: a.managing_center.clone(),
            report_date: a.report_date.format("%Y-%m-%d").to_string(),
            description: a.description.clone(),
        })
        .collect()
}
