//! ISO-week bucketing of progress and week-over-week variation.
//!
//! Every bucket but the last one only looks at reports filed during its own
//! week. The last bucket resolves each contract's latest report overall, so
//! the final point of the series is the portfolio's present state.
use crate::aggregate::{aggregate_with, weight_of, STANDARD_METRICS};
use crate::resolver::{ReportIndex, ReportWindow};
use crate::types::{Contract, ProgressReport};
use chrono::{Datelike, Days, NaiveDate, NaiveDateTime, Weekday};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// ISO-8601 week: Monday start, week 1 holds the year's first Thursday.
/// Ordering is chronological (year, then week).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct WeekKey {
    pub year: i32,
    pub week: u32,
}

impl WeekKey {
    pub fn from_date(date: NaiveDate) -> Self {
        let iso = date.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn from_datetime(dt: NaiveDateTime) -> Self {
        Self::from_date(dt.date())
    }

    pub fn monday(&self) -> Option<NaiveDate> {
        NaiveDate::from_isoywd_opt(self.year, self.week, Weekday::Mon)
    }

    pub fn next(&self) -> Option<WeekKey> {
        self.monday()
            .and_then(|m| m.checked_add_days(Days::new(7)))
            .map(Self::from_date)
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// Which weeks become buckets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WeekAxis {
    /// Only weeks in which at least one report was filed.
    #[default]
    Observed,
    /// Every week from the first to the last observed one, gaps included.
    Contiguous,
}

/// The report a contract contributed to one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketEntry {
    pub reference_id: String,
    pub report_date: NaiveDateTime,
    pub weight: f64,
    pub physical_progress_pct: f64,
    pub financial_progress_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekBucket {
    pub key: WeekKey,
    pub week_start: Option<NaiveDate>,
    /// True for the last bucket, which uses global latest reports.
    pub is_current: bool,
    /// Contracts that contributed a report to this bucket.
    pub contract_count: usize,
    pub awarded_value: f64,
    pub executed_value: f64,
    pub weighted_physical_pct: f64,
    pub weighted_financial_pct: f64,
    pub entries: Vec<BucketEntry>,
}

/// Weekly series over the global report history.
pub fn build_weekly_series(
    contracts: &[Contract],
    reports: &[ProgressReport],
    axis: WeekAxis,
) -> Vec<WeekBucket> {
    let index = ReportIndex::new(reports);
    build_weekly_series_with(contracts, &index, &ReportWindow::global(), axis)
}

/// Weekly series restricted to reports inside `scope` (a date range from the
/// active filter, or global).
pub fn build_weekly_series_with(
    contracts: &[Contract],
    index: &ReportIndex<'_>,
    scope: &ReportWindow,
    axis: WeekAxis,
) -> Vec<WeekBucket> {
    let weeks = discover_weeks(contracts, index, scope, axis);
    let last = weeks.len().saturating_sub(1);
    debug!(buckets = weeks.len(), ?axis, "building weekly series");

    weeks
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let window = if i == last {
                *scope
            } else {
                scope.within_week(*key)
            };
            build_bucket(contracts, index, *key, &window, i == last)
        })
        .collect()
}

fn discover_weeks(
    contracts: &[Contract],
    index: &ReportIndex<'_>,
    scope: &ReportWindow,
    axis: WeekAxis,
) -> Vec<WeekKey> {
    let mut observed: BTreeSet<WeekKey> = BTreeSet::new();
    for contract in contracts {
        for report in index.history(&contract.reference_id) {
            if let Some(date) = report.report_date {
                if scope.contains_date(date) {
                    observed.insert(WeekKey::from_datetime(date));
                }
            }
        }
    }
    match axis {
        WeekAxis::Observed => observed.into_iter().collect(),
        WeekAxis::Contiguous => {
            let (Some(first), Some(last)) = (observed.first().copied(), observed.last().copied())
            else {
                return Vec::new();
            };
            let mut weeks = vec![first];
            let mut cursor = first;
            while cursor < last {
                match cursor.next() {
                    Some(next) => {
                        weeks.push(next);
                        cursor = next;
                    }
                    None => break,
                }
            }
            weeks
        }
    }
}

fn build_bucket(
    contracts: &[Contract],
    index: &ReportIndex<'_>,
    key: WeekKey,
    window: &ReportWindow,
    is_current: bool,
) -> WeekBucket {
    let mut entries: Vec<BucketEntry> = Vec::new();
    let groups = aggregate_with(
        contracts,
        |contract| {
            let report = index.latest(&contract.reference_id, window)?;
            if let Some(report_date) = report.report_date {
                entries.push(BucketEntry {
                    reference_id: contract.reference_id.clone(),
                    report_date,
                    weight: weight_of(contract),
                    physical_progress_pct: report.physical_progress_pct,
                    financial_progress_pct: report.financial_progress_pct,
                });
            }
            Some(report)
        },
        |_| (),
        &STANDARD_METRICS,
    );

    let (contract_count, awarded_value, executed_value, physical, financial) =
        match groups.into_values().next() {
            Some(totals) => (
                totals.reported_count,
                totals.weight_sum,
                totals.metric_sums.get(1).copied().unwrap_or(0.0) / 100.0,
                totals.weighted.first().copied().unwrap_or(0.0),
                totals.weighted.get(1).copied().unwrap_or(0.0),
            ),
            None => (0, 0.0, 0.0, 0.0, 0.0),
        };

    WeekBucket {
        key,
        week_start: key.monday(),
        is_current,
        contract_count,
        awarded_value,
        executed_value,
        weighted_physical_pct: physical,
        weighted_financial_pct: financial,
        entries,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SeriesMetric {
    Physical,
    Financial,
}

impl SeriesMetric {
    pub fn value(&self, bucket: &WeekBucket) -> f64 {
        match self {
            SeriesMetric::Physical => bucket.weighted_physical_pct,
            SeriesMetric::Financial => bucket.weighted_financial_pct,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeriesMetric::Physical => "Physical",
            SeriesMetric::Financial => "Financial",
        }
    }
}

/// Change between a bucket and the one before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyVariation {
    pub key: WeekKey,
    pub previous_key: WeekKey,
    pub metric: SeriesMetric,
    pub previous_value: f64,
    pub current_value: f64,
    pub delta: f64,
    /// `delta / previous_value`; 0 when the previous value is 0.
    pub growth_rate: f64,
}

/// Week-over-week variation of `metric`, most recent first.
pub fn weekly_variation(series: &[WeekBucket], metric: SeriesMetric) -> Vec<WeeklyVariation> {
    series
        .windows(2)
        .map(|pair| {
            let previous_value = metric.value(&pair[0]);
            let current_value = metric.value(&pair[1]);
            let delta = current_value - previous_value;
            let growth_rate = if previous_value == 0.0 {
                0.0
            } else {
                delta / previous_value
            };
            WeeklyVariation {
                key: pair[1].key,
                previous_key: pair[0].key,
                metric,
                previous_value,
                current_value,
                delta,
                growth_rate,
            }
        })
        .rev()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Alert;
    use approx::assert_abs_diff_eq;

    fn contract(id: &str, value: f64) -> Contract {
        Contract {
            reference_id: id.to_string(),
            managing_center: "DAGMA".to_string(),
            bank: "Banco Popular".to_string(),
            contract_value: value,
            start_date: None,
            end_date: None,
            sector: "Ambiente".to_string(),
            status: "En ejecución".to_string(),
        }
    }

    fn report(id: &str, y: i32, m: u32, d: u32, physical: f64) -> ProgressReport {
        ProgressReport {
            contract_reference_id: id.to_string(),
            report_date: NaiveDate::from_ymd_opt(y, m, d).and_then(|d| d.and_hms_opt(10, 0, 0)),
            physical_progress_pct: physical,
            financial_progress_pct: physical / 2.0,
            observations: String::new(),
            alert: Alert::default(),
        }
    }

    fn bucket(week: u32, physical: f64) -> WeekBucket {
        let key = WeekKey { year: 2024, week };
        WeekBucket {
            key,
            week_start: key.monday(),
            is_current: false,
            contract_count: 1,
            awarded_value: 100.0,
            executed_value: 0.0,
            weighted_physical_pct: physical,
            weighted_financial_pct: 0.0,
            entries: Vec::new(),
        }
    }

    #[test]
    fn iso_weeks_follow_thursday_rule() {
        // Monday 2024-12-30 already belongs to 2025-W01.
        let d = NaiveDate::from_ymd_opt(2024, 12, 30).unwrap();
        assert_eq!(WeekKey::from_date(d), WeekKey { year: 2025, week: 1 });
        // Friday 2021-01-01 is still 2020-W53.
        let d = NaiveDate::from_ymd_opt(2021, 1, 1).unwrap();
        assert_eq!(WeekKey::from_date(d), WeekKey { year: 2020, week: 53 });
        assert_eq!(WeekKey { year: 2020, week: 53 }.to_string(), "2020-W53");
        assert_eq!(
            WeekKey { year: 2020, week: 53 }.next(),
            Some(WeekKey { year: 2021, week: 1 })
        );
        assert!(WeekKey { year: 2020, week: 53 } < WeekKey { year: 2021, week: 1 });
    }

    #[test]
    fn last_bucket_uses_global_latest() {
        // 2024-01-03 is W01, 2024-01-17 is W03.
        let contracts = vec![contract("c1", 100.0)];
        let reports = vec![
            report("c1", 2024, 1, 17, 90.0),
            report("c1", 2024, 1, 3, 50.0),
        ];
        let series = build_weekly_series(&contracts, &reports, WeekAxis::Contiguous);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0].key, WeekKey { year: 2024, week: 1 });
        assert_abs_diff_eq!(series[0].weighted_physical_pct, 50.0, epsilon = 1e-9);
        assert_eq!(series[1].contract_count, 0);
        assert!(series[1].entries.is_empty());
        assert_eq!(series[1].weighted_physical_pct, 0.0);
        assert!(series[2].is_current);
        assert_abs_diff_eq!(series[2].weighted_physical_pct, 90.0, epsilon = 1e-9);
    }

    #[test]
    fn observed_axis_skips_silent_weeks() {
        let contracts = vec![contract("c1", 100.0)];
        let reports = vec![
            report("c1", 2024, 1, 3, 50.0),
            report("c1", 2024, 1, 17, 90.0),
        ];
        let series = build_weekly_series(&contracts, &reports, WeekAxis::Observed);
        let weeks: Vec<u32> = series.iter().map(|b| b.key.week).collect();
        assert_eq!(weeks, vec![1, 3]);
    }

    #[test]
    fn earlier_buckets_only_see_their_own_week() {
        let contracts = vec![contract("c1", 100.0), contract("c2", 300.0)];
        let reports = vec![
            report("c1", 2024, 1, 3, 50.0),
            report("c2", 2024, 1, 10, 20.0),
            report("c1", 2024, 1, 17, 90.0),
        ];
        let series = build_weekly_series(&contracts, &reports, WeekAxis::Observed);
        assert_eq!(series.len(), 3);

        let week2 = &series[1];
        assert_eq!(week2.contract_count, 1);
        assert_eq!(week2.entries[0].reference_id, "c2");
        assert_abs_diff_eq!(week2.weighted_physical_pct, 20.0, epsilon = 1e-9);

        // Last bucket: c1 at 90 and c2 still at its latest 20.
        let current = &series[2];
        assert_eq!(current.contract_count, 2);
        let c1 = current.entries.iter().find(|e| e.reference_id == "c1").unwrap();
        assert_eq!(c1.physical_progress_pct, 90.0);
        assert_abs_diff_eq!(
            current.weighted_physical_pct,
            (90.0 * 100.0 + 20.0 * 300.0) / 400.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(current.awarded_value, 400.0, epsilon = 1e-9);
    }

    #[test]
    fn latest_within_week_wins() {
        let contracts = vec![contract("c1", 100.0)];
        let reports = vec![
            report("c1", 2024, 1, 2, 10.0),
            report("c1", 2024, 1, 5, 30.0),
            report("c1", 2024, 1, 4, 20.0),
            report("c1", 2024, 2, 1, 70.0),
        ];
        let series = build_weekly_series(&contracts, &reports, WeekAxis::Observed);
        assert_abs_diff_eq!(series[0].weighted_physical_pct, 30.0, epsilon = 1e-9);
    }

    #[test]
    fn no_reports_no_buckets() {
        let contracts = vec![contract("c1", 100.0)];
        assert!(build_weekly_series(&contracts, &[], WeekAxis::Observed).is_empty());
        assert!(build_weekly_series(&contracts, &[], WeekAxis::Contiguous).is_empty());
    }

    #[test]
    fn undated_reports_do_not_create_weeks() {
        let contracts = vec![contract("c1", 100.0)];
        let mut undated = report("c1", 2024, 1, 3, 50.0);
        undated.report_date = None;
        let series = build_weekly_series(&contracts, &[undated], WeekAxis::Observed);
        assert!(series.is_empty());
    }

    #[test]
    fn variation_delta_and_growth() {
        let series = vec![bucket(1, 40.0), bucket(2, 55.0)];
        let variation = weekly_variation(&series, SeriesMetric::Physical);
        assert_eq!(variation.len(), 1);
        assert_abs_diff_eq!(variation[0].delta, 15.0, epsilon = 1e-9);
        assert_abs_diff_eq!(variation[0].growth_rate, 0.375, epsilon = 1e-9);
        assert_eq!(variation[0].previous_value, 40.0);
        assert_eq!(variation[0].current_value, 55.0);
    }

    #[test]
    fn variation_is_most_recent_first_and_safe_from_zero() {
        let series = vec![bucket(1, 0.0), bucket(2, 10.0), bucket(3, 15.0)];
        let variation = weekly_variation(&series, SeriesMetric::Physical);
        let weeks: Vec<u32> = variation.iter().map(|v| v.key.week).collect();
        assert_eq!(weeks, vec![3, 2]);
        assert_eq!(variation[1].growth_rate, 0.0);
        assert_abs_diff_eq!(variation[0].growth_rate, 0.5, epsilon = 1e-9);
        assert!(weekly_variation(&series[..1], SeriesMetric::Financial).is_empty());
    }
}
