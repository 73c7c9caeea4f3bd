//! Latest-report resolution.
//!
//! Every rollup answers "what is this contract's current progress?" through
//! this module. A report is eligible when it belongs to the contract, has a
//! parseable date and falls inside the requested [`ReportWindow`]. Among the
//! eligible reports the one with the greatest `report_date` wins; on equal
//! timestamps the first one in input order is kept.
use crate::types::ProgressReport;
use crate::weekly::WeekKey;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

/// Which reports may count as "current" for a resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReportWindow {
    pub week: Option<WeekKey>,
    /// Inclusive lower bound on the report's calendar date.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound on the report's calendar date.
    pub to: Option<NaiveDate>,
}

impl ReportWindow {
    /// No restriction: the contract's global latest report.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn week(key: WeekKey) -> Self {
        Self {
            week: Some(key),
            ..Self::default()
        }
    }

    pub fn between(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self {
            week: None,
            from,
            to,
        }
    }

    /// Same date bounds, additionally restricted to one ISO week.
    pub fn within_week(self, key: WeekKey) -> Self {
        Self {
            week: Some(key),
            ..self
        }
    }

    pub fn is_global(&self) -> bool {
        self.week.is_none() && self.from.is_none() && self.to.is_none()
    }

    pub fn contains_date(&self, date: NaiveDateTime) -> bool {
        let day = date.date();
        if let Some(from) = self.from {
            if day < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if day > to {
                return false;
            }
        }
        match self.week {
            Some(key) => WeekKey::from_date(day) == key,
            None => true,
        }
    }

    pub fn contains(&self, report: &ProgressReport) -> bool {
        report
            .report_date
            .map(|d| self.contains_date(d))
            .unwrap_or(false)
    }
}

/// The single pick rule shared by the linear scan and the index.
fn pick_latest<'a, I>(candidates: I, window: &ReportWindow) -> Option<&'a ProgressReport>
where
    I: IntoIterator<Item = &'a ProgressReport>,
{
    let mut best: Option<(&'a ProgressReport, NaiveDateTime)> = None;
    for report in candidates {
        let Some(date) = report.report_date else {
            continue;
        };
        if !window.contains_date(date) {
            continue;
        }
        match best {
            Some((_, best_date)) if date <= best_date => {}
            _ => best = Some((report, date)),
        }
    }
    best.map(|(report, _)| report)
}

/// Linear scan over the whole report set. O(R) per call.
pub fn resolve_latest<'a>(
    reports: &'a [ProgressReport],
    contract_id: &str,
    window: &ReportWindow,
) -> Option<&'a ProgressReport> {
    pick_latest(
        reports
            .iter()
            .filter(|r| r.contract_reference_id == contract_id),
        window,
    )
}

/// Reports grouped by contract id once, so each resolution only looks at
/// that contract's history. Input order is preserved within each group,
/// which keeps tie-breaking identical to [`resolve_latest`].
#[derive(Debug, Clone, Default)]
pub struct ReportIndex<'a> {
    by_contract: HashMap<&'a str, Vec<&'a ProgressReport>>,
    total: usize,
    undated: usize,
}

impl<'a> ReportIndex<'a> {
    pub fn new(reports: &'a [ProgressReport]) -> Self {
        let mut by_contract: HashMap<&'a str, Vec<&'a ProgressReport>> = HashMap::new();
        let mut undated = 0usize;
        for r in reports {
            if r.report_date.is_none() {
                undated += 1;
            }
            by_contract
                .entry(r.contract_reference_id.as_str())
                .or_default()
                .push(r);
        }
        Self {
            by_contract,
            total: reports.len(),
            undated,
        }
    }

    pub fn latest(&self, contract_id: &str, window: &ReportWindow) -> Option<&'a ProgressReport> {
        let history = self.by_contract.get(contract_id)?;
        pick_latest(history.iter().copied(), window)
    }

    /// All reports filed for a contract, in input order.
    pub fn history(&self, contract_id: &str) -> &[&'a ProgressReport] {
        self.by_contract
            .get(contract_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn report_count(&self) -> usize {
        self.total
    }

    pub fn undated_count(&self) -> usize {
        self.undated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Alert;

    fn report(id: &str, date: Option<&str>, physical: f64) -> ProgressReport {
        ProgressReport {
            contract_reference_id: id.to_string(),
            report_date: date.map(|d| {
                NaiveDateTime::parse_from_str(d, "%Y-%m-%d %H:%M:%S").unwrap()
            }),
            physical_progress_pct: physical,
            financial_progress_pct: physical / 2.0,
            observations: String::new(),
            alert: Alert::default(),
        }
    }

    #[test]
    fn picks_maximum_date_regardless_of_order() {
        let reports = vec![
            report("A", Some("2024-02-10 08:00:00"), 30.0),
            report("A", Some("2024-03-01 08:00:00"), 60.0),
            report("B", Some("2024-04-01 08:00:00"), 99.0),
            report("A", Some("2024-01-05 08:00:00"), 10.0),
        ];
        let latest = resolve_latest(&reports, "A", &ReportWindow::global()).unwrap();
        assert_eq!(latest.physical_progress_pct, 60.0);
    }

    #[test]
    fn equal_timestamps_keep_first_in_input_order() {
        let reports = vec![
            report("A", Some("2024-03-01 08:00:00"), 40.0),
            report("A", Some("2024-03-01 08:00:00"), 70.0),
        ];
        let latest = resolve_latest(&reports, "A", &ReportWindow::global()).unwrap();
        assert_eq!(latest.physical_progress_pct, 40.0);
        let index = ReportIndex::new(&reports);
        let indexed = index.latest("A", &ReportWindow::global()).unwrap();
        assert!(std::ptr::eq(latest, indexed));
    }

    #[test]
    fn undated_reports_are_never_current() {
        let reports = vec![
            report("A", None, 95.0),
            report("A", Some("2024-01-05 08:00:00"), 10.0),
        ];
        let latest = resolve_latest(&reports, "A", &ReportWindow::global()).unwrap();
        assert_eq!(latest.physical_progress_pct, 10.0);
        let only_undated = vec![report("A", None, 95.0)];
        assert!(resolve_latest(&only_undated, "A", &ReportWindow::global()).is_none());
        assert_eq!(ReportIndex::new(&reports).undated_count(), 1);
    }

    #[test]
    fn week_window_limits_candidates() {
        let reports = vec![
            // 2024-01-03 is ISO 2024-W01, 2024-01-10 is 2024-W02
            report("A", Some("2024-01-03 08:00:00"), 20.0),
            report("A", Some("2024-01-10 08:00:00"), 35.0),
        ];
        let w1 = WeekKey { year: 2024, week: 1 };
        let w5 = WeekKey { year: 2024, week: 5 };
        let latest = resolve_latest(&reports, "A", &ReportWindow::week(w1)).unwrap();
        assert_eq!(latest.physical_progress_pct, 20.0);
        assert!(resolve_latest(&reports, "A", &ReportWindow::week(w5)).is_none());
    }

    #[test]
    fn date_range_is_inclusive() {
        let reports = vec![
            report("A", Some("2024-01-03 23:59:00"), 20.0),
            report("A", Some("2024-01-10 08:00:00"), 35.0),
        ];
        let to = NaiveDate::from_ymd_opt(2024, 1, 3);
        let window = ReportWindow::between(None, to);
        let latest = resolve_latest(&reports, "A", &window).unwrap();
        assert_eq!(latest.physical_progress_pct, 20.0);
        let from = NaiveDate::from_ymd_opt(2024, 1, 11);
        assert!(resolve_latest(&reports, "A", &ReportWindow::between(from, None)).is_none());
    }

    #[test]
    fn unknown_contract_resolves_to_none() {
        let reports = vec![report("A", Some("2024-01-03 08:00:00"), 20.0)];
        assert!(resolve_latest(&reports, "Z", &ReportWindow::global()).is_none());
        let index = ReportIndex::new(&reports);
        assert!(index.latest("Z", &ReportWindow::global()).is_none());
        assert!(index.history("Z").is_empty());
        assert_eq!(index.history("A").len(), 1);
        assert_eq!(index.report_count(), 1);
    }

    #[test]
    fn resolver_does_not_reorder_input() {
        let reports = vec![
            report("A", Some("2024-02-10 08:00:00"), 30.0),
            report("A", Some("2024-01-05 08:00:00"), 10.0),
        ];
        let before = reports.clone();
        let _ = resolve_latest(&reports, "A", &ReportWindow::global());
        let _ = ReportIndex::new(&reports);
        assert_eq!(reports, before);
    }
}
