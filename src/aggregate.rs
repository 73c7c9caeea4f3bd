//! Value-weighted aggregation.
//!
//! Folding is two-pass: every contract is accumulated into its group first,
//! then each group is finalized once, when its full weight is known.
use crate::error::DataIssue;
use crate::resolver::{ReportIndex, ReportWindow};
use crate::types::{Contract, ProgressReport};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// Selects one percentage out of a report.
pub type MetricFn = fn(&ProgressReport) -> f64;

pub fn physical_pct(r: &ProgressReport) -> f64 {
    r.physical_progress_pct
}

pub fn financial_pct(r: &ProgressReport) -> f64 {
    r.financial_progress_pct
}

/// Physical first, financial second. [`WeightedAggregate`] relies on this order.
pub const STANDARD_METRICS: [MetricFn; 2] = [physical_pct, financial_pct];

/// A contract's weight: its value, or 0 when the value is negative or not finite.
pub fn weight_of(contract: &Contract) -> f64 {
    let v = contract.contract_value;
    if v.is_finite() && v >= 0.0 {
        v
    } else {
        let issue = DataIssue::MissingWeight {
            reference_id: contract.reference_id.clone(),
            raw: v.to_string(),
        };
        debug!(%issue, "coercing contract weight to 0");
        0.0
    }
}

fn reading(metric: MetricFn, report: &ProgressReport) -> f64 {
    let v = metric(report);
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Accumulated and finalized sums for one group.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupTotals<K> {
    pub key: K,
    pub contract_count: usize,
    /// Contracts that resolved a report and so carry weight in the averages.
    pub reported_count: usize,
    pub awarded_value: f64,
    pub weight_sum: f64,
    pub metric_sums: Vec<f64>,
    /// `metric_sums[i] / weight_sum`, or 0 when nothing carried weight.
    pub weighted: Vec<f64>,
}

impl<K> GroupTotals<K> {
    fn new(key: K, metric_count: usize) -> Self {
        Self {
            key,
            contract_count: 0,
            reported_count: 0,
            awarded_value: 0.0,
            weight_sum: 0.0,
            metric_sums: vec![0.0; metric_count],
            weighted: vec![0.0; metric_count],
        }
    }

    fn finalize(&mut self) {
        for (out, sum) in self.weighted.iter_mut().zip(&self.metric_sums) {
            *out = if self.weight_sum > 0.0 {
                sum / self.weight_sum
            } else {
                0.0
            };
        }
    }
}

/// Fold `contracts` into groups using a caller-supplied resolution of each
/// contract's current report.
///
/// A contract always counts toward `contract_count` and `awarded_value`; it
/// only adds weight to the metric averages when `resolve` returns a report.
pub fn aggregate_with<'r, K, G, R>(
    contracts: &[Contract],
    mut resolve: R,
    group_key: G,
    metrics: &[MetricFn],
) -> BTreeMap<K, GroupTotals<K>>
where
    K: Ord + Clone,
    G: Fn(&Contract) -> K,
    R: FnMut(&Contract) -> Option<&'r ProgressReport>,
{
    let mut groups: BTreeMap<K, GroupTotals<K>> = BTreeMap::new();
    for contract in contracts {
        let weight = weight_of(contract);
        let key = group_key(contract);
        let totals = groups
            .entry(key.clone())
            .or_insert_with(|| GroupTotals::new(key, metrics.len()));
        totals.contract_count += 1;
        totals.awarded_value += weight;

        match resolve(contract) {
            Some(report) => {
                totals.reported_count += 1;
                totals.weight_sum += weight;
                for (sum, metric) in totals.metric_sums.iter_mut().zip(metrics) {
                    *sum += reading(*metric, report) * weight;
                }
            }
            None => {
                let issue = DataIssue::NoMatchingReport {
                    reference_id: contract.reference_id.clone(),
                };
                trace!(%issue, "contract adds no weight");
            }
        }
    }
    for totals in groups.values_mut() {
        totals.finalize();
    }
    groups
}

/// Fold using each contract's global latest report.
pub fn aggregate<K, G>(
    contracts: &[Contract],
    reports: &[ProgressReport],
    group_key: G,
    metrics: &[MetricFn],
) -> BTreeMap<K, GroupTotals<K>>
where
    K: Ord + Clone,
    G: Fn(&Contract) -> K,
{
    let index = ReportIndex::new(reports);
    let window = ReportWindow::global();
    aggregate_with(
        contracts,
        |c| index.latest(&c.reference_id, &window),
        group_key,
        metrics,
    )
}

/// Physical/financial rollup for one group (a bank, a managing center, ...).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightedAggregate {
    pub key: String,
    pub contract_count: usize,
    pub reported_count: usize,
    pub awarded_value: f64,
    pub executed_value: f64,
    pub weighted_physical_pct: f64,
    pub weighted_financial_pct: f64,
}

impl WeightedAggregate {
    /// Build from totals folded with [`STANDARD_METRICS`].
    pub fn from_totals(totals: GroupTotals<String>) -> Self {
        let financial_sum = totals.metric_sums.get(1).copied().unwrap_or(0.0);
        Self {
            contract_count: totals.contract_count,
            reported_count: totals.reported_count,
            awarded_value: totals.awarded_value,
            executed_value: financial_sum / 100.0,
            weighted_physical_pct: totals.weighted.first().copied().unwrap_or(0.0),
            weighted_financial_pct: totals.weighted.get(1).copied().unwrap_or(0.0),
            key: totals.key,
        }
    }
}

/// Standard rollup of `contracts` grouped by `group_key`, resolving reports
/// from `index` within `window`. Sorted by awarded value, largest first.
pub fn weighted_rollup<G>(
    contracts: &[Contract],
    index: &ReportIndex<'_>,
    window: &ReportWindow,
    group_key: G,
) -> Vec<WeightedAggregate>
where
    G: Fn(&Contract) -> String,
{
    let groups = aggregate_with(
        contracts,
        |c| index.latest(&c.reference_id, window),
        group_key,
        &STANDARD_METRICS,
    );
    let mut rows: Vec<WeightedAggregate> = groups
        .into_values()
        .map(WeightedAggregate::from_totals)
        .collect();
    sort_by_awarded(&mut rows);
    rows
}

/// Descending by awarded value; equal values fall back to the key so the
/// order never depends on hashing or input order.
pub fn sort_by_awarded(rows: &mut [WeightedAggregate]) {
    rows.sort_by(|a, b| {
        b.awarded_value
            .partial_cmp(&a.awarded_value)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.key.cmp(&b.key))
    });
}
