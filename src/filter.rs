//! Contract filters applied before any rollup.
use crate::resolver::ReportWindow;
use crate::types::Contract;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// Contract fields a filter can select on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterDimension {
    Bank,
    ManagingCenter,
    Sector,
    Status,
}

fn bank_of(c: &Contract) -> &str {
    &c.bank
}

fn managing_center_of(c: &Contract) -> &str {
    &c.managing_center
}

fn sector_of(c: &Contract) -> &str {
    &c.sector
}

fn status_of(c: &Contract) -> &str {
    &c.status
}

// Names accepted on input, English and as the source exports spell them.
static DIMENSION_NAMES: Lazy<HashMap<&'static str, FilterDimension>> = Lazy::new(|| {
    HashMap::from([
        ("bank", FilterDimension::Bank),
        ("banco", FilterDimension::Bank),
        ("center", FilterDimension::ManagingCenter),
        ("managing_center", FilterDimension::ManagingCenter),
        ("centro_gestor", FilterDimension::ManagingCenter),
        ("sector", FilterDimension::Sector),
        ("status", FilterDimension::Status),
        ("estado", FilterDimension::Status),
    ])
});

impl FilterDimension {
    pub const ALL: [FilterDimension; 4] = [
        FilterDimension::Bank,
        FilterDimension::ManagingCenter,
        FilterDimension::Sector,
        FilterDimension::Status,
    ];

    /// Accessor for the contract field this dimension filters on.
    pub fn field(self) -> fn(&Contract) -> &str {
        match self {
            FilterDimension::Bank => bank_of,
            FilterDimension::ManagingCenter => managing_center_of,
            FilterDimension::Sector => sector_of,
            FilterDimension::Status => status_of,
        }
    }

    pub fn parse(name: &str) -> Option<FilterDimension> {
        DIMENSION_NAMES
            .get(name.trim().to_lowercase().as_str())
            .copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterDimension::Bank => "bank",
            FilterDimension::ManagingCenter => "managing_center",
            FilterDimension::Sector => "sector",
            FilterDimension::Status => "status",
        }
    }
}

impl fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Active filter state. Values within one dimension are alternatives;
/// different dimensions must all match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub selections: BTreeMap<FilterDimension, BTreeSet<String>>,
    /// Case-insensitive substring over reference id and managing center.
    pub search: Option<String>,
    /// Inclusive bounds on which reports may be resolved.
    pub report_from: Option<NaiveDate>,
    pub report_to: Option<NaiveDate>,
}

impl FilterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(mut self, dimension: FilterDimension, value: impl Into<String>) -> Self {
        self.selections
            .entry(dimension)
            .or_default()
            .insert(value.into());
        self
    }

    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = if text.trim().is_empty() {
            None
        } else {
            Some(text)
        };
        self
    }

    pub fn with_report_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.report_from = from;
        self.report_to = to;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.selections.values().all(BTreeSet::is_empty)
            && self.search.is_none()
            && self.report_from.is_none()
            && self.report_to.is_none()
    }

    pub fn matches(&self, contract: &Contract) -> bool {
        let selected = self.selections.iter().all(|(dimension, values)| {
            if values.is_empty() {
                return true;
            }
            let field = dimension.field()(contract).trim().to_lowercase();
            values.iter().any(|v| v.trim().to_lowercase() == field)
        });
        if !selected {
            return false;
        }
        match &self.search {
            Some(text) => {
                let needle = text.trim().to_lowercase();
                contract.reference_id.to_lowercase().contains(&needle)
                    || contract.managing_center.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Contracts passing the filter, in input order.
    pub fn apply(&self, contracts: &[Contract]) -> Vec<Contract> {
        contracts
            .iter()
            .filter(|c| self.matches(c))
            .cloned()
            .collect()
    }

    pub fn report_window(&self) -> ReportWindow {
        ReportWindow::between(self.report_from, self.report_to)
    }
}

/// Distinct values of one dimension, for listing filter choices.
pub fn available_values(contracts: &[Contract], dimension: FilterDimension) -> BTreeSet<String> {
    let field = dimension.field();
    contracts.iter().map(|c| field(c).to_string()).collect()
}
