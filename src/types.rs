use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tabled::Tabled;

/// Bank label used when a contract has no funding bank recorded.
pub const UNDEFINED_BANK: &str = "Sin definir";

/// Contract row as it arrives from the API export or CSV dump. Every field is
/// optional text so one dirty value never rejects the whole file.
#[derive(Debug, Default, Deserialize)]
pub struct RawContractRow {
    #[serde(alias = "referencia_contrato", alias = "referenceId")]
    pub reference_id: Option<String>,
    #[serde(alias = "nombre_centro_gestor", alias = "managingCenter")]
    pub managing_center: Option<String>,
    #[serde(alias = "banco")]
    pub bank: Option<String>,
    #[serde(alias = "valor_contrato", alias = "contractValue")]
    pub contract_value: Option<String>,
    #[serde(alias = "fecha_inicio", alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "fecha_fin", alias = "endDate")]
    pub end_date: Option<String>,
    pub sector: Option<String>,
    #[serde(alias = "estado_contrato", alias = "estado")]
    pub status: Option<String>,
}

/// Progress report row as exported, before typing.
#[derive(Debug, Default, Deserialize)]
pub struct RawReportRow {
    #[serde(alias = "referencia_contrato", alias = "contractReferenceId")]
    pub contract_reference_id: Option<String>,
    #[serde(alias = "avance_fisico", alias = "physicalProgressPct")]
    pub physical_progress_pct: Option<String>,
    #[serde(alias = "avance_financiero", alias = "financialProgressPct")]
    pub financial_progress_pct: Option<String>,
    #[serde(alias = "fecha_reporte", alias = "reportDate")]
    pub report_date: Option<String>,
    #[serde(alias = "observaciones")]
    pub observations: Option<String>,
    #[serde(alias = "alerta", alias = "alert")]
    pub alert_flag: Option<String>,
    #[serde(alias = "descripcion_alerta", alias = "alertDescription")]
    pub alert_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contract {
    pub reference_id: String,
    pub managing_center: String,
    pub bank: String,
    /// Raw value as loaded; may be negative or non-finite in dirty data.
    /// Weighting goes through `aggregate::weight_of`.
    pub contract_value: f64,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub sector: String,
    pub status: String,
}

impl Contract {
    /// Planned execution window in days, when both dates are known.
    pub fn duration_days(&self) -> Option<i64> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some((end - start).num_days()),
            _ => None,
        }
    }

    /// The planned end date has passed while physical progress is incomplete.
    pub fn is_overdue(&self, as_of: NaiveDate, physical_progress_pct: f64) -> bool {
        match self.end_date {
            Some(end) => end < as_of && physical_progress_pct < 100.0,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Alert {
    pub flagged: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub contract_reference_id: String,
    /// `None` when the source timestamp could not be parsed; such reports are
    /// never selected as a contract's current report.
    pub report_date: Option<NaiveDateTime>,
    pub physical_progress_pct: f64,
    pub financial_progress_pct: f64,
    pub observations: String,
    pub alert: Alert,
}

/// Contracts and reports as fetched at one point in time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub contracts: Vec<Contract>,
    pub reports: Vec<ProgressReport>,
}

impl Snapshot {
    pub fn new(contracts: Vec<Contract>, reports: Vec<ProgressReport>) -> Self {
        Self { contracts, reports }
    }
}

/// One rendered line of a by-bank / by-center / by-sector table.
#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AggregateRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Contracts")]
    #[tabled(rename = "Contracts")]
    pub contracts: usize,
    #[serde(rename = "AwardedValue")]
    #[tabled(rename = "AwardedValue")]
    pub awarded_value: String,
    #[serde(rename = "ExecutedValue")]
    #[tabled(rename = "ExecutedValue")]
    pub executed_value: String,
    #[serde(rename = "PhysicalPct")]
    #[tabled(rename = "PhysicalPct")]
    pub physical_pct: String,
    #[serde(rename = "FinancialPct")]
    #[tabled(rename = "FinancialPct")]
    pub financial_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WeekRow {
    #[serde(rename = "Week")]
    #[tabled(rename = "Week")]
    pub week: String,
    #[serde(rename = "WeekStart")]
    #[tabled(rename = "WeekStart")]
    pub week_start: String,
    #[serde(rename = "Contracts")]
    #[tabled(rename = "Contracts")]
    pub contracts: usize,
    #[serde(rename = "AwardedValue")]
    #[tabled(rename = "AwardedValue")]
    pub awarded_value: String,
    #[serde(rename = "PhysicalPct")]
    #[tabled(rename = "PhysicalPct")]
    pub physical_pct: String,
    #[serde(rename = "FinancialPct")]
    #[tabled(rename = "FinancialPct")]
    pub financial_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct VariationRow {
    #[serde(rename = "Week")]
    #[tabled(rename = "Week")]
    pub week: String,
    #[serde(rename = "Metric")]
    #[tabled(rename = "Metric")]
    pub metric: String,
    #[serde(rename = "Previous")]
    #[tabled(rename = "Previous")]
    pub previous: String,
    #[serde(rename = "Current")]
    #[tabled(rename = "Current")]
    pub current: String,
    #[serde(rename = "Delta")]
    #[tabled(rename = "Delta")]
    pub delta: String,
    #[serde(rename = "GrowthPct")]
    #[tabled(rename = "GrowthPct")]
    pub growth_pct: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct AlertRow {
    #[serde(rename = "Contract")]
    #[tabled(rename = "Contract")]
    pub reference_id: String,
    #[serde(rename = "ManagingCenter")]
    #[tabled(rename = "ManagingCenter")]
    pub managing_center: String,
    #[serde(rename = "ReportDate")]
    #[tabled(rename = "ReportDate")]
    pub report_date: String,
    #[serde(rename = "Description")]
    #[tabled(rename = "Description")]
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(end: Option<NaiveDate>) -> Contract {
        Contract {
            reference_id: "C-1".to_string(),
            managing_center: "Secretaría de Infraestructura".to_string(),
            bank: "Banco de Bogotá".to_string(),
            contract_value: 1000.0,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1),
            end_date: end,
            sector: "Vías".to_string(),
            status: "En ejecución".to_string(),
        }
    }

    #[test]
    fn duration_needs_both_dates() {
        let c = contract(NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(c.duration_days(), Some(60));
        assert_eq!(contract(None).duration_days(), None);
    }

    #[test]
    fn overdue_only_when_past_end_and_incomplete() {
        let c = contract(NaiveDate::from_ymd_opt(2024, 3, 1));
        let later = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert!(c.is_overdue(later, 80.0));
        assert!(!c.is_overdue(later, 100.0));
        assert!(!c.is_overdue(earlier, 10.0));
        assert!(!contract(None).is_overdue(later, 0.0));
    }
}
