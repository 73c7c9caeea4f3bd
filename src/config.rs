//! Runtime settings read from the environment (and `.env`, when present).
use crate::weekly::WeekAxis;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_CONTRACTS_PATH: &str = "contratos_emprestito.json";
pub const DEFAULT_REPORTS_PATH: &str = "reportes_emprestito.json";
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub contracts_path: PathBuf,
    pub reports_path: PathBuf,
    pub output_dir: PathBuf,
    pub preview_rows: usize,
    pub week_axis: WeekAxis,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            contracts_path: PathBuf::from(DEFAULT_CONTRACTS_PATH),
            reports_path: PathBuf::from(DEFAULT_REPORTS_PATH),
            output_dir: PathBuf::from("."),
            preview_rows: DEFAULT_PREVIEW_ROWS,
            week_axis: WeekAxis::Observed,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            contracts_path: lookup("EMPRESTITO_CONTRACTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.contracts_path),
            reports_path: lookup("EMPRESTITO_REPORTS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reports_path),
            output_dir: lookup("EMPRESTITO_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            preview_rows: lookup("EMPRESTITO_PREVIEW_ROWS")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.preview_rows),
            week_axis: lookup("EMPRESTITO_WEEK_AXIS")
                .and_then(|v| parse_week_axis(&v))
                .unwrap_or(defaults.week_axis),
        }
    }
}

pub fn parse_week_axis(s: &str) -> Option<WeekAxis> {
    match s.trim().to_lowercase().as_str() {
        "observed" => Some(WeekAxis::Observed),
        "contiguous" => Some(WeekAxis::Contiguous),
        _ => None,
    }
}

/// Deployment environment name (`APP_ENV`), `development` when unset.
pub fn get_environment() -> String {
    env::var("APP_ENV").unwrap_or_else(|_| "development".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_when_nothing_set() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.preview_rows, 5);
    }

    #[test]
    fn reads_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("EMPRESTITO_CONTRACTS_PATH", "data/contratos.csv"),
            ("EMPRESTITO_OUTPUT_DIR", "out"),
            ("EMPRESTITO_PREVIEW_ROWS", "12"),
            ("EMPRESTITO_WEEK_AXIS", "Contiguous"),
        ]);
        let config = AppConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.contracts_path, PathBuf::from("data/contratos.csv"));
        assert_eq!(config.reports_path, PathBuf::from(DEFAULT_REPORTS_PATH));
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert_eq!(config.preview_rows, 12);
        assert_eq!(config.week_axis, WeekAxis::Contiguous);
    }

    #[test]
    fn bad_values_fall_back() {
        let config = AppConfig::from_lookup(|k| match k {
            "EMPRESTITO_PREVIEW_ROWS" => Some("many".to_string()),
            "EMPRESTITO_WEEK_AXIS" => Some("monthly".to_string()),
            _ => None,
        });
        assert_eq!(config.preview_rows, DEFAULT_PREVIEW_ROWS);
        assert_eq!(config.week_axis, WeekAxis::Observed);
    }
}
