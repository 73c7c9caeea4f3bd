//! Error types for loading snapshots and writing exports, plus the
//! recoverable data-quality issues the rollups tolerate.
use std::path::PathBuf;

pub type LoadResult<T> = Result<T, LoadError>;

/// Failures that stop a file from being read or written at all.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported file extension for {0} (expected .json or .csv)")]
    UnsupportedFormat(PathBuf),

    #[error("Unexpected JSON shape in {0}: expected an array or an object with a \"data\" array")]
    UnexpectedShape(PathBuf),
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Dirty-data conditions that are recovered with a safe default and logged.
/// None of these abort a rollup.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataIssue {
    #[error("contract {reference_id}: contract value {raw:?} is not a usable weight, treated as 0")]
    MissingWeight { reference_id: String, raw: String },

    #[error("contract {reference_id}: no progress report in scope")]
    NoMatchingReport { reference_id: String },

    #[error("{record} {reference_id}: unparsable {field} {raw:?}")]
    MalformedDate {
        record: &'static str,
        reference_id: String,
        field: &'static str,
        raw: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_issue_messages_name_the_contract() {
        let issue = DataIssue::MissingWeight {
            reference_id: "4151.010.32.1.123".to_string(),
            raw: "-5".to_string(),
        };
        let msg = issue.to_string();
        assert!(msg.contains("4151.010.32.1.123"));
        assert!(msg.contains("\"-5\""));

        let issue = DataIssue::MalformedDate {
            record: "report",
            reference_id: "C-1".to_string(),
            field: "fecha_reporte",
            raw: "31/31/2024".to_string(),
        };
        assert_eq!(
            issue.to_string(),
            "report C-1: unparsable fecha_reporte \"31/31/2024\""
        );
    }

    #[test]
    fn unsupported_format_mentions_path() {
        let err = LoadError::UnsupportedFormat(PathBuf::from("datos.xlsx"));
        assert!(err.to_string().contains("datos.xlsx"));
    }
}
