use crate::error::{LoadError, LoadResult};
use serde::Serialize;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> LoadResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush().map_err(|e| LoadError::io(path, e))?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> LoadResult<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s).map_err(|e| LoadError::io(path, e))?;
    Ok(())
}

/// Markdown table of the first `max_rows` rows, or a placeholder when empty.
pub fn render_table<T>(rows: &[T], max_rows: usize) -> String
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        return "(no rows)".to_string();
    }
    Table::new(slice).with(Style::markdown()).to_string()
}

pub fn preview_table<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}", title);
    if rows.len() > max_rows {
        println!("(showing {} of {} rows)", max_rows, rows.len());
    }
    println!();
    println!("{}\n", render_table(rows, max_rows));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregateRow;

    fn rows() -> Vec<AggregateRow> {
        vec![
            AggregateRow {
                group: "Banco de Bogotá".to_string(),
                contracts: 2,
                awarded_value: "4,000.00".to_string(),
                executed_value: "2,000.00".to_string(),
                physical_pct: "60.00".to_string(),
                financial_pct: "50.00".to_string(),
            },
            AggregateRow {
                group: "BID".to_string(),
                contracts: 1,
                awarded_value: "500.00".to_string(),
                executed_value: "0.00".to_string(),
                physical_pct: "0.00".to_string(),
                financial_pct: "0.00".to_string(),
            },
        ]
    }

    #[test]
    fn csv_uses_renamed_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("by_bank.csv");
        write_csv(&path, &rows()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Group,Contracts,AwardedValue,ExecutedValue,PhysicalPct,FinancialPct")
        );
        assert_eq!(
            lines.next(),
            Some("Banco de Bogotá,2,\"4,000.00\",\"2,000.00\",60.00,50.00")
        );
    }

    #[test]
    fn json_summary_is_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        write_json(&path, &serde_json::json!({"total_contracts": 3})).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["total_contracts"], 3);
    }

    #[test]
    fn table_preview_truncates() {
        let table = render_table(&rows(), 1);
        assert!(table.contains("Banco de Bogotá"));
        assert!(!table.contains("BID"));
        assert_eq!(render_table::<AggregateRow>(&[], 3), "(no rows)");
    }

    #[test]
    fn write_into_missing_directory_fails() {
        let path = Path::new("/definitely/not/here/out.csv");
        assert!(write_csv(path, &rows()).is_err());
    }
}
