// Utility helpers for lenient parsing and number formatting.
//
// This module centralizes all the "dirty" field handling so the rest of the
// code can assume typed values. Anything that cannot be parsed comes back as
// `None`; callers decide the safe default.
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use num_format::{Locale, ToFormattedString};

/// Parse a string-like amount into `f64`, forgiving the formatting found in
/// API and spreadsheet exports.
///
/// - Trims whitespace and a leading currency sign (`$`).
/// - Rejects values that contain alphabetic characters.
/// - `1,234,567.89` strips the commas.
/// - `1.234.567,89` (es-CO style) swaps the separators.
pub fn parse_f64_safe(s: Option<&str>) -> Option<f64> {
    let s = s?.trim().trim_start_matches('$').trim();
    if s.is_empty() {
        return None;
    }
    if s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s: String = s.chars().filter(|c| !c.is_whitespace()).collect();
    let normalized = match (s.rfind(','), s.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => s.replace('.', "").replace(',', "."),
        (Some(comma), None) if s.matches(',').count() == 1 && s.len() - comma != 4 => {
            s.replace(',', ".")
        }
        (None, Some(_)) if s.matches('.').count() > 1 => s.replace('.', ""),
        _ => s.replace(',', ""),
    };
    normalized.parse::<f64>().ok()
}

/// Parse a calendar date. Accepts ISO dates, full timestamps (the time part is
/// dropped) and the `DD/MM/YYYY` form used by the municipal exports.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    parse_datetime_safe(s).map(|dt| dt.date())
}

/// Parse a report timestamp. Plain dates resolve to midnight.
pub fn parse_datetime_safe(s: Option<&str>) -> Option<NaiveDateTime> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Interpret the yes/no style flags used for alerts.
pub fn parse_flag(s: Option<&str>) -> bool {
    let Some(s) = s else { return false };
    matches!(
        s.trim().to_lowercase().as_str(),
        "true" | "1" | "si" | "sí" | "yes" | "x"
    )
}

/// Trimmed text or the given placeholder when missing/blank.
pub fn text_or(s: Option<String>, placeholder: &str) -> String {
    match s {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => placeholder.to_string(),
    }
}

pub fn format_number(n: f64, decimals: usize) -> String {
    // Fixed decimals plus locale-aware thousands separators (`1,234,567.89`).
    if !n.is_finite() {
        return "0".to_string();
    }
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let mut parts = s.split('.');
    let int_part = parts.next().unwrap_or("0");
    let frac_part = parts.next();
    let int_val: i64 = int_part.parse().unwrap_or(0);
    let mut res = int_val.to_formatted_string(&Locale::en);
    if let Some(frac) = frac_part {
        res.push('.');
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}
