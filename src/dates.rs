// 📅 Dates & Quantities - Registry-specific value parsing
// Each registry writes dates and numbers its own way; this is where they converge

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use std::sync::LazyLock;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(1[89]\d{2}|2\d{3})\b").unwrap());

// ============================================================================
// DATE ORDER
// ============================================================================

/// How an ambiguous `NN/NN/YYYY` date should be read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
    /// Verra: `21/06/2017`
    DayFirst,
    /// APX registries (ACR, CAR, ART): `06/21/2017 12:00:00 AM`
    MonthFirst,
}

impl DateOrder {
    fn slash_format(&self) -> &'static str {
        match self {
            DateOrder::DayFirst => "%d/%m/%Y",
            DateOrder::MonthFirst => "%m/%d/%Y",
        }
    }
}

// Formats accepted regardless of order
const UNAMBIGUOUS_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%b-%Y", "%d %b %Y", "%b %d, %Y"];

// ============================================================================
// PARSERS
// ============================================================================

/// Parse a calendar date, dropping any time-of-day part
///
/// # Examples:
/// ```
/// use registry_harmonizer::dates::{parse_date, DateOrder};
/// use chrono::NaiveDate;
///
/// let d = parse_date("06/21/2017 12:00:00 AM", DateOrder::MonthFirst);
/// assert_eq!(d, NaiveDate::from_ymd_opt(2017, 6, 21));
/// ```
pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // ISO timestamps: keep the date half
    let candidate = match raw.split_once('T') {
        Some((date, _)) if date.len() == 10 && date.as_bytes()[4] == b'-' => date,
        _ => strip_time(raw),
    };

    if let Ok(date) = NaiveDate::parse_from_str(candidate, order.slash_format()) {
        return Some(date);
    }

    UNAMBIGUOUS_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(candidate, fmt).ok())
}

/// `06/21/2017 12:00:00 AM` → `06/21/2017`
fn strip_time(raw: &str) -> &str {
    match raw.find(|c: char| c.is_whitespace()) {
        // "Mar 3, 2020" carries spaces in the date itself
        Some(_) if raw.chars().next().is_some_and(|c| c.is_alphabetic()) => raw,
        Some(_) if raw.contains(':') => raw.split_whitespace().next().unwrap_or(raw),
        _ => raw,
    }
}

/// GCC publishes retirement dates as Unix epoch milliseconds
pub fn parse_unix_millis(raw: &str) -> Option<NaiveDate> {
    let millis = parse_integer(raw)?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.date_naive())
}

/// Year from a cell that may hold a bare year, a float (`2019.0`), or a date
pub fn parse_year(raw: &str) -> Option<i32> {
    if let Some(year) = parse_integer(raw).and_then(|y| i32::try_from(y).ok()) {
        return Some(year).filter(|y| (1800..=2999).contains(y));
    }
    YEAR_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Last year mentioned in a range such as `2019 - 2020`
pub fn parse_last_year(raw: &str) -> Option<i32> {
    YEAR_RE
        .captures_iter(raw)
        .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
        .last()
}

/// Calendar year of a date cell
pub fn year_of(raw: &str, order: DateOrder) -> Option<i32> {
    parse_date(raw, order).map(|d| d.year())
}

/// Whole-number quantity: thousands separators are stripped, `1200.0` is accepted,
/// fractional values are not
pub fn parse_integer(raw: &str) -> Option<i64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(value) = cleaned.parse::<i64>() {
        return Some(value);
    }
    let (whole, fraction) = cleaned.split_once('.')?;
    if fraction.chars().all(|c| c == '0') {
        whole.parse::<i64>().ok()
    } else {
        None
    }
}
