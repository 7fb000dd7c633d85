//! Compact `YYYYMMDD` calendar dates used by report requests.

use chrono::{Duration, NaiveDate};

const COMPACT_FORMAT: &str = "%Y%m%d";

pub fn to_compact(date: NaiveDate) -> String {
    date.format(COMPACT_FORMAT).to_string()
}

/// Parses an 8-digit `YYYYMMDD` string. Rejects separators, signs, whitespace
/// and impossible calendar dates.
pub fn parse_compact(value: &str) -> Option<NaiveDate> {
    if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(value, COMPACT_FORMAT).ok()
}

pub fn is_valid_compact(value: &str) -> bool {
    parse_compact(value).is_some()
}

/// The `days`-long window ending yesterday, relative to `today`.
pub fn default_range(today: NaiveDate, days: i64) -> (String, String) {
    let end = today - Duration::days(1);
    let start = end - Duration::days(days.max(1) - 1);
    (to_compact(start), to_compact(end))
}
