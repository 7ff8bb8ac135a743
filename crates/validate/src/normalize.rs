//! Field normalizers. Each one takes a single raw value and returns the
//! normalized value or `None` (missing); none of them fails on bad input.

use regex::Regex;
use std::sync::LazyLock;
use time::macros::format_description;
use time::parsing::Parsable;
use time::Date;

/// A cell equal to this marks the whole row as garbage.
pub const INVALID_ROW_SENTINEL: &str = "-----";
/// Raw appointment value of leads that never booked; such rows are dropped.
pub const UNBOOKED_APPOINTMENT: &str = "nu";

/// Textual nulls left behind by upstream exports.
const MISSING_TOKENS: [&str; 3] = ["nan", "None", "<NA>"];

static LOCATION_STATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\|\s*([A-Z]{2})\s*$").expect("valid location pattern"));

pub fn is_missing_token(value: &str) -> bool {
    value.trim().is_empty() || MISSING_TOKENS.contains(&value)
}

/// Maps textual nulls and blank cells to missing.
pub fn null_missing_token(value: Option<String>) -> Option<String> {
    value.filter(|v| !is_missing_token(v))
}

fn date_part(value: &str) -> &str {
    // drop any time-of-day suffix
    let v = value.trim();
    v.split(['T', ' ']).next().unwrap_or(v)
}

fn parse_first<P: Parsable + ?Sized>(value: &str, formats: &[&P]) -> Option<Date> {
    formats.iter().find_map(|fmt| Date::parse(value, *fmt).ok())
}

/// Entry dates come from the dash-separated export (`DD-MM-YYYY`, day first),
/// with ISO and slash-separated fallbacks. Output is `YYYY-MM-DD`.
pub fn normalize_entry_date(value: &str) -> Option<String> {
    let formats = [
        format_description!("[day padding:none]-[month padding:none]-[year]"),
        format_description!("[month padding:none]-[day padding:none]-[year]"),
        format_description!("[year]-[month padding:none]-[day padding:none]"),
        format_description!("[day padding:none]/[month padding:none]/[year]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
        format_description!("[year]/[month padding:none]/[day padding:none]"),
    ];
    parse_first(date_part(value), &formats).map(|d| d.to_string())
}

/// Appointment dates come from the booking tool (`DD/MM/YYYY`, day first, or an
/// ISO timestamp), with dash-separated fallbacks. Output is `YYYY-MM-DD`.
pub fn normalize_appt_date(value: &str) -> Option<String> {
    let formats = [
        format_description!("[day padding:none]/[month padding:none]/[year]"),
        format_description!("[month padding:none]/[day padding:none]/[year]"),
        format_description!("[year]-[month padding:none]-[day padding:none]"),
        format_description!("[year]/[month padding:none]/[day padding:none]"),
        format_description!("[day padding:none]-[month padding:none]-[year]"),
        format_description!("[month padding:none]-[day padding:none]-[year]"),
    ];
    parse_first(date_part(value), &formats).map(|d| d.to_string())
}

/// Exactly five ASCII digits, stored as an integer (leading zeros dropped).
pub fn normalize_zip(value: &str) -> Option<u32> {
    let v = value.trim();
    if v.len() != 5 || !v.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    v.parse().ok()
}

pub fn is_valid_state(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateCode {
    Valid(String),
    /// Taken from the trailing `| XX` of the location text.
    Inferred(String),
    Missing,
}

impl StateCode {
    pub fn into_value(self) -> Option<String> {
        match self {
            StateCode::Valid(s) | StateCode::Inferred(s) => Some(s),
            StateCode::Missing => None,
        }
    }
}

pub fn normalize_state(state: Option<&str>, location: Option<&str>) -> StateCode {
    if let Some(s) = state.map(str::trim).filter(|s| is_valid_state(s)) {
        return StateCode::Valid(s.to_string());
    }
    location
        .map(str::trim)
        .filter(|l| !is_missing_token(l))
        .and_then(|l| LOCATION_STATE.captures(l))
        .map(|c| StateCode::Inferred(c[1].to_string()))
        .unwrap_or(StateCode::Missing)
}

/// `true`/`false` become `"1"`/`"0"`; anything else passes through untouched.
pub fn normalize_flag(value: &str) -> String {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => "1".to_string(),
        "false" => "0".to_string(),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appointment_dates() {
        assert_eq!(normalize_appt_date("10/05/2024").as_deref(), Some("2024-05-10"));
        assert_eq!(normalize_appt_date("2024-05-10").as_deref(), Some("2024-05-10"));
        assert_eq!(normalize_appt_date("2024-05-10 14:30:00").as_deref(), Some("2024-05-10"));
        assert_eq!(normalize_appt_date("2024-05-10T14:30:00").as_deref(), Some("2024-05-10"));
        assert_eq!(normalize_appt_date("not-a-date"), None);
        assert_eq!(normalize_appt_date(""), None);
    }

    #[test]
    fn entry_dates_are_day_first_with_month_first_fallback() {
        assert_eq!(normalize_entry_date("01-10-2024").as_deref(), Some("2024-10-01"));
        assert_eq!(normalize_entry_date("10-25-2024").as_deref(), Some("2024-10-25"));
        assert_eq!(normalize_entry_date("2024-10-07").as_deref(), Some("2024-10-07"));
        assert_eq!(normalize_entry_date("5-3-2024").as_deref(), Some("2024-03-05"));
        assert_eq!(normalize_entry_date("31-31-2024"), None);
        assert_eq!(normalize_entry_date("nan"), None);
    }

    #[test]
    fn zip_is_five_digits_or_missing() {
        assert_eq!(normalize_zip("78701"), Some(78701));
        assert_eq!(normalize_zip("02134"), Some(2134));
        assert_eq!(normalize_zip("00000"), Some(0));
        assert_eq!(normalize_zip("7870"), None);
        assert_eq!(normalize_zip("787011"), None);
        assert_eq!(normalize_zip("78701.0"), None);
        assert_eq!(normalize_zip("7870a"), None);
        assert_eq!(normalize_zip("٧٨٧٠١"), None);
    }

    #[test]
    fn state_inferred_from_location() {
        assert_eq!(
            normalize_state(Some("nan"), Some("Springfield | IL")),
            StateCode::Inferred("IL".into())
        );
        assert_eq!(
            normalize_state(None, Some("  Springfield |  IL  ")),
            StateCode::Inferred("IL".into())
        );
        assert_eq!(normalize_state(Some("nan"), None), StateCode::Missing);
        assert_eq!(normalize_state(Some("nu"), Some("<NA>")), StateCode::Missing);
        assert_eq!(normalize_state(Some("tx"), Some("Austin")), StateCode::Missing);
        assert_eq!(
            normalize_state(Some("TX"), Some("Springfield | IL")),
            StateCode::Valid("TX".into())
        );
    }

    #[test]
    fn flags() {
        assert_eq!(normalize_flag("True"), "1");
        assert_eq!(normalize_flag("false"), "0");
        assert_eq!(normalize_flag("1"), "1");
        assert_eq!(normalize_flag("maybe"), "maybe");
    }

    #[test]
    fn missing_tokens() {
        assert_eq!(null_missing_token(Some("nan".into())), None);
        assert_eq!(null_missing_token(Some("None".into())), None);
        assert_eq!(null_missing_token(Some("  ".into())), None);
        assert_eq!(null_missing_token(Some("Nancy".into())), Some("Nancy".into()));
    }
}
