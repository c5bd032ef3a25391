//! Field-level normalization shared by the processor, the quality checker and
//! the duplicate-id sources.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::constants::{DATE_FORMATS, DAY_FORMATS, NULL_TOKENS};
use crate::types::Value;

static NON_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\D").expect("static regex"));
static DOT_ZERO_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.0$").expect("static regex"));
static WHITESPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("static regex"));

/// True for blank cells and the usual spreadsheet placeholders ("nan", "-", ...)
pub fn is_null_token(s: &str) -> bool {
    let trimmed = s.trim();
    NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// Trim, collapse inner whitespace runs to one space
pub fn collapse_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s.trim(), " ").into_owned()
}

/// Text form of a cell with surrounding whitespace and a float `.0` tail removed
pub fn clean_string(value: &Value) -> String {
    if value.is_null() {
        return String::new();
    }
    let display = value.to_display();
    DOT_ZERO_SUFFIX.replace(display.trim(), "").into_owned()
}

/// Same cleaning for identifiers that arrive as plain strings
pub fn clean_id(raw: &str) -> String {
    DOT_ZERO_SUFFIX.replace(raw.trim(), "").into_owned()
}

/// Order ids sometimes carry a `_suffix`; keep the part before it
pub fn extract_order_id(s: &str) -> String {
    let cleaned = clean_id(s);
    match cleaned.split_once('_') {
        Some((head, _)) => head.to_string(),
        None => cleaned,
    }
}

/// Digits only, with local prefixes rewritten to the `62` country code.
/// Returns an empty string when nothing numeric is left.
pub fn normalize_phone(raw: &str) -> String {
    if is_null_token(raw) {
        return String::new();
    }
    let cleaned = clean_id(raw);
    let digits = NON_DIGIT.replace_all(&cleaned, "").into_owned();
    if let Some(rest) = digits.strip_prefix('0') {
        format!("62{}", rest)
    } else if digits.starts_with('8') {
        format!("62{}", digits)
    } else {
        digits
    }
}

/// Indonesian mobile/landline number: 10 to 15 digits starting with 62
pub fn validate_phone(raw: &str) -> bool {
    let phone = normalize_phone(raw);
    (10..=15).contains(&phone.len()) && phone.starts_with("62")
}

/// Parse the date layouts found in fulfillment exports
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    if is_null_token(raw) {
        return None;
    }
    let cleaned = clean_id(raw);
    let s = cleaned.as_str();

    for fmt in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DAY_FORMATS {
        if let Ok(day) = NaiveDate::parse_from_str(s, fmt) {
            return day.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Date of a cell, whether already parsed or still text
pub fn value_as_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Date(dt) => Some(*dt),
        Value::Text(s) => parse_date(s),
        _ => None,
    }
}

pub fn format_date(dt: &NaiveDateTime, fmt: &str) -> String {
    dt.format(fmt).to_string()
}

/// Numeric reading of a cell; text counts when it parses as a number
pub fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}
