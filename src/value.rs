//! Cell values and the coercion rules shared by every aggregation.
//!
//! A [`Scalar`] is the tagged form of a single spreadsheet cell. All of the
//! numeric, blank and date interpretation used by the engine goes through the
//! helpers in this module so that each job applies the same rules:
//!
//! - [`is_blank`]: absent cells and text that trims to nothing.
//! - [`to_number`]: lenient numeric coercion (empty text counts as `0`,
//!   booleans as `1`/`0`, hex/octal/binary literals and `Infinity` accepted).
//! - [`to_date`]: epoch milliseconds or one of the supported text layouts.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Boolean(bool),
    Text(String),
    #[default]
    Absent,
}

impl Scalar {
    /// Classifies a raw text cell as produced by a CSV reader. A present but
    /// empty field stays blank text; only fields missing from a short record
    /// are [`Scalar::Absent`].
    pub fn infer(raw: &str) -> Scalar {
        if raw.eq_ignore_ascii_case("true") {
            return Scalar::Boolean(true);
        }
        if raw.eq_ignore_ascii_case("false") {
            return Scalar::Boolean(false);
        }
        let trimmed = raw.trim();
        if !trimmed.is_empty()
            && looks_like_decimal(trimmed)
            && let Ok(parsed) = trimmed.parse::<f64>()
            && parsed.is_finite()
        {
            return Scalar::Number(parsed);
        }
        Scalar::Text(raw.to_string())
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Scalar::Absent)
    }

    pub fn as_display(&self) -> String {
        match self {
            Scalar::Number(n) => format_number(*n),
            Scalar::Boolean(b) => b.to_string(),
            Scalar::Text(s) => s.clone(),
            Scalar::Absent => String::new(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Scalar::Number(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Scalar::Number(value as f64)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Scalar::Number(f64::from(value))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Boolean(value)
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Scalar::Text(value)
    }
}

impl<T: Into<Scalar>> From<Option<T>> for Scalar {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Scalar::Absent)
    }
}

pub fn is_blank(value: &Scalar) -> bool {
    match value {
        Scalar::Absent => true,
        Scalar::Text(s) => s.trim().is_empty(),
        Scalar::Number(_) | Scalar::Boolean(_) => false,
    }
}

/// Lenient numeric coercion. `None` means the value does not count as numeric.
pub fn to_number(value: &Scalar) -> Option<f64> {
    match value {
        Scalar::Number(n) if n.is_nan() => None,
        Scalar::Number(n) => Some(*n),
        Scalar::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
        Scalar::Text(s) => parse_numeric_text(s),
        Scalar::Absent => None,
    }
}

/// Parses a cell as a point in time. Numbers are epoch milliseconds.
pub fn to_date(value: &Scalar) -> Option<NaiveDateTime> {
    match value {
        Scalar::Number(ms) if ms.is_finite() => {
            DateTime::from_timestamp_millis(ms.trunc() as i64).map(|dt| dt.naive_utc())
        }
        Scalar::Text(s) => parse_date_text(s.trim()),
        _ => None,
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        (value as i64).to_string()
    } else {
        value.to_string()
    }
}

fn looks_like_decimal(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'))
}

fn parse_numeric_text(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Some(0.0);
    }
    match trimmed {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    if let Some(parsed) = parse_radix_literal(trimmed) {
        return Some(parsed);
    }
    if !looks_like_decimal(trimmed) {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

fn parse_radix_literal(text: &str) -> Option<f64> {
    let lowered = text.get(..2)?.to_ascii_lowercase();
    let radix = match lowered.as_str() {
        "0x" => 16,
        "0o" => 8,
        "0b" => 2,
        _ => return None,
    };
    let digits = &text[2..];
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, radix).ok().map(|v| v as f64)
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%d-%m-%Y"];

fn parse_date_text(text: &str) -> Option<NaiveDateTime> {
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(parsed);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(text, fmt) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}
