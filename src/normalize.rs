//! # Numeric Normalizer
//! Turns loosely formatted upstream values ("$4,774.70", "16.35%", "N/A",
//! "38 (red)") into clean two-decimal floats.
//!
//! Never fails: anything unparseable collapses to `0.0`, which the
//! reconciliation step treats as "no value".

use once_cell::sync::OnceCell;
use regex::Regex;

/// A raw upstream value before cleaning.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue<'a> {
    Text(&'a str),
    Number(f64),
    Absent,
}

impl<'a> From<&'a str> for RawValue<'a> {
    fn from(s: &'a str) -> Self {
        RawValue::Text(s)
    }
}

impl From<f64> for RawValue<'_> {
    fn from(x: f64) -> Self {
        RawValue::Number(x)
    }
}

impl<'a, T: Into<RawValue<'a>>> From<Option<T>> for RawValue<'a> {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(RawValue::Absent)
    }
}

/// Normalize any raw value into a finite, two-decimal float (`0.0` on failure).
pub fn normalize<'a>(raw: impl Into<RawValue<'a>>) -> f64 {
    match raw.into() {
        RawValue::Absent => 0.0,
        RawValue::Number(x) => finite_or_zero(round2(x)),
        RawValue::Text(s) => normalize_str(s),
    }
}

/// Text path of [`normalize`].
pub fn normalize_str(s: &str) -> f64 {
    // 1) Drop thousands separators, currency and percent markers.
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, ',' | '$' | '%'))
        .collect();

    // 2) First signed decimal number wins; trailing annotations are ignored.
    static RE_NUM: OnceCell<Regex> = OnceCell::new();
    let re = RE_NUM.get_or_init(|| Regex::new(r"[-+]?\d*\.?\d+").unwrap());

    re.find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .map(round2)
        .map(finite_or_zero)
        .unwrap_or(0.0)
}

/// Render a value the way upstream feeds and the dashboard show it
/// (thousands separators, two decimals). `normalize(normalize_display(x))`
/// gives back `normalize(x)`.
pub fn normalize_display(x: f64) -> String {
    let x = round2(x);
    let neg = x < 0.0;
    let fixed = format!("{:.2}", x.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}{grouped}.{frac_part}", if neg { "-" } else { "" })
}

/// Round half away from zero to two decimals.
#[inline]
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[inline]
fn finite_or_zero(x: f64) -> f64 {
    if x.is_finite() {
        x
    } else {
        0.0
    }
}
