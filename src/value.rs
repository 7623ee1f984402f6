//! Dynamic row value type and the value-equivalence engine.
//!
//! A [`Value`] is the tagged union the core uses for every cell of every
//! row, regardless of which dialect produced it. [`normalize`] and
//! [`values_equal`] absorb the cross-dialect drift that otherwise produces
//! false-positive discrepancies: numeric precision, date-vs-datetime, and
//! incidental string padding.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fmt;

/// Absolute tolerance used when comparing two numeric values.
pub const NUMERIC_TOLERANCE: f64 = 1e-5;

/// The dynamic value domain flowing through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Decimal(Decimal),
    String(String),
    Date(NaiveDate),
    Datetime(chrono::NaiveDateTime),
    Bytes(Vec<u8>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Decimal(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
            Value::Date(v) => write!(f, "{v}"),
            Value::Datetime(v) => write!(f, "{v}"),
            Value::Bytes(v) => write!(f, "0x{}", hex_encode(v)),
        }
    }
}

impl Value {
    /// True for the `Null` variant only. Empty-string-as-null is a policy
    /// decision (`include_nulls`/`skip_nulls`), handled by callers via
    /// [`is_null_or_empty`], not baked into the value domain itself.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Decimal(v) => v.to_string().parse().ok(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Datetime(dt) => Some(dt.date()),
            Value::String(s) => parse_date_like(s.trim()),
            _ => None,
        }
    }

    fn as_str_trimmed(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::String(s) => s.trim().to_string(),
            other => other.to_string().trim().to_string(),
        }
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Parse a string as either a bare date or a datetime, discarding time,
/// timezone, and sub-second components, per §4.1 rule 3.
fn parse_date_like(s: &str) -> Option<NaiveDate> {
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(d);
    }
    chrono::DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Canonical form of a value, used both for display/hashing purposes and
/// as an intermediate step before equality is checked. See §4.1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Canonical {
    Null,
    Numeric(String),
    Date(String),
    Text(String),
}

impl fmt::Display for Canonical {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Canonical::Null => write!(f, "NULL"),
            Canonical::Numeric(s) | Canonical::Date(s) | Canonical::Text(s) => write!(f, "{s}"),
        }
    }
}

/// Canonicalize a single value: null sentinel, then numeric, then date,
/// then trimmed string — first rule that applies wins. See §4.1.
pub fn normalize(v: &Value) -> Canonical {
    if v.is_null() {
        return Canonical::Null;
    }
    if let Some(f) = v.as_f64() {
        return Canonical::Numeric(format!("{f:.5}"));
    }
    if let Some(d) = v.as_date() {
        return Canonical::Date(d.format("%Y-%m-%d").to_string());
    }
    Canonical::Text(v.as_str_trimmed())
}

/// Returns true iff `a` and `b` are equal under ANY of the normalization
/// rules, tried independently in order: numeric tolerance, then date,
/// then trimmed string. See §4.1 — this is intentionally not just
/// `normalize(a) == normalize(b)`, since a value that parses as a number
/// on one side and a string on the other must still fall through to
/// string comparison.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    if a.is_null() && b.is_null() {
        return true;
    }
    if a.is_null() || b.is_null() {
        return false;
    }

    if let (Some(fa), Some(fb)) = (a.as_f64(), b.as_f64()) {
        if (fa - fb).abs() < NUMERIC_TOLERANCE {
            return true;
        }
    }

    if let (Some(da), Some(db)) = (a.as_date(), b.as_date()) {
        if da == db {
            return true;
        }
    }

    a.as_str_trimmed() == b.as_str_trimmed()
}

/// True when `v` is null or an empty/whitespace-only string — the
/// "latest variant" open-question resolution in §9: `include_nulls` and
/// `skip_nulls` both treat empty string as equivalent to null.
pub fn is_null_or_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Natural ordering for primary-key comparison (§3 invariants). Returns
/// `None` when the two values are not of a mutually comparable type,
/// which the Merge-Walker surfaces as `TypeMismatchOnKey`.
pub fn compare_keys(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y),
        (Value::Decimal(x), Value::Decimal(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Datetime(x), Value::Datetime(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_null_sentinel() {
        assert_eq!(normalize(&Value::Null), Canonical::Null);
        assert_eq!(normalize(&Value::String(String::new())), Canonical::Null);
    }

    #[test]
    fn test_numeric_tolerance_suppresses_diff() {
        // Scenario A: Decimal("-265.23") vs -265.230000
        let src = Value::Decimal(Decimal::from_str("-265.23").unwrap());
        let dest = Value::Float(-265.230000);
        assert!(values_equal(&src, &dest));
    }

    #[test]
    fn test_numeric_tolerance_respects_bound() {
        let a = Value::Float(1.0);
        let b = Value::Float(1.0001);
        assert!(!values_equal(&a, &b));
    }

    #[test]
    fn test_date_vs_datetime_equal() {
        // Scenario B
        let src = Value::String("2020-10-04 00:00:00.0000000".to_string());
        let dest = Value::String("2020-10-04".to_string());
        assert!(values_equal(&src, &dest));
    }

    #[test]
    fn test_date_vs_datetime_differ() {
        let src = Value::String("2020-10-04".to_string());
        let dest = Value::String("2020-10-05".to_string());
        assert!(!values_equal(&src, &dest));
    }

    #[test]
    fn test_string_fallback_trims_whitespace() {
        let a = Value::String("  hello  ".to_string());
        let b = Value::String("hello".to_string());
        assert!(values_equal(&a, &b));
    }

    #[test]
    fn test_string_fallback_case_sensitive() {
        let a = Value::String("Hello".to_string());
        let b = Value::String("hello".to_string());
        assert!(!values_equal(&a, &b));
    }

    #[test]
    fn test_reflexivity() {
        let values = [
            Value::Null,
            Value::Int(5),
            Value::Float(1.5),
            Value::String("abc".to_string()),
            Value::Date(NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()),
        ];
        for v in &values {
            assert!(values_equal(v, v));
        }
    }

    #[test]
    fn test_compare_keys_type_mismatch() {
        let int_key = Value::Int(42);
        let str_key = Value::String("42".to_string());
        assert!(compare_keys(&int_key, &str_key).is_none());
    }

    #[test]
    fn test_compare_keys_natural_order() {
        assert_eq!(compare_keys(&Value::Int(1), &Value::Int(2)), Some(Ordering::Less));
        assert_eq!(
            compare_keys(&Value::String("a".into()), &Value::String("b".into())),
            Some(Ordering::Less)
        );
    }
}
