//! # Operand Coercion
//!
//! Turns JSON operand values into typed values the relational operators
//! can compare.
//!
//! ## Design
//!
//! - JSON-LD value objects `{"@value": v, "@type": t}` are unwrapped and
//!   `t` takes precedence over the constraint's `dataType`.
//! - `{"@id": iri}` nodes compare as their IRI text.
//! - A `dataType` whose local name is a numeric XSD type forces numeric
//!   parsing of string values; `dateTime`/`date` forces temporal parsing.
//! - Integers stay exact: JSON integers and integral numeric strings are
//!   held as `i128`, other numbers as `f64`. Mixed comparisons are exact
//!   whenever the float is integral and in range.
//! - Without a `dataType`, strings in RFC 3339 form are read as instants.
//!   With a temporal `dataType`, a dateTime lacking an offset is read as
//!   UTC.
//! - Coercion failures degrade to text and are logged at `trace`. The
//!   ordinal operators then refuse to compare and the constraint is
//!   `Indeterminate`.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// A numeric operand.
#[derive(Debug, Clone, Copy)]
pub enum Numeric {
    /// An integer, held exactly.
    Int(i128),
    /// Any other number.
    Float(f64),
}

impl Numeric {
    fn compare(&self, other: &Self) -> Option<Ordering> {
        match (*self, *other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Int(i), Self::Float(f)) => int_float_cmp(i, f),
            (Self::Float(f), Self::Int(i)) => int_float_cmp(i, f).map(Ordering::reverse),
        }
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.compare(other)
    }
}

/// Order `i` against `f` without rounding `i` through `f64`.
fn int_float_cmp(i: i128, f: f64) -> Option<Ordering> {
    if f.is_nan() {
        return None;
    }
    // i128::MIN as f64 is exactly -2^127; i128::MAX as f64 rounds up to 2^127.
    if !f.is_finite() || f < i128::MIN as f64 || f >= i128::MAX as f64 {
        return Some(if f > 0.0 { Ordering::Less } else { Ordering::Greater });
    }
    let floor = f.floor();
    let whole = floor as i128;
    match i.cmp(&whole) {
        Ordering::Equal if floor == f => Some(Ordering::Equal),
        Ordering::Equal | Ordering::Less => Some(Ordering::Less),
        Ordering::Greater => Some(Ordering::Greater),
    }
}

/// A coerced operand.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Any numeric type.
    Number(Numeric),
    /// An instant, normalized to UTC.
    DateTime(DateTime<Utc>),
    /// Strings and IRIs.
    Text(String),
    /// Booleans.
    Bool(bool),
    /// Arrays and `@list` nodes.
    List(Vec<TypedValue>),
    /// JSON `null`.
    Null,
    /// Any other JSON object, compared structurally.
    Json(Value),
}

/// Type family selected by a `dataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeHint {
    Numeric,
    Temporal,
    Boolean,
    Textual,
}

const NUMERIC_TYPES: &[&str] = &[
    "integer",
    "int",
    "long",
    "short",
    "byte",
    "decimal",
    "double",
    "float",
    "nonNegativeInteger",
    "nonPositiveInteger",
    "positiveInteger",
    "negativeInteger",
    "unsignedInt",
    "unsignedLong",
    "unsignedShort",
    "unsignedByte",
];

fn type_hint(data_type: &str) -> TypeHint {
    let local = data_type
        .rsplit(|c: char| c == '#' || c == ':' || c == '/')
        .next()
        .unwrap_or(data_type);
    if NUMERIC_TYPES.contains(&local) {
        TypeHint::Numeric
    } else if matches!(local, "dateTime" | "dateTimeStamp" | "date") {
        TypeHint::Temporal
    } else if local == "boolean" {
        TypeHint::Boolean
    } else {
        TypeHint::Textual
    }
}

impl TypedValue {
    /// Coerce `value` under an optional `dataType`.
    pub fn coerce(value: &Value, data_type: Option<&str>) -> Self {
        match value {
            Value::Object(obj) => {
                if let Some(inner) = obj.get("@value") {
                    let dt = obj.get("@type").and_then(Value::as_str).or(data_type);
                    return Self::coerce(inner, dt);
                }
                if let Some(Value::String(iri)) = obj.get("@id") {
                    return Self::Text(iri.clone());
                }
                if let Some(Value::Array(items)) = obj.get("@list") {
                    return Self::List(items.iter().map(|v| Self::coerce(v, data_type)).collect());
                }
                Self::Json(value.clone())
            }
            Value::Array(items) => {
                Self::List(items.iter().map(|v| Self::coerce(v, data_type)).collect())
            }
            Value::String(s) => Self::coerce_str(s, data_type.map(type_hint)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Number(Numeric::Int(i.into()))
                } else if let Some(u) = n.as_u64() {
                    Self::Number(Numeric::Int(u.into()))
                } else {
                    match n.as_f64() {
                        Some(f) => Self::Number(Numeric::Float(f)),
                        None => Self::Json(value.clone()),
                    }
                }
            }
            Value::Bool(b) => Self::Bool(*b),
            Value::Null => Self::Null,
        }
    }

    fn coerce_str(s: &str, hint: Option<TypeHint>) -> Self {
        match hint {
            Some(TypeHint::Numeric) => match parse_number(s.trim()) {
                Some(n) => Self::Number(n),
                None => {
                    tracing::trace!(value = s, "not a number; comparing as text");
                    Self::Text(s.to_string())
                }
            },
            Some(TypeHint::Temporal) => match parse_instant(s) {
                Some(dt) => Self::DateTime(dt),
                None => {
                    tracing::trace!(value = s, "not a dateTime; comparing as text");
                    Self::Text(s.to_string())
                }
            },
            Some(TypeHint::Boolean) => match s {
                "true" | "1" => Self::Bool(true),
                "false" | "0" => Self::Bool(false),
                _ => Self::Text(s.to_string()),
            },
            Some(TypeHint::Textual) => Self::Text(s.to_string()),
            None => match DateTime::parse_from_rfc3339(s) {
                Ok(dt) => Self::DateTime(dt.with_timezone(&Utc)),
                Err(_) => Self::Text(s.to_string()),
            },
        }
    }

    /// Members when treated as a set: lists yield their items, scalars
    /// yield themselves.
    pub fn members(&self) -> &[TypedValue] {
        match self {
            Self::List(items) => items,
            other => std::slice::from_ref(other),
        }
    }

    /// Equality across coerced values. Values of different kinds are
    /// unequal.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::List(a), Self::List(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
            }
            (a, b) => a == b,
        }
    }

    /// Ordering for the ordinal operators. `None` when the two values are
    /// not both numbers or both instants.
    pub fn ordinal_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.compare(b),
            (Self::DateTime(a), Self::DateTime(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

fn parse_number(s: &str) -> Option<Numeric> {
    if let Ok(i) = s.strip_prefix('+').unwrap_or(s).parse::<i128>() {
        return Some(Numeric::Int(i));
    }
    s.parse::<f64>().ok().map(Numeric::Float)
}

/// RFC 3339 instant, an offset-less `xsd:dateTime` taken as UTC, or an
/// `xsd:date` at midnight UTC.
fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_from_json_and_typed_strings() {
        assert_eq!(TypedValue::coerce(&json!(5), None), TypedValue::Number(Numeric::Int(5)));
        assert_eq!(
            TypedValue::coerce(&json!("10.50"), Some("xsd:decimal")),
            TypedValue::Number(Numeric::Float(10.5))
        );
        assert_eq!(
            TypedValue::coerce(
                &json!("7"),
                Some("http://www.w3.org/2001/XMLSchema#integer")
            ),
            TypedValue::Number(Numeric::Int(7))
        );
    }

    #[test]
    fn integers_beyond_f64_precision_stay_distinct() {
        let a = TypedValue::coerce(&json!(9_007_199_254_740_992_u64), None);
        let b = TypedValue::coerce(&json!(9_007_199_254_740_993_u64), None);
        assert!(!a.same_as(&b));
        assert_eq!(a.ordinal_cmp(&b), Some(Ordering::Less));

        let typed = TypedValue::coerce(&json!("9007199254740993"), Some("xsd:integer"));
        assert!(typed.same_as(&b));
        let big = TypedValue::coerce(&json!(u64::MAX), None);
        assert_eq!(big, TypedValue::Number(Numeric::Int(u64::MAX.into())));
    }

    #[test]
    fn mixed_integer_and_float_compare_by_value() {
        let five = TypedValue::Number(Numeric::Int(5));
        assert!(five.same_as(&TypedValue::Number(Numeric::Float(5.0))));
        assert_eq!(
            five.ordinal_cmp(&TypedValue::Number(Numeric::Float(5.5))),
            Some(Ordering::Less)
        );
        assert_eq!(
            TypedValue::Number(Numeric::Float(4.5)).ordinal_cmp(&five),
            Some(Ordering::Less)
        );
        let minus_three = TypedValue::Number(Numeric::Int(-3));
        assert_eq!(
            minus_three.ordinal_cmp(&TypedValue::Number(Numeric::Float(-3.5))),
            Some(Ordering::Greater)
        );
        let exact = TypedValue::Number(Numeric::Int(9_007_199_254_740_993));
        assert!(!exact.same_as(&TypedValue::Number(Numeric::Float(9_007_199_254_740_992.0))));
        assert_eq!(
            exact.ordinal_cmp(&TypedValue::Number(Numeric::Float(f64::INFINITY))),
            Some(Ordering::Less)
        );
        assert_eq!(five.ordinal_cmp(&TypedValue::Number(Numeric::Float(f64::NAN))), None);
    }

    #[test]
    fn offsetless_datetime_is_utc() {
        assert_eq!(
            TypedValue::coerce(&json!("2025-01-01T00:00:00"), Some("xsd:dateTime")),
            TypedValue::DateTime(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(
            TypedValue::coerce(&json!("2025-01-01T06:30:00.250"), Some("xsd:dateTime")),
            TypedValue::DateTime(
                Utc.with_ymd_and_hms(2025, 1, 1, 6, 30, 0).unwrap()
                    + chrono::Duration::milliseconds(250)
            )
        );
    }

    #[test]
    fn json_ld_value_object_type_wins() {
        let v = json!({"@value": "2026-03-01", "@type": "xsd:date"});
        assert_eq!(
            TypedValue::coerce(&v, Some("xsd:string")),
            TypedValue::DateTime(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn untyped_rfc3339_is_instant() {
        let v = TypedValue::coerce(&json!("2026-01-01T10:00:00+02:00"), None);
        assert_eq!(
            v,
            TypedValue::DateTime(Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(
            TypedValue::coerce(&json!("hello"), None),
            TypedValue::Text("hello".into())
        );
    }

    #[test]
    fn id_nodes_are_text() {
        assert_eq!(
            TypedValue::coerce(&json!({"@id": "http://example.com/eu"}), None),
            TypedValue::Text("http://example.com/eu".into())
        );
    }

    #[test]
    fn bad_numeric_degrades_to_text() {
        assert_eq!(
            TypedValue::coerce(&json!("lots"), Some("xsd:integer")),
            TypedValue::Text("lots".into())
        );
    }

    #[test]
    fn ordinal_requires_matching_kinds() {
        let n = TypedValue::Number(Numeric::Int(1));
        let t = TypedValue::Text("1".into());
        assert_eq!(n.ordinal_cmp(&TypedValue::Number(Numeric::Float(2.0))), Some(Ordering::Less));
        assert_eq!(n.ordinal_cmp(&t), None);
        assert!(!n.same_as(&t));
    }

    #[test]
    fn members_of_scalar_and_list() {
        assert_eq!(TypedValue::Number(Numeric::Int(1)).members().len(), 1);
        let list = TypedValue::coerce(&json!({"@list": ["a", "b"]}), None);
        assert_eq!(list.members().len(), 2);
    }
}
