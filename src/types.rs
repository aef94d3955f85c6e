//! Core type definitions for the session ledger

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a stored row
///
/// Generated ids are the lowercase hex rendering of a random 128-bit value.
/// Caller-supplied ids are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        RowId(id.into())
    }

    /// Fresh random id
    pub fn generate() -> Self {
        RowId(format!("{:032x}", rand::random::<u128>()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(id: &str) -> Self {
        RowId(id.to_string())
    }
}

impl From<String> for RowId {
    fn from(id: String) -> Self {
        RowId(id)
    }
}

/// Field values (heterogeneous, JSON-shaped)
///
/// Declared fields are stored in canonical form: `Number` for NUMBER,
/// `Text` (`YYYY-MM-DD`) for DATE, `Text` for TEXT, `List` for LIST.
/// Undeclared keys keep whatever shape the caller sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// `false` if the value holds a NaN or infinite number at any depth
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Number(v) => v.is_finite(),
            FieldValue::List(items) => items.iter().all(FieldValue::is_finite),
            FieldValue::Object(map) => map.values().all(FieldValue::is_finite),
            _ => true,
        }
    }

    /// Get type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "Null",
            FieldValue::Bool(_) => "Boolean",
            FieldValue::Number(_) => "Number",
            FieldValue::Text(_) => "Text",
            FieldValue::List(_) => "List",
            FieldValue::Object(_) => "Object",
        }
    }

    /// Ordering between two values of the same scalar kind
    ///
    /// Numbers compare numerically, text lexicographically (which orders
    /// canonical dates chronologically). Anything else is unordered.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Number(a), FieldValue::Number(b)) => a.partial_cmp(b),
            (FieldValue::Text(a), FieldValue::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Bool(b) => write!(f, "{}", b),
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(s) => write!(f, "'{}'", s),
            FieldValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            FieldValue::Object(map) => {
                write!(f, "{{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", key, value)?;
                }
                write!(f, "}}")
            }
        }
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Number(v)
    }
}

/// Values are stored as `f64`, so integers beyond 2^53 lose precision.
/// Amounts never get near that range.
impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Number(v as f64)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::Number(f64::from(v))
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<NaiveDate> for FieldValue {
    fn from(v: NaiveDate) -> Self {
        FieldValue::Text(v.format("%Y-%m-%d").to_string())
    }
}

// Time of day is dropped; only the calendar date is recorded.
impl From<NaiveDateTime> for FieldValue {
    fn from(v: NaiveDateTime) -> Self {
        FieldValue::from(v.date())
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        FieldValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(FieldValue::Null, Into::into)
    }
}

/// Values map (one row's columns)
pub type Values = BTreeMap<String, FieldValue>;

/// Rows of one table keyed by id
pub type Rows = BTreeMap<RowId, Values>;

/// Build a [`Values`] map from `key => value` pairs
///
/// ```
/// use ledger_core::values;
/// let row = values! { "Net Earn" => 120, "Tags" => "home,cash" };
/// assert_eq!(row.len(), 2);
/// ```
#[macro_export]
macro_rules! values {
    () => {
        $crate::types::Values::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut values = $crate::types::Values::new();
        $(
            values.insert(
                ::std::string::String::from($key),
                $crate::types::FieldValue::from($value),
            );
        )+
        values
    }};
}
