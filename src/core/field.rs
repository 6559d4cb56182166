//! Field value types used by generic filtering and sorting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

/// A polymorphic field value that can hold different types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FieldValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    Null,
}

impl FieldValue {
    /// Get the value as a string if possible
    pub fn as_string(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as an integer if possible
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Check if the value is null
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Convert a JSON filter operand into a field value.
    ///
    /// Strings stay strings: whether `"2024-03-01T10:00:00Z"` is a timestamp
    /// or plain text depends on the field it is compared with (see
    /// [`compare`](Self::compare)). Arrays and objects are not valid operands.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(FieldValue::Null),
            Value::Bool(b) => Some(FieldValue::Boolean(*b)),
            Value::Number(n) => n
                .as_i64()
                .map(FieldValue::Integer)
                .or_else(|| n.as_f64().map(FieldValue::Float)),
            Value::String(s) => Some(FieldValue::String(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }

    /// Compare two values of compatible types.
    ///
    /// Integers and floats compare numerically; `Null` sorts before every
    /// other value. A string compared with a UUID or timestamp is read in
    /// that format, and yields `None` when it does not parse. Other
    /// incompatible variants yield `None`.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Null, _) => Some(Ordering::Less),
            (_, Null) => Some(Ordering::Greater),
            (String(a), String(b)) => Some(a.cmp(b)),
            (Integer(a), Integer(b)) => Some(a.cmp(b)),
            (Float(a), Float(b)) => a.partial_cmp(b),
            (Integer(a), Float(b)) => (*a as f64).partial_cmp(b),
            (Float(a), Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Boolean(a), Boolean(b)) => Some(a.cmp(b)),
            (Uuid(a), Uuid(b)) => Some(a.cmp(b)),
            (DateTime(a), DateTime(b)) => Some(a.cmp(b)),
            (String(s), Uuid(u)) => text_as_uuid(s).map(|parsed| parsed.cmp(u)),
            (Uuid(u), String(s)) => text_as_uuid(s).map(|parsed| u.cmp(&parsed)),
            (String(s), DateTime(t)) => text_as_timestamp(s).map(|parsed| parsed.cmp(t)),
            (DateTime(t), String(s)) => text_as_timestamp(s).map(|parsed| t.cmp(&parsed)),
            _ => None,
        }
    }
}

fn text_as_uuid(text: &str) -> Option<Uuid> {
    Uuid::parse_str(text).ok()
}

fn text_as_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}
