//! Scalar attribute values.

use std::cmp::Ordering;

use chrono::{DateTime, FixedOffset};
use serde_json::{Number, Value};

use crate::common::{datetime_to_str, str_to_datetime, GatewayError, GatewayResult};

/// Declared type of a scalar attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    Bool,
    Int,
    Float,
    Str,
    Date,
}

impl AttrKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttrKind::Bool => "boolean",
            AttrKind::Int => "integer",
            AttrKind::Float => "number",
            AttrKind::Str => "string",
            AttrKind::Date => "date",
        }
    }
}

/// A scalar attribute value as held by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(DateTime<FixedOffset>),
}

impl AttrValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttrValue::Null)
    }

    pub fn is_date(&self) -> bool {
        matches!(self, AttrValue::Date(_))
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Convert to a JSON value; dates become canonical strings
    pub fn to_json(&self) -> Value {
        match self {
            AttrValue::Null => Value::Null,
            AttrValue::Bool(b) => Value::Bool(*b),
            AttrValue::Int(i) => Value::Number((*i).into()),
            AttrValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
            AttrValue::Str(s) => Value::String(s.clone()),
            AttrValue::Date(d) => Value::String(datetime_to_str(d)),
        }
    }

    /// Convert caller JSON into a value of the declared kind
    ///
    /// Date strings must use the canonical format.
    pub fn from_json(value: &Value, kind: AttrKind) -> GatewayResult<Self> {
        if value.is_null() {
            return Ok(AttrValue::Null);
        }

        let converted = match (kind, value) {
            (AttrKind::Bool, Value::Bool(b)) => Some(AttrValue::Bool(*b)),
            (AttrKind::Int, Value::Number(n)) => n.as_i64().map(AttrValue::Int),
            (AttrKind::Float, Value::Number(n)) => n.as_f64().map(AttrValue::Float),
            (AttrKind::Str, Value::String(s)) => Some(AttrValue::Str(s.clone())),
            (AttrKind::Date, Value::String(s)) => Some(AttrValue::Date(str_to_datetime(s)?)),
            _ => None,
        };

        converted.ok_or_else(|| {
            GatewayError::bad_request(format!(
                "Bad request made, expected a value of type {} but got {}",
                kind.as_str(),
                value
            ))
        })
    }

    /// Compare against a JSON operand
    ///
    /// Returns `None` when the two are not comparable. Date attributes compare
    /// against canonical date strings.
    pub fn compare_json(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (AttrValue::Null, Value::Null) => Some(Ordering::Equal),
            (AttrValue::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (AttrValue::Int(a), Value::Number(b)) => (*a as f64).partial_cmp(&b.as_f64()?),
            (AttrValue::Float(a), Value::Number(b)) => a.partial_cmp(&b.as_f64()?),
            (AttrValue::Str(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
            (AttrValue::Date(a), Value::String(b)) => {
                let b = str_to_datetime(b).ok()?;
                Some(a.naive_local().cmp(&b.naive_local()))
            }
            _ => None,
        }
    }

    /// Total ordering used for sorting result sets (nulls first)
    pub fn sort_cmp(&self, other: &AttrValue) -> Ordering {
        fn rank(v: &AttrValue) -> u8 {
            match v {
                AttrValue::Null => 0,
                AttrValue::Bool(_) => 1,
                AttrValue::Int(_) | AttrValue::Float(_) => 2,
                AttrValue::Str(_) => 3,
                AttrValue::Date(_) => 4,
            }
        }

        match (self, other) {
            (AttrValue::Bool(a), AttrValue::Bool(b)) => a.cmp(b),
            (AttrValue::Int(a), AttrValue::Int(b)) => a.cmp(b),
            (AttrValue::Int(a), AttrValue::Float(b)) => {
                (*a as f64).partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (AttrValue::Float(a), AttrValue::Int(b)) => {
                a.partial_cmp(&(*b as f64)).unwrap_or(Ordering::Equal)
            }
            (AttrValue::Float(a), AttrValue::Float(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (AttrValue::Str(a), AttrValue::Str(b)) => a.cmp(b),
            (AttrValue::Date(a), AttrValue::Date(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    /// Text form used for pattern matching
    pub fn as_text(&self) -> Option<String> {
        match self {
            AttrValue::Str(s) => Some(s.clone()),
            AttrValue::Date(d) => Some(datetime_to_str(d)),
            AttrValue::Int(i) => Some(i.to_string()),
            AttrValue::Float(f) => Some(f.to_string()),
            AttrValue::Bool(_) | AttrValue::Null => None,
        }
    }
}
