use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use derive_more::Display;
use itertools::Itertools;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// A single dynamically typed field value.  Serialises to and from the
/// matching plain JSON shape.  Timestamps travel as [Value::Str] and are
/// parsed on demand by the operators that need them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

/// The shape of a [Value], used in schema errors.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    #[display("integer")]
    Int,
    #[display("float")]
    Float,
    #[display("string")]
    Str,
    #[display("list")]
    List,
}

impl ValueKind {
    fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Int | ValueKind::Float)
    }

    /// Ints and floats share a field; everything else must match exactly.
    pub(crate) fn accepts(self, other: ValueKind) -> bool {
        self == other || (self.is_numeric() && other.is_numeric())
    }

    fn rank(self) -> u8 {
        match self {
            ValueKind::Int | ValueKind::Float => 0,
            ValueKind::Str => 1,
            ValueKind::List => 2,
        }
    }
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Str(_) => ValueKind::Str,
            Value::List(_) => ValueKind::List,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric addition with int/float promotion.  None for non numbers.
    pub(crate) fn try_add(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a + b)),
            (a, b) => Some(Value::Float(a.as_f64()? + b.as_f64()?)),
        }
    }

    /// Numeric multiplication with int/float promotion.  None for non numbers.
    pub(crate) fn try_mul(&self, other: &Value) -> Option<Value> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(Value::Int(a * b)),
            (a, b) => Some(Value::Float(a.as_f64()? * b.as_f64()?)),
        }
    }

    /// Total order used by sort keys and group keys.  Ints and floats
    /// compare numerically; remaining cross-kind pairs order by kind so
    /// the relation stays total, although mixed kinds under one sort
    /// field are rejected upstream.
    pub(crate) fn cmp_total(&self, other: &Value) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.cmp_total(y) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                a.len().cmp(&b.len())
            }
            (a, b) if a.kind().is_numeric() && b.kind().is_numeric() => {
                OrderedFloat(a.as_f64().unwrap()).cmp(&OrderedFloat(b.as_f64().unwrap()))
            }
            (a, b) => a.kind().rank().cmp(&b.kind().rank()),
        }
    }
}

// Numeric equality follows cmp_total so 50 == 50.0, matching the
// grouping and ordering semantics.
impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.cmp_total(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(v: i64) -> Value {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Value {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Value {
        Value::List(v)
    }
}

/// A dynamic record: finite mapping from field name to [Value].  Field
/// sets differ row to row and absence of a field is meaningful.  The
/// map is ordered so spills, debug output and tests are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Row {
        Row::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// The value at `field`, or a [FlowError::MissingField].
    pub fn field(&self, field: &str) -> Result<&Value> {
        self.fields.get(field).ok_or_else(|| FlowError::MissingField {
            field: field.to_string(),
        })
    }

    pub fn str_field(&self, field: &str) -> Result<&str> {
        match self.field(field)? {
            Value::Str(s) => Ok(s),
            other => Err(self.kind_error(field, ValueKind::Str, other)),
        }
    }

    pub fn num_field(&self, field: &str) -> Result<f64> {
        let value = self.field(field)?;
        value
            .as_f64()
            .ok_or_else(|| self.kind_error(field, ValueKind::Float, value))
    }

    pub fn int_field(&self, field: &str) -> Result<i64> {
        match self.field(field)? {
            Value::Int(i) => Ok(*i),
            other => Err(self.kind_error(field, ValueKind::Int, other)),
        }
    }

    pub fn list_field(&self, field: &str) -> Result<&[Value]> {
        match self.field(field)? {
            Value::List(items) => Ok(items),
            other => Err(self.kind_error(field, ValueKind::List, other)),
        }
    }

    fn kind_error(&self, field: &str, expected: ValueKind, found: &Value) -> FlowError {
        FlowError::FieldKind {
            field: field.to_string(),
            expected,
            found: found.kind(),
        }
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Row {
        Row {
            fields: iter.into_iter().collect(),
        }
    }
}

impl TryFrom<serde_json::Value> for Row {
    type Error = serde_json::Error;

    fn try_from(value: serde_json::Value) -> std::result::Result<Row, serde_json::Error> {
        serde_json::from_value(value)
    }
}

/// The values of one row at a key tuple, in tuple order.  Ordered
/// lexicographically with [Value::cmp_total] per field.
#[derive(Debug, Clone)]
pub struct Key(Vec<Value>);

impl Key {
    pub(crate) fn values(&self) -> &[Value] {
        &self.0
    }

    pub(crate) fn into_values(self) -> Vec<Value> {
        self.0
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Key) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Key) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Key) -> Ordering {
        for (a, b) in self.0.iter().zip(other.0.iter()) {
            match a.cmp_total(b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        self.0.len().cmp(&other.0.len())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.iter().map(|v| format!("{v:?}")).join(", "))
    }
}

/// Derive the group key of `row` under the key tuple `keys`.
pub(crate) fn key_of(row: &Row, keys: &[String]) -> Result<Key> {
    keys.iter()
        .map(|k| row.field(k).cloned())
        .collect::<Result<Vec<Value>>>()
        .map(Key)
}
