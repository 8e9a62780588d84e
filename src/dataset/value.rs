//! Dynamically typed entries stored in dataset sections.

use crate::error::{AppResult, DaqError};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fmt;

/// A section of a dataset record: unique string keys mapped to values.
///
/// Ordering is irrelevant to the data model; a `BTreeMap` keeps iteration (and therefore
/// serialization and validation order) deterministic.
pub type Section = BTreeMap<String, Value>;

/// A single entry of a [`Section`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Integer scalar (channel indices, clock ticks, flags).
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// Text scalar.
    Text(String),
    /// One-dimensional integer array.
    Ints(Vec<i64>),
    /// One-dimensional float array.
    Floats(Vec<f64>),
    /// Two-dimensional float array, row-major.
    Matrix(Array2<f64>),
}

impl Value {
    /// Short type name used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Ints(_) => "int array",
            Value::Floats(_) => "float array",
            Value::Matrix(_) => "matrix",
        }
    }

    /// Numeric scalar as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer scalar. Floats are accepted only when they carry no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Float(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            _ => None,
        }
    }

    /// Text scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Any numeric scalar or 1-D array as a float sequence.
    ///
    /// Scalars are accepted because single-element arrays are unwrapped on reload.
    pub fn to_float_vec(&self) -> Option<Vec<f64>> {
        match self {
            Value::Int(v) => Some(vec![*v as f64]),
            Value::Float(v) => Some(vec![*v]),
            Value::Ints(v) => Some(v.iter().map(|x| *x as f64).collect()),
            Value::Floats(v) => Some(v.clone()),
            Value::Text(_) | Value::Matrix(_) => None,
        }
    }

    /// Any integer scalar or integer array as an integer sequence.
    pub fn to_int_vec(&self) -> Option<Vec<i64>> {
        match self {
            Value::Int(v) => Some(vec![*v]),
            Value::Ints(v) => Some(v.clone()),
            Value::Float(_) | Value::Floats(_) => self
                .to_float_vec()?
                .into_iter()
                .map(|x| Value::Float(x).as_i64())
                .collect(),
            Value::Text(_) | Value::Matrix(_) => None,
        }
    }

    /// Borrow a 2-D array.
    pub fn as_matrix(&self) -> Option<&Array2<f64>> {
        match self {
            Value::Matrix(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s}"),
            Value::Ints(v) => write!(f, "{v:?}"),
            Value::Floats(v) => write!(f, "{v:?}"),
            Value::Matrix(m) => write!(f, "matrix{:?}", m.shape()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<i64>> for Value {
    fn from(v: Vec<i64>) -> Self {
        Value::Ints(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::Floats(v)
    }
}

impl From<Array2<f64>> for Value {
    fn from(v: Array2<f64>) -> Self {
        Value::Matrix(v)
    }
}

/// Fetch a required text entry from a section.
pub(crate) fn require_text(section: &Section, key: &str) -> AppResult<String> {
    match section.get(key) {
        Some(Value::Text(s)) => Ok(s.clone()),
        Some(other) => Err(DaqError::configuration(
            key,
            format!("expected text, found {}", other.kind()),
        )),
        None => Err(DaqError::configuration(key, "missing")),
    }
}

/// Fetch a required numeric sequence from a section.
pub(crate) fn require_floats(section: &Section, key: &str) -> AppResult<Vec<f64>> {
    let value = section
        .get(key)
        .ok_or_else(|| DaqError::configuration(key, "missing"))?;
    value.to_float_vec().ok_or_else(|| {
        DaqError::configuration(key, format!("expected numbers, found {}", value.kind()))
    })
}
