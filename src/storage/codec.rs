//! Type normalization between in-memory sections and stored arrays.
//!
//! Every entry is stored as an array:
//!
//! | In memory | Stored |
//! |---|---|
//! | text | length-1 byte-string array |
//! | integer scalar / integer array | integer array |
//! | anything else | float array with its shape |
//!
//! On read, length-1 arrays are unwrapped back to scalars, except for the qubit set,
//! which always stays a sequence.

use crate::dataset::identity::KEY_QUBIT_SET;
use crate::dataset::value::{Section, Value};
use crate::error::{AppResult, DaqError};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// `identity`
pub const GROUP_IDENTITY: &str = "identity";
/// `hardware_map`
pub const GROUP_HARDWARE_MAP: &str = "hardware_map";
/// `board_config`
pub const GROUP_BOARD_CONFIG: &str = "board_config";
/// `measurement_config`
pub const GROUP_MEASUREMENT_CONFIG: &str = "measurement_config";
/// `measurement_data`
pub const GROUP_MEASUREMENT_DATA: &str = "measurement_data";

/// The five top-level groups of a stored record.
pub const GROUP_NAMES: [&str; 5] = [
    GROUP_IDENTITY,
    GROUP_HARDWARE_MAP,
    GROUP_BOARD_CONFIG,
    GROUP_MEASUREMENT_CONFIG,
    GROUP_MEASUREMENT_DATA,
];

/// One stored entry: element type, shape and row-major data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", rename_all = "lowercase")]
pub enum StoredArray {
    Bytes { shape: Vec<usize>, data: Vec<String> },
    Int { shape: Vec<usize>, data: Vec<i64> },
    Float { shape: Vec<usize>, data: Vec<f64> },
}

impl StoredArray {
    /// Declared shape.
    pub fn shape(&self) -> &[usize] {
        match self {
            StoredArray::Bytes { shape, .. }
            | StoredArray::Int { shape, .. }
            | StoredArray::Float { shape, .. } => shape,
        }
    }

    fn len(&self) -> usize {
        match self {
            StoredArray::Bytes { data, .. } => data.len(),
            StoredArray::Int { data, .. } => data.len(),
            StoredArray::Float { data, .. } => data.len(),
        }
    }
}

/// Entries of one group, by key.
pub type StoredGroup = BTreeMap<String, StoredArray>;

/// A whole stored record, by group name.
pub type StoredDocument = BTreeMap<String, StoredGroup>;

/// Encode a single value.
pub fn encode_value(value: &Value) -> StoredArray {
    match value {
        Value::Text(s) => StoredArray::Bytes {
            shape: vec![1],
            data: vec![s.clone()],
        },
        Value::Int(v) => StoredArray::Int {
            shape: vec![1],
            data: vec![*v],
        },
        Value::Ints(v) => StoredArray::Int {
            shape: vec![v.len()],
            data: v.clone(),
        },
        Value::Float(v) => StoredArray::Float {
            shape: vec![1],
            data: vec![*v],
        },
        Value::Floats(v) => StoredArray::Float {
            shape: vec![v.len()],
            data: v.clone(),
        },
        Value::Matrix(m) => StoredArray::Float {
            shape: m.shape().to_vec(),
            data: m.iter().copied().collect(),
        },
    }
}

/// Decode a single stored entry. `key` decides whether length-1 arrays are unwrapped.
pub fn decode_value(key: &str, array: &StoredArray) -> AppResult<Value> {
    let shape = array.shape();
    let expected: usize = shape.iter().product();
    if expected != array.len() {
        return Err(DaqError::Storage(format!(
            "entry '{key}' has shape {shape:?} but {} elements",
            array.len()
        )));
    }
    let unwrap = key != KEY_QUBIT_SET && shape.len() <= 1 && array.len() == 1;

    match array {
        StoredArray::Bytes { data, .. } => match data.as_slice() {
            [s] => Ok(Value::Text(s.clone())),
            _ => Err(DaqError::Storage(format!(
                "entry '{key}' holds {} strings, expected one",
                data.len()
            ))),
        },
        StoredArray::Int { data, .. } => match shape.len() {
            0 | 1 if unwrap => Ok(Value::Int(data[0])),
            0 | 1 => Ok(Value::Ints(data.clone())),
            _ => Err(DaqError::Storage(format!(
                "entry '{key}' is a {}-D integer array",
                shape.len()
            ))),
        },
        StoredArray::Float { data, .. } => match shape.len() {
            0 | 1 if unwrap => Ok(Value::Float(data[0])),
            0 | 1 => Ok(Value::Floats(data.clone())),
            2 => Array2::from_shape_vec((shape[0], shape[1]), data.clone())
                .map(Value::Matrix)
                .map_err(|e| DaqError::Storage(format!("entry '{key}': {e}"))),
            n => Err(DaqError::Storage(format!("entry '{key}' is a {n}-D array"))),
        },
    }
}

/// Encode every entry of a section.
pub fn encode_section(section: &Section) -> StoredGroup {
    section
        .iter()
        .map(|(key, value)| (key.clone(), encode_value(value)))
        .collect()
}

/// Decode a stored group back into a section.
pub fn decode_group(group: &StoredGroup) -> AppResult<Section> {
    group
        .iter()
        .map(|(key, array)| Ok((key.clone(), decode_value(key, array)?)))
        .collect()
}
