//! Run identity: series, device, qubit set and measurement type.

use super::value::{require_text, Section, Value};
use crate::error::{AppResult, DaqError};
use chrono::{Local, NaiveDateTime};
use std::fmt;

/// `series`
pub const KEY_SERIES: &str = "series";
/// `device`
pub const KEY_DEVICE: &str = "device";
/// `qubit_set`
pub const KEY_QUBIT_SET: &str = "qubit_set";
/// `measurement_type`
pub const KEY_MEASUREMENT_TYPE: &str = "measurement_type";
/// `sweep_type`
pub const KEY_SWEEP_TYPE: &str = "sweep_type";

/// `YYYYMMDD_HHMMSS`
const SERIES_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Dimensionality of an acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SweepType {
    /// One swept axis.
    OneD,
    /// Two swept axes.
    TwoD,
}

impl SweepType {
    /// Number of axes.
    pub fn axes(&self) -> usize {
        match self {
            SweepType::OneD => 1,
            SweepType::TwoD => 2,
        }
    }

    /// `"1D"` or `"2D"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepType::OneD => "1D",
            SweepType::TwoD => "2D",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "1D" => Some(SweepType::OneD),
            "2D" => Some(SweepType::TwoD),
            _ => None,
        }
    }
}

impl fmt::Display for SweepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity section of a dataset record.
///
/// `series` is fixed at construction and is the join key used on reload; there is no
/// setter for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    series: String,
    /// Device under test.
    pub device: String,
    /// Qubit (channel) indices involved in the measurement.
    pub qubits: Vec<i64>,
    /// Measurement type tag, also used in the output filename.
    pub measurement_type: String,
    /// Set once an acquisition has completed.
    pub sweep_type: Option<SweepType>,
}

impl Identity {
    /// Identity with a freshly generated, timestamp-derived series.
    pub fn generate() -> Self {
        Self::with_series(Local::now().format(SERIES_FORMAT).to_string())
    }

    /// Identity with an explicitly supplied series (used when reloading).
    pub fn with_series(series: impl Into<String>) -> Self {
        Self {
            series: series.into(),
            device: String::new(),
            qubits: Vec::new(),
            measurement_type: String::new(),
            sweep_type: None,
        }
    }

    /// Series string.
    pub fn series(&self) -> &str {
        &self.series
    }

    /// Flatten into a storable section.
    pub fn to_section(&self) -> Section {
        let mut section = Section::new();
        section.insert(KEY_SERIES.into(), Value::Text(self.series.clone()));
        if !self.device.is_empty() {
            section.insert(KEY_DEVICE.into(), Value::Text(self.device.clone()));
        }
        section.insert(KEY_QUBIT_SET.into(), Value::Ints(self.qubits.clone()));
        if !self.measurement_type.is_empty() {
            section.insert(
                KEY_MEASUREMENT_TYPE.into(),
                Value::Text(self.measurement_type.clone()),
            );
        }
        if let Some(sweep_type) = self.sweep_type {
            section.insert(KEY_SWEEP_TYPE.into(), Value::Text(sweep_type.to_string()));
        }
        section
    }

    /// Rebuild from a stored section. Absent optional fields stay empty.
    pub fn from_section(section: &Section) -> AppResult<Self> {
        let mut identity = Self::with_series(require_text(section, KEY_SERIES)?);
        if section.contains_key(KEY_DEVICE) {
            identity.device = require_text(section, KEY_DEVICE)?;
        }
        if section.contains_key(KEY_MEASUREMENT_TYPE) {
            identity.measurement_type = require_text(section, KEY_MEASUREMENT_TYPE)?;
        }
        if let Some(value) = section.get(KEY_QUBIT_SET) {
            identity.qubits = value.to_int_vec().ok_or_else(|| {
                DaqError::configuration(KEY_QUBIT_SET, "expected integer channel indices")
            })?;
        }
        if section.contains_key(KEY_SWEEP_TYPE) {
            let raw = require_text(section, KEY_SWEEP_TYPE)?;
            identity.sweep_type = Some(SweepType::parse(&raw).ok_or_else(|| {
                DaqError::configuration(KEY_SWEEP_TYPE, format!("unknown sweep type '{raw}'"))
            })?);
        }
        Ok(identity)
    }
}

/// True if `series` follows the generated `YYYYMMDD_HHMMSS` form.
pub fn is_timestamp_series(series: &str) -> bool {
    NaiveDateTime::parse_from_str(series, SERIES_FORMAT).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_series_is_timestamp_derived() {
        let identity = Identity::generate();
        assert!(is_timestamp_series(identity.series()));
        assert!(!is_timestamp_series("run-42"));
    }

    #[test]
    fn section_round_trip() {
        let mut identity = Identity::with_series("20240501_120000");
        identity.device = "sil".into();
        identity.qubits = vec![1, 3];
        identity.measurement_type = "res_spec".into();
        identity.sweep_type = Some(SweepType::TwoD);

        let back = Identity::from_section(&identity.to_section()).unwrap();
        assert_eq!(back, identity);
    }

    #[test]
    fn single_qubit_survives_unwrapping() {
        let mut section = Section::new();
        section.insert(KEY_SERIES.into(), Value::from("s"));
        section.insert(KEY_QUBIT_SET.into(), Value::Int(9));
        let identity = Identity::from_section(&section).unwrap();
        assert_eq!(identity.qubits, vec![9]);
    }

    #[test]
    fn missing_series_is_rejected() {
        let err = Identity::from_section(&Section::new()).unwrap_err();
        assert_eq!(err.offending_field(), Some(KEY_SERIES));
    }
}
