//! Measurement configuration section.

use super::value::{Section, Value};
use crate::error::{AppResult, DaqError};
use crate::units::TimeParameter;
use std::collections::BTreeMap;

/// A time parameter in exactly one of its two unit forms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeValue {
    /// Microseconds, not yet converted. Stored under `<name>_us`.
    HumanTime(f64),
    /// Device clock ticks. Stored under `<name>`.
    DeviceTicks(i64),
}

/// Scalar measurement parameters (pulse shapes, gains, lengths, delays).
///
/// Time parameters are kept apart from free-form parameters and keyed by
/// [`TimeParameter`], so a quantity can never be present in both unit forms at once.
/// The string-keyed API maps `<name>_us` and `<name>` onto the same slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementConfig {
    times: BTreeMap<TimeParameter, TimeValue>,
    params: Section,
}

impl MeasurementConfig {
    /// New, empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter by key.
    ///
    /// `<time>_us` keys must be numeric; bare `<time>` keys must be integral ticks.
    /// Inserting either form of a time parameter replaces the other.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> AppResult<()> {
        let value = value.into();
        if let Some(param) = TimeParameter::from_human_key(key) {
            let us = value.as_f64().ok_or_else(|| {
                DaqError::configuration(key, format!("expected microseconds, found {value}"))
            })?;
            self.times.insert(param, TimeValue::HumanTime(us));
        } else if let Some(param) = TimeParameter::from_base_name(key) {
            let ticks = value.as_i64().ok_or_else(|| {
                DaqError::configuration(key, format!("expected integer clock ticks, found {value}"))
            })?;
            self.times.insert(param, TimeValue::DeviceTicks(ticks));
        } else {
            self.params.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Look up a parameter by key, in the unit form the key names.
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(param) = TimeParameter::from_human_key(key) {
            match self.times.get(&param) {
                Some(TimeValue::HumanTime(us)) => Some(Value::Float(*us)),
                _ => None,
            }
        } else if let Some(param) = TimeParameter::from_base_name(key) {
            match self.times.get(&param) {
                Some(TimeValue::DeviceTicks(t)) => Some(Value::Int(*t)),
                _ => None,
            }
        } else {
            self.params.get(key).cloned()
        }
    }

    /// True if `key` is present in either unit form.
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a parameter by key. Returns the removed value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let value = self.get(key)?;
        match TimeParameter::from_human_key(key).or_else(|| TimeParameter::from_base_name(key)) {
            Some(param) => {
                self.times.remove(&param);
            }
            None => {
                self.params.remove(key);
            }
        }
        Some(value)
    }

    /// Time parameter in whichever unit form it is held.
    pub fn time(&self, param: TimeParameter) -> Option<TimeValue> {
        self.times.get(&param).copied()
    }

    /// Store a time parameter, dropping its other unit form.
    pub fn set_time(&mut self, param: TimeParameter, value: TimeValue) {
        self.times.insert(param, value);
    }

    /// Keys as they would be stored, in sorted order.
    pub fn keys(&self) -> Vec<String> {
        self.to_section().into_keys().collect()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty() && self.params.is_empty()
    }

    /// Flatten into a storable section using the suffix convention.
    pub fn to_section(&self) -> Section {
        let mut section = self.params.clone();
        for (param, value) in &self.times {
            match value {
                TimeValue::HumanTime(us) => {
                    section.insert(param.human_key(), Value::Float(*us));
                }
                TimeValue::DeviceTicks(ticks) => {
                    section.insert(param.base_name().to_string(), Value::Int(*ticks));
                }
            }
        }
        section
    }

    /// Rebuild from a stored section.
    ///
    /// A section holding both forms of one time parameter is rejected.
    pub fn from_section(section: &Section) -> AppResult<Self> {
        let mut config = Self::new();
        for (key, value) in section {
            if let Some(param) = TimeParameter::from_human_key(key)
                .or_else(|| TimeParameter::from_base_name(key))
            {
                if config.times.contains_key(&param) {
                    return Err(DaqError::configuration(
                        key,
                        format!("{param} is present in both microseconds and clock ticks"),
                    ));
                }
            }
            config.insert(key, value.clone())?;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_forms_are_mutually_exclusive() {
        let mut config = MeasurementConfig::new();
        config.insert("res_length_us", 1.5).unwrap();
        assert!(config.contains_key("res_length_us"));
        assert!(!config.contains_key("res_length"));

        config.insert("res_length", 40_i64).unwrap();
        assert!(!config.contains_key("res_length_us"));
        assert_eq!(config.get("res_length"), Some(Value::Int(40)));
        assert_eq!(config.keys(), vec!["res_length".to_string()]);
    }

    #[test]
    fn device_ticks_must_be_integral() {
        let mut config = MeasurementConfig::new();
        assert!(config.insert("relax_delay", 10.0).is_ok());
        let err = config.insert("relax_delay", 10.5).unwrap_err();
        assert_eq!(err.offending_field(), Some("relax_delay"));
        assert!(config.insert("relax_delay_us", "long").is_err());
    }

    #[test]
    fn section_round_trip_keeps_forms() {
        let mut config = MeasurementConfig::new();
        config.insert("adc_trig_offset_us", 0.47).unwrap();
        config.insert("readout_length", 300_i64).unwrap();
        config.insert("res_pulse_style", "const").unwrap();
        config.insert("res_gain", 30000_i64).unwrap();

        let section = config.to_section();
        assert!(section.contains_key("adc_trig_offset_us"));
        assert!(section.contains_key("readout_length"));
        assert_eq!(MeasurementConfig::from_section(&section).unwrap(), config);
    }

    #[test]
    fn rejects_both_forms_in_one_section() {
        let mut section = Section::new();
        section.insert("delay".into(), Value::Int(5));
        section.insert("delay_us".into(), Value::Float(0.1));
        assert!(MeasurementConfig::from_section(&section).is_err());
    }

    #[test]
    fn remove_by_either_key() {
        let mut config = MeasurementConfig::new();
        config.insert("qu_sigma_us", 0.05).unwrap();
        assert_eq!(config.remove("qu_sigma"), None);
        assert_eq!(config.remove("qu_sigma_us"), Some(Value::Float(0.05)));
        assert!(config.is_empty());
    }
}
