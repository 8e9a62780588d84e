//! Settings loaded with Figment
//!
//! Settings are read from:
//! 1. a TOML file (`config/default.toml` unless another path is given)
//! 2. environment variables prefixed with `SWEEP_DAQ_`, nested with `__`
//!
//! Every field has a default, so an absent file yields [`Settings::default`].
//!
//! # Example
//! ```no_run
//! use sweep_daq::config::Settings;
//!
//! // SWEEP_DAQ_STORAGE__FORMAT=h5 overrides `storage.format`
//! let settings = Settings::load()?;
//! println!("saving to {}", settings.storage.data_dir.display());
//! # Ok::<(), figment::Error>(())
//! ```

use crate::dataset::config::MeasurementConfig;
use crate::dataset::value::{Section, Value};
use crate::error::{AppResult, DaqError};
use crate::logging::{parse_log_level, OutputFormat};
use crate::storage::registry::FormatRegistry;
use crate::sweep::{DECIMATED_REPS, DECIMATED_SOFT_AVGS};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default settings file.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SWEEP_DAQ_";

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: OutputFormat,
    /// Where records are saved.
    pub storage: StorageSettings,
    /// Sweep engine defaults.
    pub sweep: SweepSettings,
    /// Default measurement parameters, `<name>_us` for times in microseconds.
    pub measurement: BTreeMap<String, toml::Value>,
    /// Default board settings.
    pub board: BTreeMap<String, toml::Value>,
}

/// Where and how records are saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Directory records are written into.
    pub data_dir: PathBuf,
    /// Container extension (`json`, or `h5` with the `storage_hdf5` feature).
    pub format: String,
}

/// Sweep engine defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepSettings {
    /// Capture a decimated trace after each sweep.
    pub do_decimated: bool,
    /// `reps` used for the decimated capture.
    pub decimated_reps: i64,
    /// `soft_avgs` used for the decimated capture.
    pub decimated_soft_avgs: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: OutputFormat::Pretty,
            storage: StorageSettings::default(),
            sweep: SweepSettings::default(),
            measurement: BTreeMap::new(),
            board: BTreeMap::new(),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: std::env::temp_dir().join("sweep_daq"),
            format: "json".to_string(),
        }
    }
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            do_decimated: true,
            decimated_reps: DECIMATED_REPS,
            decimated_soft_avgs: DECIMATED_SOFT_AVGS,
        }
    }
}

impl Settings {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file path and the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
    }

    /// Validate settings after loading.
    pub fn validate(&self) -> AppResult<()> {
        parse_log_level(&self.log_level)
            .map_err(|reason| DaqError::configuration("log_level", reason))?;

        let registry = FormatRegistry::new();
        if !registry.is_available(&self.storage.format) {
            return Err(DaqError::configuration(
                "storage.format",
                format!(
                    "format '{}' is not available. Available formats: {}",
                    self.storage.format,
                    registry.list_formats().join(", ")
                ),
            ));
        }

        if self.sweep.decimated_reps <= 0 {
            return Err(DaqError::configuration(
                "sweep.decimated_reps",
                "must be positive",
            ));
        }
        if self.sweep.decimated_soft_avgs <= 0 {
            return Err(DaqError::configuration(
                "sweep.decimated_soft_avgs",
                "must be positive",
            ));
        }

        self.measurement_config()?;
        self.board_config()?;
        Ok(())
    }

    /// The `[measurement]` table as a measurement config.
    pub fn measurement_config(&self) -> AppResult<MeasurementConfig> {
        let mut config = MeasurementConfig::new();
        for (key, value) in &self.measurement {
            config.insert(key, toml_to_value(key, value)?)?;
        }
        Ok(config)
    }

    /// The `[board]` table as a section.
    pub fn board_config(&self) -> AppResult<Section> {
        self.board
            .iter()
            .map(|(key, value)| Ok((key.clone(), toml_to_value(key, value)?)))
            .collect()
    }
}

fn toml_to_value(key: &str, value: &toml::Value) -> AppResult<Value> {
    let unsupported = || DaqError::configuration(key, format!("unsupported value {value}"));
    match value {
        toml::Value::Integer(i) => Ok(Value::Int(*i)),
        toml::Value::Float(f) => Ok(Value::Float(*f)),
        toml::Value::String(s) => Ok(Value::Text(s.clone())),
        toml::Value::Array(items) => {
            if items.iter().all(toml::Value::is_integer) {
                Ok(Value::Ints(items.iter().filter_map(toml::Value::as_integer).collect()))
            } else {
                items
                    .iter()
                    .map(|item| match item {
                        toml::Value::Integer(i) => Some(*i as f64),
                        toml::Value::Float(f) => Some(*f),
                        _ => None,
                    })
                    .collect::<Option<Vec<f64>>>()
                    .map(Value::Floats)
                    .ok_or_else(unsupported)
            }
        }
        _ => Err(unsupported()),
    }
}
