//! Custom error types for the crate.
//!
//! This module defines the primary error type, `DaqError`, used by every stage of the
//! measurement pipeline. Using the `thiserror` crate, it provides a centralized and
//! consistent way to report what went wrong and, crucially, *which* field or key the
//! experimenter has to fix before trying again.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`**: a missing or malformed axis, or a dimensionality mismatch
//!   between the requested acquisition and the axes stored in the record.
//! - **`IncompatibleParameter`**: a measurement-type constraint was violated, e.g. a
//!   drive-tone parameter on a single-tone measurement.
//! - **`StaleData`**: results already exist and overwrite was not requested.
//! - **`Conversion`**: the injected clock converter failed for a time parameter.
//! - **`InvalidPath`**: a persistence destination is missing, relative, or does not exist.
//! - **`AxisOrder` / `AxisConflict` / `NotTwoDimensional`**: misuse of the axis state machine.
//! - **`Acquisition`**: a failure raised by the acquisition collaborator. It is carried
//!   transparently so the root cause is never hidden.
//!
//! Guard and state-machine errors are raised before any hardware interaction, so a caller
//! can correct the configuration without touching the device.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error in '{field}': {reason}")]
    Configuration { field: String, reason: String },

    #[error("Parameter '{key}' is incompatible with this measurement type")]
    IncompatibleParameter { key: String },

    #[error("Data already exists under '{key}'. Create a new record or request overwrite")]
    StaleData { key: String },

    #[error("Failed to convert '{key}' to device clock ticks: {reason}")]
    Conversion { key: String, reason: String },

    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Axis 2 cannot be set before axis 1")]
    AxisOrder,

    #[error("Axis variable '{name}' is not allowed for this measurement type")]
    AxisConflict { name: String },

    #[error("Operation requires a two-dimensional sweep")]
    NotTwoDimensional,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),

    #[error(transparent)]
    Acquisition(#[from] anyhow::Error),
}

impl DaqError {
    /// Shorthand for a [`DaqError::Configuration`].
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        DaqError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`DaqError::InvalidPath`].
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        DaqError::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// The field, key or path the caller has to correct, if the error names one.
    pub fn offending_field(&self) -> Option<&str> {
        match self {
            DaqError::Configuration { field, .. } => Some(field),
            DaqError::IncompatibleParameter { key }
            | DaqError::StaleData { key }
            | DaqError::Conversion { key, .. } => Some(key),
            DaqError::InvalidPath { path, .. } => Some(path),
            DaqError::AxisConflict { name } => Some(name),
            _ => None,
        }
    }

    /// True for errors raised by validation, before any hardware call.
    pub fn is_guard_error(&self) -> bool {
        matches!(
            self,
            DaqError::Configuration { .. }
                | DaqError::IncompatibleParameter { .. }
                | DaqError::StaleData { .. }
                | DaqError::InvalidPath { .. }
                | DaqError::AxisOrder
                | DaqError::AxisConflict { .. }
                | DaqError::NotTwoDimensional
        )
    }
}
