//! Pre-flight validation of an acquisition request.
//!
//! Checks run in a fixed order and the first violation wins:
//!
//! 1. persistence destination (present, absolute)
//! 2. axes present for the requested dimensionality, and no extra axis
//! 3. stale results without an overwrite request
//! 4. measurement-type constraints ([`ToneVariant::check_setup`])
//!
//! Nothing here mutates the record, so a rejected request leaves it exactly as it was.

use crate::axis::AxisIndex;
use crate::dataset::data::{values_key, KEY_RESULT_I};
use crate::dataset::identity::SweepType;
use crate::dataset::DatasetRecord;
use crate::error::{AppResult, DaqError};
use crate::storage::DEFAULT_FORMAT;
use crate::sweep::SweepOptions;
use std::path::PathBuf;

/// What the caller wants an acquisition to do.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionRequest {
    /// Dimensionality to sweep.
    pub sweep_type: SweepType,
    /// Persist the record once the sweep completes.
    pub save: bool,
    /// Directory to persist into. Required when `save` is set.
    pub destination: Option<PathBuf>,
    /// Allow replacing results already held by the record.
    pub overwrite: bool,
    /// Container extension used when saving.
    pub format: String,
    /// Options handed to the sweep engine.
    pub options: SweepOptions,
}

impl AcquisitionRequest {
    /// Request that does not save and keeps default options.
    pub fn new(sweep_type: SweepType) -> Self {
        Self {
            sweep_type,
            save: false,
            destination: None,
            overwrite: false,
            format: DEFAULT_FORMAT.to_string(),
            options: SweepOptions::default(),
        }
    }

    /// 1D request.
    pub fn one_d() -> Self {
        Self::new(SweepType::OneD)
    }

    /// 2D request.
    pub fn two_d() -> Self {
        Self::new(SweepType::TwoD)
    }

    /// Save into `dir` after the sweep.
    pub fn save_to(mut self, dir: impl Into<PathBuf>) -> Self {
        self.save = true;
        self.destination = Some(dir.into());
        self
    }

    /// Request (or cancel) persistence without changing the destination.
    pub fn save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }

    /// Allow replacing existing results.
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Container format extension used when saving.
    pub fn format(mut self, extension: impl Into<String>) -> Self {
        self.format = extension.into();
        self
    }

    /// Truncate the values of one axis to integers before they reach the config.
    pub fn force_int(mut self, index: AxisIndex, force: bool) -> Self {
        match index {
            AxisIndex::X => self.options.x_force_int = force,
            AxisIndex::Y => self.options.y_force_int = force,
        }
        self
    }

    /// Enable or skip the decimated capture.
    pub fn decimated(mut self, decimated: bool) -> Self {
        self.options.decimated = decimated;
        self
    }

    /// Replace all sweep options.
    pub fn with_options(mut self, options: SweepOptions) -> Self {
        self.options = options;
        self
    }
}

/// Validate `request` against the current state of `record`.
pub fn preflight(record: &DatasetRecord, request: &AcquisitionRequest) -> AppResult<()> {
    if request.save {
        match &request.destination {
            None => {
                return Err(DaqError::invalid_path(
                    "",
                    "no data path provided; provide one or disable saving",
                ))
            }
            Some(dir) if !dir.is_absolute() => {
                return Err(DaqError::invalid_path(
                    dir.display().to_string(),
                    "relative path; provide an absolute data path",
                ))
            }
            Some(_) => {}
        }
    }

    let axes = record.data().axes();
    if axes.x().is_none() {
        return Err(DaqError::configuration(
            values_key(AxisIndex::X),
            "x sweep values not found",
        ));
    }
    match (request.sweep_type, axes.y()) {
        (SweepType::OneD, Some(_)) => {
            return Err(DaqError::configuration(
                values_key(AxisIndex::Y),
                "y sweep values are set but a 1D sweep was requested",
            ))
        }
        (SweepType::TwoD, None) => {
            return Err(DaqError::configuration(
                values_key(AxisIndex::Y),
                "y sweep values not found",
            ))
        }
        _ => {}
    }

    if record.data().has_results() && !request.overwrite {
        return Err(DaqError::StaleData {
            key: KEY_RESULT_I.to_string(),
        });
    }

    record.variant().check_setup(
        record.hardware_map(),
        record.measurement_config(),
        axes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::ToneVariant;

    #[test]
    fn save_needs_absolute_destination() {
        let mut record = DatasetRecord::new(ToneVariant::TwoTone);
        record.set_axis(3, 0.0, 1.0, "res_freq", 1).unwrap();

        let no_dest = AcquisitionRequest::one_d().save(true);
        let err = preflight(&record, &no_dest).unwrap_err();
        assert!(matches!(err, DaqError::InvalidPath { .. }));

        let relative = AcquisitionRequest::one_d().save_to("data");
        assert_eq!(
            preflight(&record, &relative).unwrap_err().offending_field(),
            Some("data")
        );

        let ok = AcquisitionRequest::one_d().save_to(std::env::temp_dir());
        assert!(preflight(&record, &ok).is_ok());
    }

    #[test]
    fn dimensionality_must_match_axes() {
        let mut record = DatasetRecord::new(ToneVariant::TwoTone);
        record.set_axis(3, 0.0, 1.0, "res_freq", 1).unwrap();
        let err = preflight(&record, &AcquisitionRequest::two_d()).unwrap_err();
        assert_eq!(err.offending_field(), Some("y_sweep_values"));

        record.set_axis(2, 0.0, 1.0, "res_gain", 2).unwrap();
        let err = preflight(&record, &AcquisitionRequest::one_d()).unwrap_err();
        assert_eq!(err.offending_field(), Some("y_sweep_values"));
        assert!(preflight(&record, &AcquisitionRequest::two_d()).is_ok());
    }

    #[test]
    fn builder_sets_force_int_per_axis() {
        let request = AcquisitionRequest::two_d()
            .force_int(AxisIndex::Y, true)
            .decimated(false);
        assert!(!request.options.x_force_int);
        assert!(request.options.y_force_int);
        assert!(!request.options.decimated);
    }
}
