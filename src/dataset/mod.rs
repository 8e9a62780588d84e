//! The dataset record: the unit of persistence passed through the measurement pipeline.
//!
//! A [`DatasetRecord`] owns five sections:
//!
//! - **identity**: series, device, qubit set, measurement type ([`identity::Identity`])
//! - **hardware map**: channel slot assignments ([`hardware::HardwareMap`])
//! - **board config**: opaque firmware/board settings
//! - **measurement config**: pulse parameters, with time parameters in one of two unit
//!   forms ([`config::MeasurementConfig`])
//! - **measurement data**: sweep axes and results ([`data::MeasurementData`])
//!
//! Every record owns fresh sections; nothing is shared between instances.
//!
//! ## Typical flow
//!
//! ```no_run
//! use sweep_daq::dataset::DatasetRecord;
//! use sweep_daq::dataset::hardware::{ChannelSlot, HardwareMap};
//! use sweep_daq::hardware::mock::{LinearClock, MockResonator};
//! use sweep_daq::measurement::ToneVariant;
//! use sweep_daq::preflight::AcquisitionRequest;
//!
//! let mut record = DatasetRecord::new(ToneVariant::SingleTone);
//! record.set_identity("sil", vec![1], "res_spec");
//! record.set_hardware_map(HardwareMap::new().with(ChannelSlot::Readout, 6).with(ChannelSlot::Adc, 0));
//! record.measurement_config_mut().insert("readout_length_us", 2.0)?;
//! record.set_axis(101, 5.9e3, 6.1e3, "res_freq", 1)?;
//!
//! let mut resonator = MockResonator::new(6.0e3, 0.5);
//! record.acquire(&mut resonator, &LinearClock::default(), &AcquisitionRequest::one_d().save_to("/data/cooldown_7"))?;
//! # Ok::<(), sweep_daq::error::DaqError>(())
//! ```

pub mod config;
pub mod data;
pub mod hardware;
pub mod identity;
pub mod value;

use crate::axis::{Axis, AxisIndex};
use crate::error::{AppResult, DaqError};
use crate::measurement::ToneVariant;
use crate::preflight::{preflight, AcquisitionRequest};
use crate::storage::{self, codec, StructuralMismatch};
use crate::sweep::{self, Acquire};
use crate::units::{normalize_config, ClockConverter, NormalizationReport};
use config::MeasurementConfig;
use data::MeasurementData;
use hardware::HardwareMap;
use identity::{Identity, SweepType};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;
use value::Section;

/// What an acquisition did.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquisitionReport {
    /// Dimensionality that was swept.
    pub sweep_type: SweepType,
    /// Point acquisitions made, excluding the decimated capture.
    pub points: usize,
    /// Time parameters rewritten into device ticks before the sweep.
    pub normalization: NormalizationReport,
    /// File written, if saving was requested.
    pub saved_to: Option<PathBuf>,
}

/// A self-describing measurement dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    variant: ToneVariant,
    identity: Identity,
    hardware: HardwareMap,
    board_config: Section,
    measurement_config: MeasurementConfig,
    data: MeasurementData,
    warnings: Vec<StructuralMismatch>,
}

impl DatasetRecord {
    /// New record with a freshly generated series.
    pub fn new(variant: ToneVariant) -> Self {
        Self::with_identity(variant, Identity::generate())
    }

    /// New record with an explicit series.
    pub fn with_series(variant: ToneVariant, series: impl Into<String>) -> Self {
        Self::with_identity(variant, Identity::with_series(series))
    }

    fn with_identity(variant: ToneVariant, identity: Identity) -> Self {
        info!(series = identity.series(), variant = %variant, "creating dataset");
        Self::from_parts(
            variant,
            identity,
            HardwareMap::new(),
            Section::new(),
            MeasurementConfig::new(),
            MeasurementData::new(),
            Vec::new(),
        )
    }

    pub(crate) fn from_parts(
        variant: ToneVariant,
        identity: Identity,
        hardware: HardwareMap,
        board_config: Section,
        measurement_config: MeasurementConfig,
        data: MeasurementData,
        warnings: Vec<StructuralMismatch>,
    ) -> Self {
        Self {
            variant,
            identity,
            hardware,
            board_config,
            measurement_config,
            data,
            warnings,
        }
    }

    /// Measurement type variant fixed at construction.
    pub fn variant(&self) -> ToneVariant {
        self.variant
    }

    /// Identity section.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Series string, the join key used on reload.
    pub fn series(&self) -> &str {
        self.identity.series()
    }

    /// Channel assignments.
    pub fn hardware_map(&self) -> &HardwareMap {
        &self.hardware
    }

    /// Board settings, stored as given.
    pub fn board_config(&self) -> &Section {
        &self.board_config
    }

    /// Mutable board settings.
    pub fn board_config_mut(&mut self) -> &mut Section {
        &mut self.board_config
    }

    /// Measurement parameters.
    pub fn measurement_config(&self) -> &MeasurementConfig {
        &self.measurement_config
    }

    /// Mutable measurement parameters.
    pub fn measurement_config_mut(&mut self) -> &mut MeasurementConfig {
        &mut self.measurement_config
    }

    /// Axes, results and decimated trace.
    pub fn data(&self) -> &MeasurementData {
        &self.data
    }

    /// Structural warnings collected when this record was reloaded.
    pub fn warnings(&self) -> &[StructuralMismatch] {
        &self.warnings
    }

    /// Fill in the identity fields. The series is never changed.
    pub fn set_identity(
        &mut self,
        device: impl Into<String>,
        qubits: Vec<i64>,
        measurement_type: impl Into<String>,
    ) {
        self.identity.device = device.into();
        self.identity.qubits = qubits;
        self.identity.measurement_type = measurement_type.into();
    }

    /// Replace the channel assignments.
    pub fn set_hardware_map(&mut self, hardware: HardwareMap) {
        self.hardware = hardware;
    }

    /// Set axis `axis_index` (1 = x, 2 = y) to `n_points` evenly spaced values from
    /// `start` to `stop` inclusive, sweeping `variable_name`.
    ///
    /// Fails with [`DaqError::StaleData`] while results are held; see
    /// [`DatasetRecord::clear_results`].
    pub fn set_axis(
        &mut self,
        n_points: usize,
        start: f64,
        stop: f64,
        variable_name: &str,
        axis_index: u8,
    ) -> AppResult<()> {
        let index = AxisIndex::try_from(axis_index)?;
        self.variant.check_axis_name(variable_name)?;
        let axis = Axis::linspace(variable_name, n_points, start, stop)?;
        info!(axis = %index, name = variable_name, n_points, "writing sweep values");
        self.data.set_axis(index, axis)
    }

    /// Exchange x and y, transposing any 2D result. A record holding 1D results cannot
    /// be swapped.
    pub fn swap_axes(&mut self) -> AppResult<()> {
        self.data.swap_axes()
    }

    /// Discard results and the decimated trace so the axes can be redefined.
    pub fn clear_results(&mut self) {
        self.data.clear_results();
        self.identity.sweep_type = None;
    }

    /// Validate, normalize units, run the sweep and store the results.
    ///
    /// Guard failures leave the record untouched. Once the guards pass, the measurement
    /// config and axes are rewritten into device units before the first hardware call. An
    /// error from `acquirer` aborts the sweep and leaves results unset.
    pub fn acquire(
        &mut self,
        acquirer: &mut dyn Acquire,
        converter: &dyn ClockConverter,
        request: &AcquisitionRequest,
    ) -> AppResult<AcquisitionReport> {
        preflight(self, request)?;

        let mut config = self.measurement_config.clone();
        let normalization = normalize_config(&mut config, &self.hardware, converter)?;
        let axes = self.data.axes().to_device_units(&self.hardware, converter)?;
        self.measurement_config = config;
        self.data.replace_axes(axes);

        let working = sweep::merge_config(&self.hardware, &self.measurement_config, &self.board_config);
        let axes = self.data.axes();
        let missing_x = || DaqError::configuration(data::values_key(AxisIndex::X), "x sweep values not found");
        let output = match request.sweep_type {
            SweepType::OneD => {
                let x = axes.x().ok_or_else(missing_x)?;
                sweep::sweep_1d(acquirer, working, x, &request.options)?
            }
            SweepType::TwoD => {
                let x = axes.x().ok_or_else(missing_x)?;
                let y = axes.y().ok_or(DaqError::NotTwoDimensional)?;
                sweep::sweep_2d(acquirer, working, x, y, &request.options)?
            }
        };

        self.identity.sweep_type = Some(request.sweep_type);
        self.data.set_results(output.result, output.decimated_trace);

        let saved_to = match (&request.destination, request.save) {
            (Some(dir), true) => Some(self.write_as(dir, &request.format)?),
            _ => None,
        };

        Ok(AcquisitionReport {
            sweep_type: request.sweep_type,
            points: output.points,
            normalization,
            saved_to,
        })
    }

    /// Run a 1D sweep without saving.
    pub fn acquire_1d(
        &mut self,
        acquirer: &mut dyn Acquire,
        converter: &dyn ClockConverter,
    ) -> AppResult<AcquisitionReport> {
        self.acquire(acquirer, converter, &AcquisitionRequest::one_d())
    }

    /// Run a 2D sweep without saving.
    pub fn acquire_2d(
        &mut self,
        acquirer: &mut dyn Acquire,
        converter: &dyn ClockConverter,
    ) -> AppResult<AcquisitionReport> {
        self.acquire(acquirer, converter, &AcquisitionRequest::two_d())
    }

    /// Persist into `dir` in the default format. Returns the written file.
    pub fn write(&self, dir: impl AsRef<Path>) -> AppResult<PathBuf> {
        self.write_as(dir, storage::DEFAULT_FORMAT)
    }

    /// Persist into `dir` using the container format registered for `extension`.
    pub fn write_as(&self, dir: impl AsRef<Path>, extension: &str) -> AppResult<PathBuf> {
        storage::write(self, dir.as_ref(), extension)
    }

    /// The five sections under their stored group names.
    pub fn to_sections(&self) -> Vec<(&'static str, Section)> {
        vec![
            (codec::GROUP_IDENTITY, self.identity.to_section()),
            (codec::GROUP_HARDWARE_MAP, self.hardware.to_section()),
            (codec::GROUP_BOARD_CONFIG, self.board_config.clone()),
            (codec::GROUP_MEASUREMENT_CONFIG, self.measurement_config.to_section()),
            (codec::GROUP_MEASUREMENT_DATA, self.data.to_section()),
        ]
    }
}

impl fmt::Display for DatasetRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "====---------------------------====";
        writeln!(f, "{rule}")?;
        writeln!(f, "        {}", self.identity.series())?;
        writeln!(f, "{rule}")?;
        writeln!(f, "       Device = {}", self.identity.device)?;
        writeln!(f, "       Qubits = {:?}", self.identity.qubits)?;
        writeln!(f, "    Meas Type = {}", self.identity.measurement_type)?;
        write!(f, "{rule}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::hardware::ChannelSlot;
    use crate::sweep::IqPoint;
    use ndarray::Array2;

    fn clock(us: f64, _ch: Option<u32>) -> anyhow::Result<i64> {
        Ok((us * 100.0).round() as i64)
    }

    #[derive(Default)]
    struct Counter(usize);

    impl Acquire for Counter {
        fn acquire(&mut self, _config: &Section) -> anyhow::Result<IqPoint> {
            self.0 += 1;
            Ok(IqPoint::new(1.0, 0.0))
        }

        fn acquire_decimated(&mut self, _config: &Section) -> anyhow::Result<Array2<f64>> {
            Ok(Array2::zeros((2, 4)))
        }
    }

    #[test]
    fn records_do_not_share_sections() {
        let mut a = DatasetRecord::with_series(ToneVariant::TwoTone, "a");
        a.board_config_mut().insert("soft_avgs".into(), 10_i64.into());
        a.measurement_config_mut().insert("res_gain", 5_i64).unwrap();
        let b = DatasetRecord::with_series(ToneVariant::TwoTone, "b");
        assert!(b.board_config().is_empty());
        assert!(b.measurement_config().is_empty());
    }

    #[test]
    fn set_axis_checks_variant_and_order() {
        let mut record = DatasetRecord::new(ToneVariant::SingleTone);
        assert!(matches!(
            record.set_axis(3, 0.0, 1.0, "qu_gain", 1),
            Err(DaqError::AxisConflict { .. })
        ));
        assert!(matches!(
            record.set_axis(3, 0.0, 1.0, "res_gain", 2),
            Err(DaqError::AxisOrder)
        ));
        assert!(matches!(
            record.set_axis(3, 0.0, 1.0, "res_gain", 3),
            Err(DaqError::Configuration { .. })
        ));
        record.set_axis(5, 0.0, 4.0, "res_gain", 1).unwrap();
        assert_eq!(record.data().dimensionality(), 1);
    }

    #[test]
    fn acquire_normalizes_before_sweeping() {
        let mut record = DatasetRecord::new(ToneVariant::SingleTone);
        record.set_hardware_map(HardwareMap::new().with(ChannelSlot::Readout, 0));
        record
            .measurement_config_mut()
            .insert("relax_delay_us", 2.0)
            .unwrap();
        record.set_axis(3, 1.0, 3.0, "res_length_us", 1).unwrap();

        let mut counter = Counter::default();
        let report = record.acquire_1d(&mut counter, &clock).unwrap();
        assert_eq!(report.points, 3);
        assert_eq!(counter.0, 3);
        assert_eq!(report.saved_to, None);

        let x = record.data().axes().x().unwrap();
        assert_eq!(x.name(), "res_length");
        assert_eq!(x.values(), &[100.0, 200.0, 300.0]);
        assert_eq!(x.display(), ("res_length_us", &[1.0, 2.0, 3.0][..]));
        assert_eq!(
            record.measurement_config().get("relax_delay"),
            Some(value::Value::Int(200))
        );
        assert_eq!(record.identity().sweep_type, Some(SweepType::OneD));
    }

    #[test]
    fn second_acquisition_needs_overwrite() {
        let mut record = DatasetRecord::new(ToneVariant::TwoTone);
        record.set_axis(2, 0.0, 1.0, "res_gain", 1).unwrap();
        let mut counter = Counter::default();
        record.acquire_1d(&mut counter, &clock).unwrap();
        assert!(matches!(
            record.acquire_1d(&mut counter, &clock),
            Err(DaqError::StaleData { .. })
        ));
        assert_eq!(counter.0, 2);
        record
            .acquire(&mut counter, &clock, &AcquisitionRequest::one_d().overwrite(true))
            .unwrap();
        assert_eq!(counter.0, 4);
    }

    #[test]
    fn display_shows_identity() {
        let mut record = DatasetRecord::with_series(ToneVariant::SingleTone, "20240501_120000");
        record.set_identity("sil", vec![2, 4], "tof");
        let text = record.to_string();
        assert!(text.contains("20240501_120000"));
        assert!(text.contains("Device = sil"));
        assert!(text.contains("Qubits = [2, 4]"));
        assert!(text.contains("Meas Type = tof"));
    }
}
