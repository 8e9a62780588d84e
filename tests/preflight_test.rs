//! Guard behaviour: ordering, no hardware calls and no mutation on failure.

mod common;

use common::{hundred_mhz, Probe};
use sweep_daq::dataset::hardware::{ChannelSlot, HardwareMap};
use sweep_daq::preflight::preflight;
use sweep_daq::{AcquisitionRequest, DaqError, DatasetRecord, ToneVariant};
use tempfile::tempdir;

#[test]
fn single_tone_with_drive_channel_never_reaches_hardware() {
    let mut record = DatasetRecord::new(ToneVariant::SingleTone);
    record.set_hardware_map(
        HardwareMap::new()
            .with(ChannelSlot::Readout, 6)
            .with(ChannelSlot::Drive, 2),
    );
    record.set_axis(5, 0.0, 4.0, "res_freq", 1).unwrap();
    let before = record.clone();

    let mut probe = Probe::one_d("res_freq");
    let err = record.acquire_1d(&mut probe, &hundred_mhz).unwrap_err();
    assert!(matches!(err, DaqError::IncompatibleParameter { .. }));
    assert_eq!(err.offending_field(), Some("drive_channel"));
    assert!(err.is_guard_error());
    assert_eq!(probe.calls, 0);
    assert_eq!(probe.decimated_calls, 0);
    assert_eq!(record, before);
}

#[test]
fn missing_axis_wins_over_persistence_and_stale_checks() {
    let dir = tempdir().unwrap();
    let record = DatasetRecord::new(ToneVariant::SingleTone);
    let request = AcquisitionRequest::one_d().save_to(dir.path());
    let err = preflight(&record, &request).unwrap_err();
    assert!(matches!(err, DaqError::Configuration { .. }));
    assert_eq!(err.offending_field(), Some("x_sweep_values"));
}

#[test]
fn path_is_checked_before_axes() {
    let record = DatasetRecord::new(ToneVariant::SingleTone);
    let err = preflight(&record, &AcquisitionRequest::one_d().save_to("relative/dir")).unwrap_err();
    assert!(matches!(err, DaqError::InvalidPath { .. }));
}

#[test]
fn stale_data_is_checked_before_variant_constraints() {
    let mut record = DatasetRecord::new(ToneVariant::SingleTone);
    record.set_axis(2, 0.0, 1.0, "res_freq", 1).unwrap();
    let mut probe = Probe::one_d("res_freq");
    record.acquire_1d(&mut probe, &hundred_mhz).unwrap();

    record.set_hardware_map(HardwareMap::new().with(ChannelSlot::Drive, 2));
    let err = record.acquire_1d(&mut probe, &hundred_mhz).unwrap_err();
    assert!(matches!(err, DaqError::StaleData { .. }));
    assert_eq!(err.offending_field(), Some("result_i"));

    let err = record
        .acquire(
            &mut probe,
            &hundred_mhz,
            &AcquisitionRequest::one_d().overwrite(true),
        )
        .unwrap_err();
    assert!(matches!(err, DaqError::IncompatibleParameter { .. }));
    assert_eq!(probe.calls, 2);
}

#[test]
fn drive_parameters_are_named() {
    let mut record = DatasetRecord::new(ToneVariant::SingleTone);
    record.set_axis(2, 0.0, 1.0, "res_freq", 1).unwrap();
    record
        .measurement_config_mut()
        .insert("qu_sigma_us", 0.02)
        .unwrap();
    let err = preflight(&record, &AcquisitionRequest::one_d()).unwrap_err();
    assert_eq!(err.offending_field(), Some("qu_sigma_us"));
}

#[test]
fn two_d_request_on_one_axis_is_a_configuration_error() {
    let mut record = DatasetRecord::new(ToneVariant::TwoTone);
    record.set_axis(2, 0.0, 1.0, "res_freq", 1).unwrap();
    let mut probe = Probe::two_d("res_freq", "res_gain");
    let err = record.acquire_2d(&mut probe, &hundred_mhz).unwrap_err();
    assert_eq!(err.offending_field(), Some("y_sweep_values"));
    assert_eq!(probe.calls, 0);
}

#[test]
fn conversion_failure_leaves_record_untouched() {
    let mut record = DatasetRecord::new(ToneVariant::SingleTone);
    record
        .measurement_config_mut()
        .insert("relax_delay_us", 5.0)
        .unwrap();
    record.set_axis(3, -1.0, 1.0, "res_length_us", 1).unwrap();
    let before = record.clone();

    let positive_only = |us: f64, _ch: Option<u32>| -> anyhow::Result<i64> {
        anyhow::ensure!(us >= 0.0, "negative duration {us}");
        Ok((us * 10.0).round() as i64)
    };
    let mut probe = Probe::one_d("res_length");
    let err = record.acquire_1d(&mut probe, &positive_only).unwrap_err();
    assert!(matches!(err, DaqError::Conversion { .. }));
    assert_eq!(err.offending_field(), Some("res_length_us"));
    assert_eq!(probe.calls, 0);
    assert_eq!(record, before);
}
