//! Measurement-type variants and the constraints they place on a record.

use crate::axis::SweepAxes;
use crate::dataset::config::MeasurementConfig;
use crate::dataset::hardware::{ChannelSlot, HardwareMap};
use crate::error::{AppResult, DaqError};
use crate::units::DRIVE_PREFIX;
use std::fmt;

/// Config keys that only make sense when a drive tone is played.
pub const DRIVE_ONLY_KEYS: [&str; 8] = [
    "qu_pulse_style",
    "qu_gain",
    "qu_length_us",
    "qu_length",
    "qu_phase",
    "qu_sigma_us",
    "qu_sigma",
    "qu_pulse_freq",
];

/// Which tones a measurement plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToneVariant {
    /// Readout tone only. Drive channel, drive parameters and drive axes are rejected.
    SingleTone,
    /// Readout and drive tones. No extra restrictions.
    TwoTone,
}

impl ToneVariant {
    /// Short name, used as a filename fallback.
    pub fn name(&self) -> &'static str {
        match self {
            ToneVariant::SingleTone => "one_tone",
            ToneVariant::TwoTone => "two_tone",
        }
    }

    /// False for drive-side axes on a single-tone measurement.
    pub fn allows_axis(&self, name: &str) -> bool {
        match self {
            ToneVariant::SingleTone => !name.starts_with(DRIVE_PREFIX),
            ToneVariant::TwoTone => true,
        }
    }

    /// Reject an axis variable this variant cannot sweep.
    pub fn check_axis_name(&self, name: &str) -> AppResult<()> {
        if self.allows_axis(name) {
            Ok(())
        } else {
            Err(DaqError::AxisConflict {
                name: name.to_string(),
            })
        }
    }

    /// Variant checks run just before acquisition.
    ///
    /// Order: drive channel, drive-only config keys, then axis names. The first violation
    /// is reported as [`DaqError::IncompatibleParameter`].
    pub fn check_setup(
        &self,
        hardware: &HardwareMap,
        config: &MeasurementConfig,
        axes: &SweepAxes,
    ) -> AppResult<()> {
        if *self == ToneVariant::TwoTone {
            return Ok(());
        }
        if hardware.is_assigned(ChannelSlot::Drive) {
            return Err(incompatible(ChannelSlot::Drive.key()));
        }
        if let Some(key) = DRIVE_ONLY_KEYS.iter().find(|key| config.contains_key(key)) {
            return Err(incompatible(key));
        }
        if let Some((_, axis)) = axes.iter().find(|(_, axis)| !self.allows_axis(axis.name())) {
            return Err(incompatible(axis.name()));
        }
        Ok(())
    }
}

fn incompatible(key: &str) -> DaqError {
    DaqError::IncompatibleParameter {
        key: key.to_string(),
    }
}

impl fmt::Display for ToneVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axis::{Axis, AxisIndex};

    #[test]
    fn single_tone_rejects_drive_channel_first() {
        let hw = HardwareMap::new().with(ChannelSlot::Drive, 2);
        let mut config = MeasurementConfig::new();
        config.insert("qu_gain", 1000_i64).unwrap();
        let err = ToneVariant::SingleTone
            .check_setup(&hw, &config, &SweepAxes::NoAxes)
            .unwrap_err();
        assert_eq!(err.offending_field(), Some("drive_channel"));
    }

    #[test]
    fn single_tone_rejects_drive_keys_in_either_unit() {
        for key in ["qu_length_us", "qu_length", "qu_sigma_us"] {
            let mut config = MeasurementConfig::new();
            config.insert(key, 5_i64).unwrap();
            let err = ToneVariant::SingleTone
                .check_setup(&HardwareMap::new(), &config, &SweepAxes::NoAxes)
                .unwrap_err();
            assert!(matches!(err, DaqError::IncompatibleParameter { .. }));
            assert_eq!(err.offending_field(), Some(key));
        }
    }

    #[test]
    fn single_tone_rejects_drive_axes() {
        let mut axes = SweepAxes::default();
        axes.set(AxisIndex::X, Axis::new("qu_pulse_freq", vec![1.0])).unwrap();
        assert!(ToneVariant::SingleTone
            .check_setup(&HardwareMap::new(), &MeasurementConfig::new(), &axes)
            .is_err());
        assert!(matches!(
            ToneVariant::SingleTone.check_axis_name("qu_gain"),
            Err(DaqError::AxisConflict { .. })
        ));
    }

    #[test]
    fn two_tone_is_unrestricted() {
        let hw = HardwareMap::new().with(ChannelSlot::Drive, 2);
        let mut config = MeasurementConfig::new();
        config.insert("qu_gain", 1000_i64).unwrap();
        let mut axes = SweepAxes::default();
        axes.set(AxisIndex::X, Axis::new("qu_pulse_freq", vec![1.0])).unwrap();
        assert!(ToneVariant::TwoTone.check_setup(&hw, &config, &axes).is_ok());
        assert!(ToneVariant::TwoTone.check_axis_name("qu_gain").is_ok());
    }
}
