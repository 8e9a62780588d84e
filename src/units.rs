//! Human-time to device-clock normalization.
//!
//! Time-like measurement parameters are entered in microseconds and carry the
//! [`HUMAN_TIME_SUFFIX`] (`readout_length_us`). Before a sweep runs they are rewritten
//! into integer clock ticks (`readout_length`) using a [`ClockConverter`] supplied by the
//! hardware driver. Each parameter is bound to the channel whose clock it must be
//! expressed in.
//!
//! Conversion is one-way. Integer truncation makes it non-invertible, so human-unit
//! values that are needed later for display are kept as shadows by the axis layer
//! rather than reconstructed.

use crate::dataset::config::{MeasurementConfig, TimeValue};
use crate::dataset::hardware::{ChannelSlot, HardwareMap};
use crate::error::{AppResult, DaqError};
use std::fmt;
use tracing::{debug, info, warn};

/// Suffix marking a parameter or axis expressed in microseconds.
pub const HUMAN_TIME_SUFFIX: &str = "_us";

/// Prefix shared by every drive-tone parameter.
pub const DRIVE_PREFIX: &str = "qu_";

/// Device clock conversion supplied by the hardware driver.
///
/// Must be a pure function of its inputs and fixed clock parameters. `channel` is the
/// index assigned to the parameter's slot, or `None` if that slot is unassigned.
pub trait ClockConverter {
    /// Convert a duration in microseconds into clock ticks for `channel`.
    fn to_device_ticks(&self, value_us: f64, channel: Option<u32>) -> anyhow::Result<i64>;
}

impl<F> ClockConverter for F
where
    F: Fn(f64, Option<u32>) -> anyhow::Result<i64>,
{
    fn to_device_ticks(&self, value_us: f64, channel: Option<u32>) -> anyhow::Result<i64> {
        self(value_us, channel)
    }
}

/// The closed set of time-semantic measurement parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimeParameter {
    /// Delay between pulse start and ADC trigger.
    AdcTrigOffset,
    /// ADC readout window.
    ReadoutLength,
    /// Readout pulse length.
    ResLength,
    /// Drive pulse length.
    QuLength,
    /// Wait between repetitions.
    RelaxDelay,
    /// Wait between drive and readout pulses.
    Delay,
    /// Gaussian sigma of the drive pulse.
    QuSigma,
    /// Gaussian sigma of the readout pulse.
    ResSigma,
    /// Laser pulse length.
    LaserLength,
}

impl TimeParameter {
    /// Every time parameter.
    pub const ALL: [TimeParameter; 9] = [
        TimeParameter::AdcTrigOffset,
        TimeParameter::ReadoutLength,
        TimeParameter::ResLength,
        TimeParameter::QuLength,
        TimeParameter::RelaxDelay,
        TimeParameter::Delay,
        TimeParameter::QuSigma,
        TimeParameter::ResSigma,
        TimeParameter::LaserLength,
    ];

    /// Device-unit key.
    pub fn base_name(&self) -> &'static str {
        match self {
            TimeParameter::AdcTrigOffset => "adc_trig_offset",
            TimeParameter::ReadoutLength => "readout_length",
            TimeParameter::ResLength => "res_length",
            TimeParameter::QuLength => "qu_length",
            TimeParameter::RelaxDelay => "relax_delay",
            TimeParameter::Delay => "delay",
            TimeParameter::QuSigma => "qu_sigma",
            TimeParameter::ResSigma => "res_sigma",
            TimeParameter::LaserLength => "laser_length",
        }
    }

    /// Human-unit key.
    pub fn human_key(&self) -> String {
        format!("{}{}", self.base_name(), HUMAN_TIME_SUFFIX)
    }

    /// Channel whose clock the parameter is expressed in.
    pub fn channel(&self) -> ChannelSlot {
        match self {
            TimeParameter::QuLength | TimeParameter::QuSigma => ChannelSlot::Drive,
            TimeParameter::LaserLength => ChannelSlot::Laser,
            _ => ChannelSlot::Readout,
        }
    }

    /// Parameter whose device-unit key is `name`.
    pub fn from_base_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.base_name() == name)
    }

    /// Parameter whose human-time key is `key`.
    pub fn from_human_key(key: &str) -> Option<Self> {
        strip_human_suffix(key).and_then(Self::from_base_name)
    }
}

impl fmt::Display for TimeParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// Name without the human-time suffix, if it has one.
pub fn strip_human_suffix(name: &str) -> Option<&str> {
    name.strip_suffix(HUMAN_TIME_SUFFIX)
        .filter(|stripped| !stripped.is_empty())
}

/// Channel slot used to convert a swept variable.
///
/// Known time parameters use their static binding; anything else is a drive quantity if
/// it carries the drive prefix and a readout quantity otherwise.
pub fn channel_for_variable(name: &str) -> ChannelSlot {
    let base = strip_human_suffix(name).unwrap_or(name);
    match TimeParameter::from_base_name(base) {
        Some(param) => param.channel(),
        None if base.starts_with(DRIVE_PREFIX) => ChannelSlot::Drive,
        None => ChannelSlot::Readout,
    }
}

/// Convert one value, tagging failures with the key being converted.
pub(crate) fn convert_value(
    converter: &dyn ClockConverter,
    key: &str,
    value_us: f64,
    channel: Option<u32>,
) -> AppResult<i64> {
    converter
        .to_device_ticks(value_us, channel)
        .map_err(|e| DaqError::Conversion {
            key: key.to_string(),
            reason: format!("{e:#}"),
        })
}

/// What a normalization pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationReport {
    /// Parameters rewritten from human time to ticks.
    pub converted: Vec<TimeParameter>,
    /// Parameters that were supplied directly in ticks.
    pub already_device: Vec<TimeParameter>,
    /// Parameters absent in both forms.
    pub missing: Vec<TimeParameter>,
}

/// Rewrite every human-time parameter of `config` into device ticks.
///
/// Missing parameters are expected and only logged. All conversions are computed before
/// anything is written, so a [`DaqError::Conversion`] leaves `config` untouched.
pub fn normalize_config(
    config: &mut MeasurementConfig,
    hardware: &HardwareMap,
    converter: &dyn ClockConverter,
) -> AppResult<NormalizationReport> {
    let mut report = NormalizationReport::default();
    let mut pending = Vec::new();

    for param in TimeParameter::ALL {
        match config.time(param) {
            None => {
                debug!(parameter = %param, "time parameter not in measurement config");
                report.missing.push(param);
            }
            Some(TimeValue::DeviceTicks(_)) => {
                warn!(
                    parameter = %param,
                    "{param} is set in clock ticks; set {} in microseconds instead",
                    param.human_key()
                );
                report.already_device.push(param);
            }
            Some(TimeValue::HumanTime(us)) => {
                let channel = hardware.get(param.channel());
                let ticks = convert_value(converter, &param.human_key(), us, channel)?;
                pending.push((param, ticks));
            }
        }
    }

    if !pending.is_empty() {
        info!(count = pending.len(), "converted time parameters from us to clock ticks");
    }
    for (param, ticks) in pending {
        config.set_time(param, TimeValue::DeviceTicks(ticks));
        report.converted.push(param);
    }
    Ok(report)
}
