//! Sweep axis management.
//!
//! A record sweeps zero, one or two independent variables. The axes form a small state
//! machine that only moves forward during setup:
//!
//! ```text
//! NoAxes ──set x──> OneAxis ──set y──> TwoAxes ──swap──┐
//!                                          ▲           │
//!                                          └───────────┘
//! ```
//!
//! Setting y while in `NoAxes` is an [`DaqError::AxisOrder`] error. `swap` is only valid in
//! `TwoAxes` and exchanges the complete axes (values, names and human-unit shadows) in one
//! step.

use crate::dataset::hardware::HardwareMap;
use crate::error::{AppResult, DaqError};
use crate::units::{self, ClockConverter};
use std::fmt;
use tracing::info;

/// Which axis an operation addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisIndex {
    /// First axis (the only axis of a 1D sweep).
    X,
    /// Second axis of a 2D sweep.
    Y,
}

impl AxisIndex {
    /// Key prefix used in the measurement data section.
    pub fn prefix(&self) -> &'static str {
        match self {
            AxisIndex::X => "x",
            AxisIndex::Y => "y",
        }
    }
}

impl TryFrom<u8> for AxisIndex {
    type Error = DaqError;

    fn try_from(index: u8) -> AppResult<Self> {
        match index {
            1 => Ok(AxisIndex::X),
            2 => Ok(AxisIndex::Y),
            other => Err(DaqError::configuration(
                "axis_index",
                format!("only 1D and 2D sweeps are supported, got axis {other}"),
            )),
        }
    }
}

impl fmt::Display for AxisIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Original human-unit name and values of an axis that was converted to ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct HumanShadow {
    /// Suffixed name, e.g. `relax_delay_us`.
    pub name: String,
    /// Values in microseconds.
    pub values: Vec<f64>,
}

/// One swept variable: an ordered value sequence and the config key it overrides.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    name: String,
    values: Vec<f64>,
    human: Option<HumanShadow>,
}

impl Axis {
    /// Axis over explicit values.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            human: None,
        }
    }

    /// Axis with a shadow already attached (used when reloading).
    pub fn with_shadow(name: impl Into<String>, values: Vec<f64>, human: HumanShadow) -> Self {
        Self {
            name: name.into(),
            values,
            human: Some(human),
        }
    }

    /// `n_points` evenly spaced values from `start` to `stop`, both inclusive.
    pub fn linspace(name: impl Into<String>, n_points: usize, start: f64, stop: f64) -> AppResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DaqError::configuration("variable_name", "axis name is empty"));
        }
        if n_points == 0 {
            return Err(DaqError::configuration(name, "axis needs at least one point"));
        }
        if !start.is_finite() || !stop.is_finite() {
            return Err(DaqError::configuration(name, "axis bounds must be finite"));
        }
        Ok(Self::new(name, linspace(n_points, start, stop)))
    }

    /// Config key this axis overrides.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Working values, in device units once normalized.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Human-unit shadow, present once a `_us` axis has been converted.
    pub fn human(&self) -> Option<&HumanShadow> {
        self.human.as_ref()
    }

    /// True while the name still carries the human-time suffix.
    pub fn is_human_time(&self) -> bool {
        units::strip_human_suffix(&self.name).is_some()
    }

    /// Name and values to show a person: the human-unit shadow if one exists.
    pub fn display(&self) -> (&str, &[f64]) {
        match &self.human {
            Some(shadow) => (&shadow.name, &shadow.values),
            None => (&self.name, &self.values),
        }
    }

    /// Device-unit copy of this axis, or `None` if it is not in human time.
    ///
    /// Every value is converted on the channel bound to the variable name; the original
    /// name and values become the shadow.
    pub fn to_device_units(
        &self,
        hardware: &HardwareMap,
        converter: &dyn ClockConverter,
    ) -> AppResult<Option<Axis>> {
        let Some(stripped) = units::strip_human_suffix(&self.name) else {
            return Ok(None);
        };
        let channel = hardware.get(units::channel_for_variable(&self.name));
        let values = self
            .values
            .iter()
            .map(|us| units::convert_value(converter, &self.name, *us, channel).map(|t| t as f64))
            .collect::<AppResult<Vec<_>>>()?;
        Ok(Some(Axis {
            name: stripped.to_string(),
            values,
            human: Some(HumanShadow {
                name: self.name.clone(),
                values: self.values.clone(),
            }),
        }))
    }

    /// Convert in place. Returns whether anything changed; a no-op once the suffix is gone.
    pub fn normalize_units(
        &mut self,
        hardware: &HardwareMap,
        converter: &dyn ClockConverter,
    ) -> AppResult<bool> {
        match self.to_device_units(hardware, converter)? {
            Some(converted) => {
                *self = converted;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// `n` evenly spaced values over `[start, stop]`; the last value is exactly `stop`.
pub fn linspace(n: usize, start: f64, stop: f64) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}

/// The axes of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum SweepAxes {
    #[default]
    NoAxes,
    OneAxis { x: Axis },
    TwoAxes { x: Axis, y: Axis },
}

impl SweepAxes {
    /// Number of axes present.
    pub fn dimensionality(&self) -> usize {
        match self {
            SweepAxes::NoAxes => 0,
            SweepAxes::OneAxis { .. } => 1,
            SweepAxes::TwoAxes { .. } => 2,
        }
    }

    /// The x axis, if set.
    pub fn x(&self) -> Option<&Axis> {
        match self {
            SweepAxes::NoAxes => None,
            SweepAxes::OneAxis { x } | SweepAxes::TwoAxes { x, .. } => Some(x),
        }
    }

    /// The y axis, if set.
    pub fn y(&self) -> Option<&Axis> {
        match self {
            SweepAxes::TwoAxes { y, .. } => Some(y),
            _ => None,
        }
    }

    /// Axis at `index`, if set.
    pub fn get(&self, index: AxisIndex) -> Option<&Axis> {
        match index {
            AxisIndex::X => self.x(),
            AxisIndex::Y => self.y(),
        }
    }

    /// All axes, x first.
    pub fn iter(&self) -> impl Iterator<Item = (AxisIndex, &Axis)> {
        self.x()
            .map(|x| (AxisIndex::X, x))
            .into_iter()
            .chain(self.y().map(|y| (AxisIndex::Y, y)))
    }

    /// Set or replace an axis.
    pub fn set(&mut self, index: AxisIndex, axis: Axis) -> AppResult<()> {
        let next = match (std::mem::take(self), index) {
            (SweepAxes::NoAxes, AxisIndex::Y) => return Err(DaqError::AxisOrder),
            (SweepAxes::NoAxes | SweepAxes::OneAxis { .. }, AxisIndex::X) => {
                SweepAxes::OneAxis { x: axis }
            }
            (SweepAxes::OneAxis { x } | SweepAxes::TwoAxes { x, .. }, AxisIndex::Y) => {
                SweepAxes::TwoAxes { x, y: axis }
            }
            (SweepAxes::TwoAxes { y, .. }, AxisIndex::X) => SweepAxes::TwoAxes { x: axis, y },
        };
        *self = next;
        Ok(())
    }

    /// Exchange x and y, shadows included.
    pub fn swap(&mut self) -> AppResult<()> {
        match self {
            SweepAxes::TwoAxes { x, y } => {
                std::mem::swap(x, y);
                Ok(())
            }
            _ => Err(DaqError::NotTwoDimensional),
        }
    }

    /// Device-unit copy of every axis still in human time.
    ///
    /// Pure: `self` is untouched, so a conversion failure leaves the record as it was.
    pub fn to_device_units(
        &self,
        hardware: &HardwareMap,
        converter: &dyn ClockConverter,
    ) -> AppResult<SweepAxes> {
        let mut converted = self.clone();
        let mut changed = Vec::new();
        match &mut converted {
            SweepAxes::NoAxes => {}
            SweepAxes::OneAxis { x } => {
                if x.normalize_units(hardware, converter)? {
                    changed.push(AxisIndex::X);
                }
            }
            SweepAxes::TwoAxes { x, y } => {
                if x.normalize_units(hardware, converter)? {
                    changed.push(AxisIndex::X);
                }
                if y.normalize_units(hardware, converter)? {
                    changed.push(AxisIndex::Y);
                }
            }
        }
        for index in changed {
            info!(axis = %index, "converted sweep axis from us to clock ticks");
        }
        Ok(converted)
    }
}
