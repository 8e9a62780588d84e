//! Measurement data section: sweep axes, accumulated I/Q results and the decimated trace.

use super::identity::SweepType;
use super::value::{require_floats, require_text, Section, Value};
use crate::axis::{Axis, AxisIndex, HumanShadow, SweepAxes};
use crate::error::{AppResult, DaqError};
use ndarray::Array2;
use num_complex::Complex64;
use tracing::{info, warn};

/// `result_i`
pub const KEY_RESULT_I: &str = "result_i";
/// `result_q`
pub const KEY_RESULT_Q: &str = "result_q";
/// `decimated_trace`
pub const KEY_DECIMATED_TRACE: &str = "decimated_trace";

/// `x_sweep_values` / `y_sweep_values`
pub fn values_key(index: AxisIndex) -> String {
    format!("{}_sweep_values", index.prefix())
}

/// `x_sweep_name` / `y_sweep_name`
pub fn name_key(index: AxisIndex) -> String {
    format!("{}_sweep_name", index.prefix())
}

/// Key of the human-unit shadow values.
pub fn human_values_key(index: AxisIndex) -> String {
    format!("{}_sweep_values_human", index.prefix())
}

/// Key of the human-unit shadow name.
pub fn human_name_key(index: AxisIndex) -> String {
    format!("{}_sweep_name_human", index.prefix())
}

/// `is_<x|y>_sweep_human` marker key.
pub fn human_marker_key(index: AxisIndex) -> String {
    format!("is_{}_sweep_human", index.prefix())
}

fn is_reserved(key: &str) -> bool {
    if [KEY_RESULT_I, KEY_RESULT_Q, KEY_DECIMATED_TRACE].contains(&key) {
        return true;
    }
    [AxisIndex::X, AxisIndex::Y].into_iter().any(|index| {
        key == values_key(index)
            || key == name_key(index)
            || key == human_values_key(index)
            || key == human_name_key(index)
            || key == human_marker_key(index)
    })
}

/// Accumulated in-phase/quadrature results.
///
/// 2D arrays are indexed `[y, x]`: rows follow the y axis, columns the x axis.
#[derive(Debug, Clone, PartialEq)]
pub enum SweepResult {
    OneD { i: Vec<f64>, q: Vec<f64> },
    TwoD { i: Array2<f64>, q: Array2<f64> },
}

impl SweepResult {
    /// Dimensionality of the result.
    pub fn sweep_type(&self) -> SweepType {
        match self {
            SweepResult::OneD { .. } => SweepType::OneD,
            SweepResult::TwoD { .. } => SweepType::TwoD,
        }
    }

    /// `[n]` for 1D, `[len(y), len(x)]` for 2D.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            SweepResult::OneD { i, .. } => vec![i.len()],
            SweepResult::TwoD { i, .. } => i.shape().to_vec(),
        }
    }

    fn iq(&self) -> Vec<Complex64> {
        match self {
            SweepResult::OneD { i, q } => {
                i.iter().zip(q).map(|(i, q)| Complex64::new(*i, *q)).collect()
            }
            SweepResult::TwoD { i, q } => {
                i.iter().zip(q.iter()).map(|(i, q)| Complex64::new(*i, *q)).collect()
            }
        }
    }

    /// |I + jQ| in row-major order.
    pub fn magnitude(&self) -> Vec<f64> {
        self.iq().iter().map(|z| z.norm()).collect()
    }

    /// arg(I + jQ) in radians, row-major order.
    pub fn phase(&self) -> Vec<f64> {
        self.iq().iter().map(|z| z.arg()).collect()
    }

    fn transpose(&mut self) {
        if let SweepResult::TwoD { i, q } = self {
            *i = i.t().to_owned();
            *q = q.t().to_owned();
        }
    }
}

/// The measurement data section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementData {
    axes: SweepAxes,
    result: Option<SweepResult>,
    decimated_trace: Option<Array2<f64>>,
    extra: Section,
}

impl MeasurementData {
    /// New, empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current axes.
    pub fn axes(&self) -> &SweepAxes {
        &self.axes
    }

    /// 0, 1 or 2, decided by which axes are present.
    pub fn dimensionality(&self) -> usize {
        self.axes.dimensionality()
    }

    /// Set one axis. Refused while results are held, since they were measured on the
    /// current axes; call [`MeasurementData::clear_results`] first.
    pub fn set_axis(&mut self, index: AxisIndex, axis: Axis) -> AppResult<()> {
        if self.has_results() {
            return Err(DaqError::StaleData {
                key: KEY_RESULT_I.to_string(),
            });
        }
        self.axes.set(index, axis)
    }

    pub(crate) fn replace_axes(&mut self, axes: SweepAxes) {
        self.axes = axes;
    }

    /// Swap x and y, transposing any 2D result so `[y, x]` indexing still holds.
    pub fn swap_axes(&mut self) -> AppResult<()> {
        if matches!(self.result, Some(SweepResult::OneD { .. })) {
            return Err(DaqError::NotTwoDimensional);
        }
        self.axes.swap()?;
        match &mut self.result {
            Some(result) => {
                info!("swapping x and y data");
                result.transpose();
            }
            None => warn!("no results found, reorienting axes only"),
        }
        Ok(())
    }

    /// Drop the results and decimated trace, keeping axes and extras.
    pub fn clear_results(&mut self) {
        if self.result.take().is_some() {
            info!("clearing measurement results");
        }
        self.decimated_trace = None;
    }

    /// Results, if a sweep has completed.
    pub fn result(&self) -> Option<&SweepResult> {
        self.result.as_ref()
    }

    /// True once a sweep has stored results.
    pub fn has_results(&self) -> bool {
        self.result.is_some()
    }

    /// Two-row I/Q trace, or the `[2, 2]` placeholder.
    pub fn decimated_trace(&self) -> Option<&Array2<f64>> {
        self.decimated_trace.as_ref()
    }

    pub(crate) fn set_results(&mut self, result: SweepResult, decimated_trace: Array2<f64>) {
        self.result = Some(result);
        self.decimated_trace = Some(decimated_trace);
    }

    /// Free-form entries besides the reserved axis/result keys.
    pub fn extra(&self) -> &Section {
        &self.extra
    }

    /// Store a free-form entry. Reserved keys go through the typed API instead.
    pub fn insert_extra(&mut self, key: &str, value: impl Into<Value>) -> AppResult<()> {
        if is_reserved(key) {
            return Err(DaqError::configuration(key, "reserved measurement data key"));
        }
        self.extra.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Flatten into a storable section using the reserved key names.
    pub fn to_section(&self) -> Section {
        let mut section = self.extra.clone();
        for (index, axis) in self.axes.iter() {
            section.insert(values_key(index), Value::Floats(axis.values().to_vec()));
            section.insert(name_key(index), Value::Text(axis.name().to_string()));
            if let Some(shadow) = axis.human() {
                section.insert(human_values_key(index), Value::Floats(shadow.values.clone()));
                section.insert(human_name_key(index), Value::Text(shadow.name.clone()));
                section.insert(human_marker_key(index), Value::Int(1));
            }
        }
        match &self.result {
            Some(SweepResult::OneD { i, q }) => {
                section.insert(KEY_RESULT_I.into(), Value::Floats(i.clone()));
                section.insert(KEY_RESULT_Q.into(), Value::Floats(q.clone()));
            }
            Some(SweepResult::TwoD { i, q }) => {
                section.insert(KEY_RESULT_I.into(), Value::Matrix(i.clone()));
                section.insert(KEY_RESULT_Q.into(), Value::Matrix(q.clone()));
            }
            None => {}
        }
        if let Some(trace) = &self.decimated_trace {
            section.insert(KEY_DECIMATED_TRACE.into(), Value::Matrix(trace.clone()));
        }
        section
    }

    /// Rebuild from a stored section.
    pub fn from_section(section: &Section) -> AppResult<Self> {
        let mut data = Self::new();
        if let Some(x) = read_axis(section, AxisIndex::X)? {
            data.axes.set(AxisIndex::X, x)?;
        }
        if let Some(y) = read_axis(section, AxisIndex::Y)? {
            data.axes.set(AxisIndex::Y, y).map_err(|_| {
                DaqError::configuration(values_key(AxisIndex::Y), "y axis stored without an x axis")
            })?;
        }
        data.result = read_result(section, &data.axes)?;
        if let Some(value) = section.get(KEY_DECIMATED_TRACE) {
            let trace = value.as_matrix().ok_or_else(|| {
                DaqError::configuration(KEY_DECIMATED_TRACE, "expected a 2-row array")
            })?;
            data.decimated_trace = Some(trace.clone());
        }
        data.extra = section
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Ok(data)
    }
}

fn read_axis(section: &Section, index: AxisIndex) -> AppResult<Option<Axis>> {
    if !section.contains_key(&values_key(index)) {
        return Ok(None);
    }
    let values = require_floats(section, &values_key(index))?;
    let name = require_text(section, &name_key(index))?;
    if !section.contains_key(&human_marker_key(index)) {
        return Ok(Some(Axis::new(name, values)));
    }
    let shadow = HumanShadow {
        name: require_text(section, &human_name_key(index))?,
        values: require_floats(section, &human_values_key(index))?,
    };
    Ok(Some(Axis::with_shadow(name, values, shadow)))
}

fn read_result(section: &Section, axes: &SweepAxes) -> AppResult<Option<SweepResult>> {
    let (i, q) = match (section.get(KEY_RESULT_I), section.get(KEY_RESULT_Q)) {
        (None, None) => return Ok(None),
        (Some(i), Some(q)) => (i, q),
        (None, Some(_)) => return Err(DaqError::configuration(KEY_RESULT_I, "missing")),
        (Some(_), None) => return Err(DaqError::configuration(KEY_RESULT_Q, "missing")),
    };

    let result = match (i.as_matrix(), q.as_matrix()) {
        (Some(i), Some(q)) => {
            if i.shape() != q.shape() {
                return Err(DaqError::configuration(KEY_RESULT_Q, "shape differs from result_i"));
            }
            let (Some(x), Some(y)) = (axes.x(), axes.y()) else {
                return Err(DaqError::configuration(
                    KEY_RESULT_I,
                    "2D result stored without two axes",
                ));
            };
            if i.shape() != [y.len(), x.len()] {
                return Err(DaqError::configuration(
                    KEY_RESULT_I,
                    format!(
                        "shape {:?} does not match [len(y), len(x)] = [{}, {}]",
                        i.shape(),
                        y.len(),
                        x.len()
                    ),
                ));
            }
            SweepResult::TwoD {
                i: i.clone(),
                q: q.clone(),
            }
        }
        _ => {
            let i = require_floats(section, KEY_RESULT_I)?;
            let q = require_floats(section, KEY_RESULT_Q)?;
            if i.len() != q.len() {
                return Err(DaqError::configuration(KEY_RESULT_Q, "length differs from result_i"));
            }
            match (axes.x(), axes.y()) {
                (Some(x), None) if x.len() == i.len() => {}
                _ => {
                    return Err(DaqError::configuration(
                        KEY_RESULT_I,
                        format!("1D result of length {} does not match the stored axes", i.len()),
                    ))
                }
            }
            SweepResult::OneD { i, q }
        }
    };
    Ok(Some(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_d() -> MeasurementData {
        let mut data = MeasurementData::new();
        data.set_axis(AxisIndex::X, Axis::new("res_freq", vec![1.0, 2.0, 3.0]))
            .unwrap();
        data.set_axis(
            AxisIndex::Y,
            Axis::with_shadow(
                "relax_delay",
                vec![10.0, 20.0],
                HumanShadow {
                    name: "relax_delay_us".into(),
                    values: vec![1.0, 2.0],
                },
            ),
        )
        .unwrap();
        data.set_results(
            SweepResult::TwoD {
                i: array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
                q: array![[-1.0, -2.0, -3.0], [-4.0, -5.0, -6.0]],
            },
            Array2::zeros((2, 2)),
        );
        data
    }

    #[test]
    fn swap_transposes_and_moves_shadow() {
        let mut data = two_d();
        data.swap_axes().unwrap();
        assert_eq!(data.axes().x().unwrap().name(), "relax_delay");
        assert_eq!(data.axes().x().unwrap().human().unwrap().name, "relax_delay_us");
        assert!(data.axes().y().unwrap().human().is_none());
        match data.result().unwrap() {
            SweepResult::TwoD { i, .. } => {
                assert_eq!(i.shape(), &[3, 2]);
                assert_eq!(i[[2, 1]], 6.0);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn section_round_trip() {
        let mut data = two_d();
        data.insert_extra("notes", "cooldown 3").unwrap();
        let section = data.to_section();
        assert_eq!(section.get("is_y_sweep_human"), Some(&Value::Int(1)));
        assert!(!section.contains_key("is_x_sweep_human"));
        assert_eq!(MeasurementData::from_section(&section).unwrap(), data);
    }

    #[test]
    fn reserved_keys_are_not_extras() {
        let mut data = MeasurementData::new();
        let err = data.insert_extra("result_i", 1.0).unwrap_err();
        assert_eq!(err.offending_field(), Some("result_i"));
        assert!(data.insert_extra("x_sweep_values_human", 1.0).is_err());
    }

    #[test]
    fn mismatched_result_shape_is_rejected() {
        let mut section = two_d().to_section();
        section.insert(KEY_RESULT_I.into(), Value::Matrix(Array2::zeros((3, 2))));
        section.insert(KEY_RESULT_Q.into(), Value::Matrix(Array2::zeros((3, 2))));
        assert!(MeasurementData::from_section(&section).is_err());
    }

    #[test]
    fn y_without_x_is_rejected() {
        let mut section = Section::new();
        section.insert("y_sweep_values".into(), Value::Floats(vec![1.0]));
        section.insert("y_sweep_name".into(), Value::from("res_gain"));
        let err = MeasurementData::from_section(&section).unwrap_err();
        assert_eq!(err.offending_field(), Some("y_sweep_values"));
    }

    #[test]
    fn axes_are_frozen_while_results_exist() {
        let mut data = two_d();
        let err = data
            .set_axis(AxisIndex::X, Axis::new("res_freq", vec![1.0; 5]))
            .unwrap_err();
        assert!(matches!(err, DaqError::StaleData { .. }));
        assert_eq!(err.offending_field(), Some("result_i"));
        assert_eq!(data.axes().x().unwrap().len(), 3);

        data.clear_results();
        assert!(data.decimated_trace().is_none());
        data.set_axis(AxisIndex::X, Axis::new("res_freq", vec![1.0; 5]))
            .unwrap();
        assert_eq!(data.axes().x().unwrap().len(), 5);
    }

    #[test]
    fn one_d_results_cannot_be_swapped() {
        let mut data = MeasurementData::new();
        data.set_axis(AxisIndex::X, Axis::new("res_freq", vec![1.0, 2.0, 3.0]))
            .unwrap();
        data.set_results(
            SweepResult::OneD {
                i: vec![1.0, 2.0, 3.0],
                q: vec![0.0; 3],
            },
            Array2::zeros((2, 2)),
        );
        assert!(matches!(
            data.set_axis(AxisIndex::Y, Axis::new("res_gain", vec![1.0; 5])),
            Err(DaqError::StaleData { .. })
        ));
        assert!(matches!(data.swap_axes(), Err(DaqError::NotTwoDimensional)));
    }

    #[test]
    fn one_d_result_must_match_x_axis() {
        let mut section = Section::new();
        section.insert("x_sweep_values".into(), Value::Floats(vec![1.0, 2.0]));
        section.insert("x_sweep_name".into(), Value::from("res_freq"));
        section.insert(KEY_RESULT_I.into(), Value::Floats(vec![1.0, 2.0, 3.0]));
        section.insert(KEY_RESULT_Q.into(), Value::Floats(vec![1.0, 2.0, 3.0]));
        let err = MeasurementData::from_section(&section).unwrap_err();
        assert_eq!(err.offending_field(), Some("result_i"));
    }

    #[test]
    fn magnitude_and_phase() {
        let result = SweepResult::OneD {
            i: vec![3.0, 0.0],
            q: vec![4.0, 1.0],
        };
        assert_eq!(result.magnitude(), vec![5.0, 1.0]);
        assert!((result.phase()[1] - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }
}
