//! Sweep engine.
//!
//! Iterates one or two axes over a working configuration, calling the acquisition
//! collaborator once per point, strictly sequentially. Results come back as
//! [`SweepResult`] in the stored orientation (`[y, x]` for 2D). Errors raised by the
//! collaborator abort the sweep immediately and are passed through unchanged.

use crate::axis::Axis;
use crate::config::SweepSettings;
use crate::dataset::config::MeasurementConfig;
use crate::dataset::data::SweepResult;
use crate::dataset::hardware::HardwareMap;
use crate::dataset::value::{Section, Value};
use crate::error::{AppResult, DaqError};
use ndarray::Array2;
use tracing::{debug, info, instrument};

/// Repetition count used for the decimated capture.
pub const DECIMATED_REPS: i64 = 1;
/// Soft-average count used for the decimated capture.
pub const DECIMATED_SOFT_AVGS: i64 = 2000;

const KEY_REPS: &str = "reps";
const KEY_SOFT_AVGS: &str = "soft_avgs";

/// One averaged in-phase/quadrature point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqPoint {
    /// In-phase component.
    pub i: f64,
    /// Quadrature component.
    pub q: f64,
}

impl IqPoint {
    /// Point from its components.
    pub fn new(i: f64, q: f64) -> Self {
        Self { i, q }
    }
}

/// The acquisition collaborator: runs one pulse program on the hardware.
///
/// Calls block until the hardware returns. Implementations must be deterministic for a
/// given configuration and hardware state and report failures as errors.
pub trait Acquire {
    /// Acquire one averaged I/Q point.
    fn acquire(&mut self, config: &Section) -> anyhow::Result<IqPoint>;

    /// Acquire raw samples in decimated mode. Row 0 is I, row 1 is Q.
    fn acquire_decimated(&mut self, config: &Section) -> anyhow::Result<Array2<f64>>;
}

/// Per-run engine options.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOptions {
    /// Truncate x values to integers before writing them into the config.
    pub x_force_int: bool,
    /// Truncate y values to integers before writing them into the config.
    pub y_force_int: bool,
    /// Capture one decimated trace after the sweep.
    pub decimated: bool,
    /// `reps` written into the config for the decimated capture.
    pub decimated_reps: i64,
    /// `soft_avgs` written into the config for the decimated capture.
    pub decimated_soft_avgs: i64,
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self {
            x_force_int: false,
            y_force_int: false,
            decimated: true,
            decimated_reps: DECIMATED_REPS,
            decimated_soft_avgs: DECIMATED_SOFT_AVGS,
        }
    }
}

impl SweepOptions {
    /// Options from the `[sweep]` settings table, with no integer coercion.
    pub fn from_settings(settings: &SweepSettings) -> Self {
        Self {
            decimated: settings.do_decimated,
            decimated_reps: settings.decimated_reps,
            decimated_soft_avgs: settings.decimated_soft_avgs,
            ..Self::default()
        }
    }
}

/// Output of one sweep run.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepOutput {
    /// I/Q results laid out as described on [`SweepResult`].
    pub result: SweepResult,
    /// Two-row trace, or a `[2, 2]` zero placeholder if none was requested.
    pub decimated_trace: Array2<f64>,
    /// Number of point acquisitions made.
    pub points: usize,
}

/// Union of the hardware map, measurement config and board config.
///
/// Later sections win on key collisions: board settings override measurement settings,
/// which override channel assignments.
pub fn merge_config(
    hardware: &HardwareMap,
    config: &MeasurementConfig,
    board: &Section,
) -> Section {
    let mut merged = hardware.to_section();
    merged.extend(config.to_section());
    merged.extend(board.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

fn sweep_value(value: f64, force_int: bool) -> Value {
    if force_int {
        Value::Int(value.trunc() as i64)
    } else {
        Value::Float(value)
    }
}

/// Run a 1D sweep over `x`.
#[instrument(skip_all, fields(axis = %x.name(), points = x.len()))]
pub fn sweep_1d(
    acquirer: &mut dyn Acquire,
    mut config: Section,
    x: &Axis,
    options: &SweepOptions,
) -> AppResult<SweepOutput> {
    info!("starting 1D sweep");
    let mut i = Vec::with_capacity(x.len());
    let mut q = Vec::with_capacity(x.len());
    for &v in x.values() {
        config.insert(x.name().to_string(), sweep_value(v, options.x_force_int));
        let point = acquirer.acquire(&config)?;
        debug!(value = v, i = point.i, q = point.q, "acquired point");
        i.push(point.i);
        q.push(point.q);
    }
    let points = i.len();
    let decimated_trace = capture_decimated(acquirer, config, options)?;
    info!(points, "1D sweep complete");
    Ok(SweepOutput {
        result: SweepResult::OneD { i, q },
        decimated_trace,
        points,
    })
}

/// Run a 2D sweep, x outer and y inner.
///
/// Points accumulate as `[x, y]` and are transposed once at the end, so the stored arrays
/// are indexed `[y, x]`.
#[instrument(skip_all, fields(x = %x.name(), y = %y.name(), points = x.len() * y.len()))]
pub fn sweep_2d(
    acquirer: &mut dyn Acquire,
    mut config: Section,
    x: &Axis,
    y: &Axis,
    options: &SweepOptions,
) -> AppResult<SweepOutput> {
    info!("starting 2D sweep");
    let mut i = Array2::<f64>::zeros((x.len(), y.len()));
    let mut q = Array2::<f64>::zeros((x.len(), y.len()));
    for (xi, &xv) in x.values().iter().enumerate() {
        config.insert(x.name().to_string(), sweep_value(xv, options.x_force_int));
        for (yi, &yv) in y.values().iter().enumerate() {
            config.insert(y.name().to_string(), sweep_value(yv, options.y_force_int));
            let point = acquirer.acquire(&config)?;
            i[[xi, yi]] = point.i;
            q[[xi, yi]] = point.q;
        }
        debug!(x = xv, "finished y sweep");
    }
    let points = i.len();
    let decimated_trace = capture_decimated(acquirer, config, options)?;
    info!(points, "2D sweep complete");
    Ok(SweepOutput {
        result: SweepResult::TwoD {
            i: i.reversed_axes(),
            q: q.reversed_axes(),
        },
        decimated_trace,
        points,
    })
}

fn capture_decimated(
    acquirer: &mut dyn Acquire,
    mut config: Section,
    options: &SweepOptions,
) -> AppResult<Array2<f64>> {
    if !options.decimated {
        return Ok(Array2::zeros((2, 2)));
    }
    config.insert(KEY_REPS.into(), Value::Int(options.decimated_reps));
    config.insert(KEY_SOFT_AVGS.into(), Value::Int(options.decimated_soft_avgs));
    let trace = acquirer.acquire_decimated(&config)?;
    if trace.nrows() != 2 {
        return Err(DaqError::Acquisition(anyhow::anyhow!(
            "decimated acquisition returned {} rows, expected 2 (I and Q)",
            trace.nrows()
        )));
    }
    debug!(samples = trace.ncols(), "captured decimated trace");
    Ok(trace)
}
