//! Shared collaborators for integration tests.
#![allow(dead_code)]

use ndarray::Array2;
use sweep_daq::dataset::value::Section;
use sweep_daq::sweep::{Acquire, IqPoint};

/// Answers `i = config[x]` and `q = config[y]`, or `q = -config[x]` without a y axis.
pub struct Probe {
    pub x: String,
    pub y: Option<String>,
    pub calls: usize,
    pub decimated_calls: usize,
}

impl Probe {
    pub fn one_d(x: &str) -> Self {
        Self {
            x: x.to_string(),
            y: None,
            calls: 0,
            decimated_calls: 0,
        }
    }

    pub fn two_d(x: &str, y: &str) -> Self {
        Self {
            y: Some(y.to_string()),
            ..Self::one_d(x)
        }
    }
}

impl Acquire for Probe {
    fn acquire(&mut self, config: &Section) -> anyhow::Result<IqPoint> {
        self.calls += 1;
        let value = |key: &str| {
            config
                .get(key)
                .and_then(|v| v.as_f64())
                .ok_or_else(|| anyhow::anyhow!("{key} missing from config"))
        };
        let x = value(&self.x)?;
        match &self.y {
            Some(y) => Ok(IqPoint::new(x, value(y)?)),
            None => Ok(IqPoint::new(x, -x)),
        }
    }

    fn acquire_decimated(&mut self, _config: &Section) -> anyhow::Result<Array2<f64>> {
        self.decimated_calls += 1;
        Ok(Array2::from_shape_fn((2, 16), |(row, k)| {
            if row == 0 {
                k as f64
            } else {
                -(k as f64)
            }
        }))
    }
}

/// 100 ticks per microsecond on every channel.
pub fn hundred_mhz(us: f64, _channel: Option<u32>) -> anyhow::Result<i64> {
    Ok((us * 100.0).round() as i64)
}
