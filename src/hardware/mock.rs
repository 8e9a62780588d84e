//! Mock Hardware Implementations
//!
//! Simulated collaborators for running sweeps without a board attached.
//!
//! # Available Mocks
//!
//! - `MockResonator` - Acquisition collaborator modelling a notch-type readout resonator
//! - `LinearClock` - Clock converter with a fixed tick rate per channel
//!
//! # Determinism
//!
//! Noise is seeded from the configuration the mock is called with, so identical
//! configurations always produce identical samples.

use crate::dataset::value::{Section, Value};
use crate::sweep::{Acquire, IqPoint};
use crate::units::ClockConverter;
use anyhow::{bail, Result};
use ndarray::Array2;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

/// Config key holding the readout frequency in MHz.
pub const KEY_RES_FREQ: &str = "res_freq";
/// Config key holding the readout window in clock ticks.
pub const KEY_READOUT_LENGTH: &str = "readout_length";

const DEFAULT_TRACE_SAMPLES: usize = 200;
const MAX_TRACE_SAMPLES: usize = 4096;

// =============================================================================
// MockResonator - Simulated readout resonator
// =============================================================================

/// Mock readout resonator
///
/// Transmission follows a notch lineshape centred at `center_mhz`:
///
/// ```text
/// S21(f) = 1 - depth * (κ/2) / (κ/2 + j (f - f0))
/// ```
///
/// The returned point is `amplitude * S21` split into I and Q, plus uniform noise.
///
/// # Example
///
/// ```rust
/// use sweep_daq::hardware::mock::MockResonator;
/// use sweep_daq::sweep::Acquire;
/// use sweep_daq::dataset::value::{Section, Value};
///
/// let mut resonator = MockResonator::new(6000.0, 0.5).with_noise(0.0);
/// let mut config = Section::new();
/// config.insert("res_freq".into(), Value::Float(6000.0));
/// let point = resonator.acquire(&config)?;
/// assert!(point.i.abs() < 0.2);
/// # Ok::<(), anyhow::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct MockResonator {
    center_mhz: f64,
    linewidth_mhz: f64,
    depth: f64,
    amplitude: f64,
    noise: f64,
    acquisitions: usize,
}

impl MockResonator {
    /// Create a resonator at `center_mhz` with full linewidth `linewidth_mhz`.
    pub fn new(center_mhz: f64, linewidth_mhz: f64) -> Self {
        Self {
            center_mhz,
            linewidth_mhz,
            depth: 0.9,
            amplitude: 1.0,
            noise: 0.01,
            acquisitions: 0,
        }
    }

    /// Peak-to-peak noise added to each quadrature.
    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise;
        self
    }

    /// Fractional dip depth at resonance.
    pub fn with_depth(mut self, depth: f64) -> Self {
        self.depth = depth;
        self
    }

    /// Off-resonance signal amplitude.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Number of point and decimated acquisitions served so far.
    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    fn transmission(&self, freq_mhz: f64) -> Complex64 {
        let half = Complex64::new(self.linewidth_mhz / 2.0, 0.0);
        let detuning = Complex64::new(0.0, freq_mhz - self.center_mhz);
        Complex64::new(1.0, 0.0) - self.depth * half / (half + detuning)
    }

    fn frequency(&self, config: &Section) -> Result<f64> {
        match config.get(KEY_RES_FREQ) {
            None => Ok(self.center_mhz),
            Some(value) => match value.as_f64() {
                Some(f) if f.is_finite() => Ok(f),
                _ => bail!("{KEY_RES_FREQ} must be a finite number, got {value}"),
            },
        }
    }

    fn noise_source(&self, config: &Section) -> StdRng {
        StdRng::seed_from_u64(config_seed(config))
    }

    fn jitter(&self, rng: &mut StdRng) -> f64 {
        if self.noise > 0.0 {
            rng.gen_range(-self.noise / 2.0..self.noise / 2.0)
        } else {
            0.0
        }
    }
}

impl Acquire for MockResonator {
    fn acquire(&mut self, config: &Section) -> Result<IqPoint> {
        let s21 = self.amplitude * self.transmission(self.frequency(config)?);
        let mut rng = self.noise_source(config);
        self.acquisitions += 1;
        Ok(IqPoint::new(
            s21.re + self.jitter(&mut rng),
            s21.im + self.jitter(&mut rng),
        ))
    }

    fn acquire_decimated(&mut self, config: &Section) -> Result<Array2<f64>> {
        let samples = match config.get(KEY_READOUT_LENGTH).and_then(Value::as_i64) {
            Some(n) if n > 0 => (n as usize).min(MAX_TRACE_SAMPLES),
            Some(n) => bail!("{KEY_READOUT_LENGTH} must be positive, got {n}"),
            None => DEFAULT_TRACE_SAMPLES,
        };
        let s21 = self.amplitude * self.transmission(self.frequency(config)?);
        let mut rng = self.noise_source(config);
        let rise = samples as f64 / 10.0;

        let mut trace = Array2::zeros((2, samples));
        for k in 0..samples {
            let envelope = 1.0 - (-(k as f64) / rise).exp();
            trace[[0, k]] = envelope * s21.re + self.jitter(&mut rng);
            trace[[1, k]] = envelope * s21.im + self.jitter(&mut rng);
        }
        self.acquisitions += 1;
        Ok(trace)
    }
}

/// FNV-1a over the rendered configuration.
fn config_seed(config: &Section) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    config
        .iter()
        .flat_map(|(k, v)| {
            let mut bytes = k.as_bytes().to_vec();
            bytes.extend(v.to_string().into_bytes());
            bytes
        })
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

// =============================================================================
// LinearClock - Fixed-rate clock converter
// =============================================================================

/// Clock converter with a fixed tick rate, optionally overridden per channel.
///
/// `ticks = round(value_us * rate_mhz)`. Negative or non-finite durations are rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearClock {
    default_mhz: f64,
    per_channel: HashMap<u32, f64>,
}

impl Default for LinearClock {
    /// 430.08 MHz fabric clock.
    fn default() -> Self {
        Self::new(430.08)
    }
}

impl LinearClock {
    /// Clock running at `default_mhz` on every channel.
    pub fn new(default_mhz: f64) -> Self {
        Self {
            default_mhz,
            per_channel: HashMap::new(),
        }
    }

    /// Use `rate_mhz` for `channel`.
    pub fn with_channel(mut self, channel: u32, rate_mhz: f64) -> Self {
        self.per_channel.insert(channel, rate_mhz);
        self
    }

    /// Clock rate for `channel`, or the default.
    pub fn rate_mhz(&self, channel: Option<u32>) -> f64 {
        channel
            .and_then(|ch| self.per_channel.get(&ch).copied())
            .unwrap_or(self.default_mhz)
    }
}

impl ClockConverter for LinearClock {
    fn to_device_ticks(&self, value_us: f64, channel: Option<u32>) -> Result<i64> {
        if !value_us.is_finite() || value_us < 0.0 {
            bail!("duration must be a finite, non-negative number of microseconds, got {value_us}");
        }
        Ok((value_us * self.rate_mhz(channel)).round() as i64)
    }
}
