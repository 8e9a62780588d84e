//! CLI Entry Point for sweep_daq
//!
//! Provides a command-line interface for:
//! - Running a simulated resonator sweep and saving the dataset
//! - Inspecting a saved dataset
//!
//! # Usage
//!
//! Simulate a 1D frequency sweep:
//! ```bash
//! sweep_daq simulate --points 101 --out /data/cooldown_7
//! ```
//!
//! Inspect a saved file:
//! ```bash
//! sweep_daq inspect /data/cooldown_7 20240501_120000_res_spec.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use sweep_daq::config::{Settings, DEFAULT_CONFIG_PATH};
use sweep_daq::dataset::hardware::{ChannelSlot, HardwareMap};
use sweep_daq::dataset::DatasetRecord;
use sweep_daq::hardware::mock::{LinearClock, MockResonator};
use sweep_daq::sweep::SweepOptions;
use sweep_daq::{logging, storage, AcquisitionRequest, ToneVariant};
use tracing::info;

const RESONATOR_MHZ: f64 = 6000.0;
const LINEWIDTH_MHZ: f64 = 0.5;

#[derive(Parser)]
#[command(name = "sweep_daq")]
#[command(about = "Sweep acquisition and self-describing datasets", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a sweep against the simulated resonator and save it
    Simulate {
        /// Settings file
        #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
        config: PathBuf,

        /// Output directory (defaults to storage.data_dir)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Points along the frequency axis
        #[arg(long, default_value_t = 101)]
        points: usize,

        /// Add a relax-delay axis and run a 2D sweep
        #[arg(long)]
        two_d: bool,
    },

    /// Reload a saved dataset and print a summary
    Inspect {
        /// Directory holding the file
        dir: PathBuf,

        /// File name inside the directory
        filename: String,

        /// Load as a two-tone measurement
        #[arg(long)]
        two_tone: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            config,
            out,
            points,
            two_d,
        } => simulate(&config, out, points, two_d),
        Commands::Inspect {
            dir,
            filename,
            two_tone,
        } => {
            logging::init(logging::LoggingConfig::default())?;
            let variant = if two_tone {
                ToneVariant::TwoTone
            } else {
                ToneVariant::SingleTone
            };
            inspect(&dir, &filename, variant)
        }
    }
}

fn absolute(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(std::env::current_dir()
            .context("cannot resolve relative output directory")?
            .join(path))
    }
}

fn simulate(config_path: &Path, out: Option<PathBuf>, points: usize, two_d: bool) -> Result<()> {
    let settings = Settings::load_from(config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;
    settings.validate()?;
    logging::init_from_settings(&settings)?;

    let mut record = DatasetRecord::new(ToneVariant::SingleTone);
    record.set_identity("mock", vec![1], "res_spec");
    record.set_hardware_map(
        HardwareMap::new()
            .with(ChannelSlot::Readout, 6)
            .with(ChannelSlot::Adc, 0),
    );
    *record.measurement_config_mut() = settings.measurement_config()?;
    *record.board_config_mut() = settings.board_config()?;
    if !record.measurement_config().contains_key("readout_length_us")
        && !record.measurement_config().contains_key("readout_length")
    {
        record.measurement_config_mut().insert("readout_length_us", 0.5)?;
    }

    record.set_axis(points, RESONATOR_MHZ - 2.0, RESONATOR_MHZ + 2.0, "res_freq", 1)?;
    let request = if two_d {
        record.set_axis(5, 1.0, 5.0, "relax_delay_us", 2)?;
        AcquisitionRequest::two_d()
    } else {
        AcquisitionRequest::one_d()
    };
    let out = absolute(out.unwrap_or_else(|| settings.storage.data_dir.clone()))?;
    let request = request
        .with_options(SweepOptions::from_settings(&settings.sweep))
        .format(settings.storage.format.clone())
        .save_to(out);

    let mut resonator = MockResonator::new(RESONATOR_MHZ, LINEWIDTH_MHZ);
    let report = record.acquire(&mut resonator, &LinearClock::default(), &request)?;
    info!(points = report.points, "simulation finished");

    println!("{record}");
    if let Some(path) = report.saved_to {
        println!("saved {}", path.display());
    }
    Ok(())
}

fn inspect(dir: &Path, filename: &str, variant: ToneVariant) -> Result<()> {
    let record = storage::read(dir, filename, variant)?;
    println!("{record}");

    for (index, axis) in record.data().axes().iter() {
        let (name, values) = axis.display();
        let first = values.first().copied().unwrap_or(f64::NAN);
        let last = values.last().copied().unwrap_or(f64::NAN);
        println!(
            "  {index} axis: {name} ({} points, {first} .. {last})",
            values.len()
        );
    }
    match record.data().result() {
        Some(result) => {
            let magnitude = result.magnitude();
            let min = magnitude.iter().copied().fold(f64::INFINITY, f64::min);
            println!(
                "  {} result, shape {:?}, min |S21| = {min:.4}",
                result.sweep_type(),
                result.shape()
            );
        }
        None => println!("  no results"),
    }
    for warning in record.warnings() {
        println!("  warning: {warning}");
    }
    Ok(())
}
