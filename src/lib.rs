//! # Sweep DAQ Core Library
//!
//! Self-describing datasets for pulsed I/Q measurements, together with the machinery that
//! turns a declarative configuration into validated, persisted sweep results.
//!
//! ## Crate Structure
//!
//! - **`dataset`**: the `DatasetRecord` and its five sections (identity, hardware map,
//!   board config, measurement config, measurement data).
//! - **`units`**: rewriting of human-time parameters (`*_us`) into device clock ticks via
//!   an injected `ClockConverter`.
//! - **`axis`**: sweep axes, the `NoAxes → OneAxis → TwoAxes` state machine and human-unit
//!   shadows.
//! - **`measurement`**: single-tone and two-tone variants and their constraints.
//! - **`preflight`**: validation of an `AcquisitionRequest` before any hardware call.
//! - **`sweep`**: the 1D/2D sweep engine and the `Acquire` collaborator trait.
//! - **`storage`**: writing and reloading records (JSON, and HDF5 with `storage_hdf5`).
//! - **`hardware`**: simulated collaborators for tests and the CLI.
//! - **`config`** / **`logging`**: settings via `figment` and `tracing` initialisation.
//! - **`error`**: the `DaqError` enum shared by every stage.

pub mod axis;
pub mod config;
pub mod dataset;
pub mod error;
pub mod hardware;
pub mod logging;
pub mod measurement;
pub mod preflight;
pub mod storage;
pub mod sweep;
pub mod units;

pub use dataset::DatasetRecord;
pub use error::{AppResult, DaqError};
pub use measurement::ToneVariant;
pub use preflight::AcquisitionRequest;
