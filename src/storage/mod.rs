//! Persistence of dataset records.
//!
//! A record is written as a hierarchical container with one group per section (see
//! [`codec::GROUP_NAMES`]). The container format follows the file extension; JSON is
//! always available and HDF5 is behind the `storage_hdf5` feature.
//!
//! Reading is lenient about structure: a file missing one of the five groups (or holding
//! groups nobody expects) is still loaded, and the discrepancy is reported as a
//! [`StructuralMismatch`] warning on the returned record.

pub mod codec;
#[cfg(feature = "storage_hdf5")]
pub mod hdf5;
pub mod json;
pub mod registry;

use crate::dataset::config::MeasurementConfig;
use crate::dataset::data::MeasurementData;
use crate::dataset::hardware::HardwareMap;
use crate::dataset::identity::Identity;
use crate::dataset::value::Section;
use crate::dataset::DatasetRecord;
use crate::error::{AppResult, DaqError};
use crate::measurement::ToneVariant;
use codec::{StoredDocument, GROUP_NAMES};
use registry::FormatRegistry;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default container extension.
pub const DEFAULT_FORMAT: &str = "json";

/// A container backend.
pub trait ContainerFormat {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;

    /// Write a complete document to `path`, replacing any existing file.
    fn write_document(&self, document: &StoredDocument, path: &Path) -> AppResult<()>;

    /// Read a complete document from `path`.
    fn read_document(&self, path: &Path) -> AppResult<StoredDocument>;
}

/// Non-fatal warning raised when a reloaded file does not have the expected groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuralMismatch {
    /// Expected groups absent from the file.
    pub missing: Vec<String>,
    /// Groups present in the file but not part of a record.
    pub unexpected: Vec<String>,
}

impl fmt::Display for StructuralMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "missing metadata or unexpected file structure")?;
        if !self.missing.is_empty() {
            write!(f, "; missing groups: {}", self.missing.join(", "))?;
        }
        if !self.unexpected.is_empty() {
            write!(f, "; unexpected groups: {}", self.unexpected.join(", "))?;
        }
        Ok(())
    }
}

/// `<series>_<measurement_type>.<extension>`
pub fn output_filename(record: &DatasetRecord, extension: &str) -> String {
    let measurement_type = match record.identity().measurement_type.as_str() {
        "" => record.variant().name(),
        other => other,
    };
    format!(
        "{}_{}.{}",
        record.identity().series(),
        measurement_type,
        extension.trim_start_matches('.')
    )
}

/// Write `record` into directory `dir`, creating it if needed. Returns the file path.
pub fn write(record: &DatasetRecord, dir: &Path, format: &str) -> AppResult<PathBuf> {
    if !dir.is_absolute() {
        return Err(DaqError::invalid_path(
            dir.display().to_string(),
            "relative path; provide an absolute data path",
        ));
    }
    let container = FormatRegistry::new().create(format)?;
    if !dir.exists() {
        info!(path = %dir.display(), "data path does not exist yet, creating it");
        std::fs::create_dir_all(dir)?;
    }
    let path = dir.join(output_filename(record, container.extension()));

    let document: StoredDocument = record
        .to_sections()
        .into_iter()
        .map(|(group, section)| (group.to_string(), codec::encode_section(&section)))
        .collect();
    container.write_document(&document, &path)?;
    info!(path = %path.display(), "saved dataset");
    Ok(path)
}

/// Reload a record written by [`write`].
///
/// Fails with [`DaqError::InvalidPath`] if `dir` or the file does not exist.
pub fn read(dir: impl AsRef<Path>, filename: &str, variant: ToneVariant) -> AppResult<DatasetRecord> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Err(DaqError::invalid_path(
            dir.display().to_string(),
            "data path does not exist",
        ));
    }
    let path = dir.join(filename);
    if !path.is_file() {
        return Err(DaqError::invalid_path(
            path.display().to_string(),
            "file does not exist",
        ));
    }
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or(DEFAULT_FORMAT);
    let container = FormatRegistry::new().create(extension)?;
    info!(path = %path.display(), "reading dataset");
    let mut document = container.read_document(&path)?;

    let mismatch = check_structure(&document);
    if let Some(mismatch) = &mismatch {
        warn!(path = %path.display(), "{mismatch}. Proceed with caution");
    }

    let mut take = |group: &str| -> AppResult<Option<Section>> {
        document
            .remove(group)
            .map(|stored| codec::decode_group(&stored))
            .transpose()
    };
    let identity = match take(codec::GROUP_IDENTITY)? {
        Some(section) => Identity::from_section(&section)?,
        None => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            warn!(series = stem, "identity group missing, using file name as series");
            Identity::with_series(stem)
        }
    };
    let hardware = match take(codec::GROUP_HARDWARE_MAP)? {
        Some(section) => HardwareMap::from_section(&section)?,
        None => HardwareMap::new(),
    };
    let board = take(codec::GROUP_BOARD_CONFIG)?.unwrap_or_default();
    let config = match take(codec::GROUP_MEASUREMENT_CONFIG)? {
        Some(section) => MeasurementConfig::from_section(&section)?,
        None => MeasurementConfig::new(),
    };
    let data = match take(codec::GROUP_MEASUREMENT_DATA)? {
        Some(section) => MeasurementData::from_section(&section)?,
        None => MeasurementData::new(),
    };

    Ok(DatasetRecord::from_parts(
        variant,
        identity,
        hardware,
        board,
        config,
        data,
        mismatch.into_iter().collect(),
    ))
}

fn check_structure(document: &StoredDocument) -> Option<StructuralMismatch> {
    let missing: Vec<String> = GROUP_NAMES
        .iter()
        .filter(|group| !document.contains_key(**group))
        .map(|group| group.to_string())
        .collect();
    let unexpected: Vec<String> = document
        .keys()
        .filter(|group| !GROUP_NAMES.contains(&group.as_str()))
        .cloned()
        .collect();
    if missing.is_empty() && unexpected.is_empty() {
        None
    } else {
        Some(StructuralMismatch {
            missing,
            unexpected,
        })
    }
}
