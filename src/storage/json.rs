//! JSON container backend.
//!
//! The document is one object with a member per group, each group an object of
//! `{ "dtype", "shape", "data" }` entries. JSON has no NaN or infinity, so documents
//! holding non-finite floats are refused before anything is written.

use super::codec::{StoredArray, StoredDocument};
use super::ContainerFormat;
use crate::error::{AppResult, DaqError};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Hierarchical JSON document, always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormat;

impl JsonFormat {
    /// New, empty instance.
    pub fn new() -> Self {
        Self
    }
}

impl ContainerFormat for JsonFormat {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn write_document(&self, document: &StoredDocument, path: &Path) -> AppResult<()> {
        check_finite(document)?;
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(&mut writer, document)?;
        writer.flush()?;
        Ok(())
    }

    fn read_document(&self, path: &Path) -> AppResult<StoredDocument> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}

fn check_finite(document: &StoredDocument) -> AppResult<()> {
    for (group, entries) in document {
        for (key, array) in entries {
            if let StoredArray::Float { data, .. } = array {
                if let Some(index) = data.iter().position(|v| !v.is_finite()) {
                    return Err(DaqError::Storage(format!(
                        "'{group}/{key}' holds {} at index {index}; JSON cannot store non-finite values",
                        data[index]
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::codec::StoredGroup;
    use tempfile::tempdir;

    #[test]
    fn document_survives_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut group = StoredGroup::new();
        group.insert(
            "x_sweep_values".into(),
            StoredArray::Float {
                shape: vec![3],
                data: vec![0.1, 0.2, 0.30000000000000004],
            },
        );
        let mut document = StoredDocument::new();
        document.insert("measurement_data".into(), group);

        JsonFormat.write_document(&document, &path).unwrap();
        assert_eq!(JsonFormat.read_document(&path).unwrap(), document);
    }

    #[test]
    fn non_finite_values_are_refused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nan.json");
        let mut group = StoredGroup::new();
        group.insert(
            "result_i".into(),
            StoredArray::Float {
                shape: vec![2],
                data: vec![1.0, f64::NAN],
            },
        );
        let mut document = StoredDocument::new();
        document.insert("measurement_data".into(), group);

        let err = JsonFormat.write_document(&document, &path).unwrap_err();
        assert!(matches!(err, DaqError::Storage(_)));
        assert!(err.to_string().contains("measurement_data/result_i"));
        assert!(!path.exists());
    }

    #[test]
    fn malformed_file_is_a_json_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFormat.read_document(&path),
            Err(DaqError::Json(_))
        ));
    }
}
