//! HDF5 container backend.
//!
//! One group per section and one dataset per entry. Strings are variable-length UTF-8,
//! integers `i64`, everything else `f64` with the entry's shape.

use super::codec::{StoredArray, StoredDocument, StoredGroup};
use super::ContainerFormat;
use crate::error::{AppResult, DaqError};
use hdf5::types::{TypeDescriptor, VarLenUnicode};
use hdf5::{Dataset, File, Group};
use std::path::Path;
use tracing::debug;

fn storage_err(e: hdf5::Error) -> DaqError {
    DaqError::Storage(e.to_string())
}

/// HDF5 file via the `hdf5` crate (feature `storage_hdf5`).
#[derive(Debug, Default, Clone, Copy)]
pub struct Hdf5Format;

impl Hdf5Format {
    /// New, empty instance.
    pub fn new() -> Self {
        Self
    }
}

impl ContainerFormat for Hdf5Format {
    fn extension(&self) -> &'static str {
        "h5"
    }

    fn write_document(&self, document: &StoredDocument, path: &Path) -> AppResult<()> {
        let file = File::create(path).map_err(storage_err)?;
        for (group_name, entries) in document {
            let group = file.create_group(group_name).map_err(storage_err)?;
            for (key, array) in entries {
                write_entry(&group, key, array)?;
            }
        }
        file.flush().map_err(storage_err)?;
        Ok(())
    }

    fn read_document(&self, path: &Path) -> AppResult<StoredDocument> {
        let file = File::open(path).map_err(storage_err)?;
        let mut document = StoredDocument::new();
        for group_name in file.member_names().map_err(storage_err)? {
            let group = file.group(&group_name).map_err(storage_err)?;
            let mut entries = StoredGroup::new();
            for key in group.member_names().map_err(storage_err)? {
                let dataset = group.dataset(&key).map_err(storage_err)?;
                entries.insert(key.clone(), read_entry(&dataset, &key)?);
            }
            debug!(group = %group_name, entries = entries.len(), "read hdf5 group");
            document.insert(group_name, entries);
        }
        Ok(document)
    }
}

fn write_entry(group: &Group, key: &str, array: &StoredArray) -> AppResult<()> {
    let shape = array.shape().to_vec();
    match array {
        StoredArray::Bytes { data, .. } => {
            let encoded = data
                .iter()
                .map(|s| {
                    s.parse::<VarLenUnicode>()
                        .map_err(|e| DaqError::Storage(format!("entry '{key}': {e}")))
                })
                .collect::<AppResult<Vec<_>>>()?;
            group
                .new_dataset::<VarLenUnicode>()
                .shape(shape)
                .create(key)
                .and_then(|ds| ds.write_raw(&encoded))
                .map_err(storage_err)
        }
        StoredArray::Int { data, .. } => group
            .new_dataset::<i64>()
            .shape(shape)
            .create(key)
            .and_then(|ds| ds.write_raw(data))
            .map_err(storage_err),
        StoredArray::Float { data, .. } => group
            .new_dataset::<f64>()
            .shape(shape)
            .create(key)
            .and_then(|ds| ds.write_raw(data))
            .map_err(storage_err),
    }
}

fn read_entry(dataset: &Dataset, key: &str) -> AppResult<StoredArray> {
    let shape = dataset.shape();
    let descriptor = dataset
        .dtype()
        .and_then(|dtype| dtype.to_descriptor())
        .map_err(storage_err)?;
    match descriptor {
        TypeDescriptor::VarLenUnicode => {
            let raw = dataset.read_raw::<VarLenUnicode>().map_err(storage_err)?;
            Ok(StoredArray::Bytes {
                shape,
                data: raw.iter().map(|s| s.as_str().to_string()).collect(),
            })
        }
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Ok(StoredArray::Int {
            shape,
            data: dataset.read_raw::<i64>().map_err(storage_err)?,
        }),
        TypeDescriptor::Float(_) => Ok(StoredArray::Float {
            shape,
            data: dataset.read_raw::<f64>().map_err(storage_err)?,
        }),
        other => Err(DaqError::Storage(format!(
            "entry '{key}' has unsupported element type {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn document_survives_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.h5");
        let mut group = StoredGroup::new();
        group.insert(
            "series".into(),
            StoredArray::Bytes {
                shape: vec![1],
                data: vec!["20240501_120000".into()],
            },
        );
        group.insert(
            "qubit_set".into(),
            StoredArray::Int {
                shape: vec![2],
                data: vec![1, 3],
            },
        );
        group.insert(
            "result_i".into(),
            StoredArray::Float {
                shape: vec![2, 3],
                data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            },
        );
        let mut document = StoredDocument::new();
        document.insert("identity".into(), group);

        Hdf5Format.write_document(&document, &path).unwrap();
        assert_eq!(Hdf5Format.read_document(&path).unwrap(), document);
    }
}
