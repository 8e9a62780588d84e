//! Container format registry with automatic feature-based registration.

use super::json::JsonFormat;
use super::ContainerFormat;
use crate::error::{AppResult, DaqError};
use std::collections::HashMap;

#[cfg(feature = "storage_hdf5")]
use super::hdf5::Hdf5Format;

type FormatFactory = Box<dyn Fn() -> Box<dyn ContainerFormat> + Send + Sync>;

/// Registry of container formats, keyed by file extension.
///
/// JSON is always registered. HDF5 is registered when the `storage_hdf5` feature is
/// enabled; asking for it otherwise yields [`DaqError::FeatureNotEnabled`].
///
/// ```
/// use sweep_daq::storage::registry::FormatRegistry;
///
/// let registry = FormatRegistry::new();
/// assert!(registry.is_available("json"));
/// let format = registry.create("json")?;
/// assert_eq!(format.extension(), "json");
/// # Ok::<(), sweep_daq::error::DaqError>(())
/// ```
pub struct FormatRegistry {
    factories: HashMap<String, FormatFactory>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatRegistry {
    /// Creates a registry with every format the build supports.
    pub fn new() -> Self {
        let mut registry = Self {
            factories: HashMap::new(),
        };

        registry.register("json", || Box::new(JsonFormat::new()));

        #[cfg(feature = "storage_hdf5")]
        registry.register("h5", || Box::new(Hdf5Format::new()));

        registry
    }

    /// Registers a custom format under `extension`.
    pub fn register<F>(&mut self, extension: &str, factory: F)
    where
        F: Fn() -> Box<dyn ContainerFormat> + Send + Sync + 'static,
    {
        self.factories
            .insert(canonical(extension).to_string(), Box::new(factory));
    }

    /// Creates the format registered for `extension`.
    ///
    /// `hdf5` is accepted as an alias for `h5`, and a leading dot is ignored.
    pub fn create(&self, extension: &str) -> AppResult<Box<dyn ContainerFormat>> {
        let extension = canonical(extension);
        if let Some(factory) = self.factories.get(extension) {
            return Ok(factory());
        }
        if extension == "h5" {
            return Err(DaqError::FeatureNotEnabled("storage_hdf5".into()));
        }
        Err(DaqError::Storage(format!(
            "Unsupported storage format: '{}'. Available formats: [{}]",
            extension,
            self.list_formats().join(", ")
        )))
    }

    /// Registered extensions, sorted.
    pub fn list_formats(&self) -> Vec<String> {
        let mut formats: Vec<String> = self.factories.keys().cloned().collect();
        formats.sort();
        formats
    }

    /// True if `extension` (or an alias) is registered.
    pub fn is_available(&self, extension: &str) -> bool {
        self.factories.contains_key(canonical(extension))
    }
}

fn canonical(extension: &str) -> &str {
    match extension.trim_start_matches('.') {
        "hdf5" => "h5",
        other => other,
    }
}
