use crate::error::ImportError;
use crate::models::Route;
use anyhow::Result;
use std::path::Path;
use tracing::info;

pub mod csv;
pub mod gpx;

/// Trait for reading recorded tracks from different file formats
pub trait ImportFormat {
    /// Check if this importer can handle the given file
    fn can_import(&self, file_path: &Path) -> bool;

    /// Read the track as a route in file order
    fn import_file(&self, file_path: &Path) -> Result<Route>;

    /// Get the format name for this importer
    fn get_format_name(&self) -> &'static str;
}

/// Case-insensitive extension check shared by the importers
pub(crate) fn has_extension(file_path: &Path, expected: &str) -> bool {
    file_path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(expected))
        .unwrap_or(false)
}

/// Manager for coordinating different import formats
pub struct ImportManager {
    importers: Vec<Box<dyn ImportFormat>>,
}

impl ImportManager {
    /// Create a new import manager with all available importers
    pub fn new() -> Self {
        let importers: Vec<Box<dyn ImportFormat>> = vec![
            Box::new(gpx::GpxImporter::new()),
            Box::new(csv::CsvImporter::new()),
        ];

        Self { importers }
    }

    /// Import a single file, picking the importer by extension
    pub fn import_file(&self, file_path: &Path) -> Result<Route> {
        let importer = self
            .importers
            .iter()
            .find(|importer| importer.can_import(file_path))
            .ok_or_else(|| ImportError::UnsupportedFormat {
                format: file_path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_else(|| file_path.display().to_string()),
            })?;

        let route = importer.import_file(file_path)?;
        info!(
            file = %file_path.display(),
            format = importer.get_format_name(),
            samples = route.len(),
            "Track imported"
        );
        Ok(route)
    }

    /// Check if any importer handles the given file
    pub fn can_import_file(&self, file_path: &Path) -> bool {
        self.importers.iter().any(|importer| importer.can_import(file_path))
    }

    /// Names of the supported formats
    pub fn format_names(&self) -> Vec<&'static str> {
        self.importers.iter().map(|importer| importer.get_format_name()).collect()
    }
}

impl Default for ImportManager {
    fn default() -> Self {
        Self::new()
    }
}
